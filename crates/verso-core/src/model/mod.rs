//! Domain model: creative brief, draft artifacts, evaluations and the
//! typed inputs of each tool.

pub mod brief;
pub mod evaluation;
pub mod lyrics;
pub mod melody;

pub use brief::{CreativeBrief, LyricsRequest, TempoClass, mood_for, tempo_for, themes_for};
pub use evaluation::Evaluation;
pub use lyrics::{
    EvaluateLyricsInput, GenerateLyricsInput, ImproveLyricsInput, LyricSection, SectionKind,
    SongStructure,
};
pub use melody::{
    EvaluateMelodyInput, GenerateMelodyInput, ImproveMelodyInput, MelodyRequest, MelodyStructure,
    MelodyTrack, Note, parse_time_signature,
};
