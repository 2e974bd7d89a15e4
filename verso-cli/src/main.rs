use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use verso::agent::TracingProgressHook;
use verso::tools::Backend;
use verso::{
    ApprovalRegistry, DecisionPolicy, LyricsPolicy, LyricsRequest, MelodyPolicy, MelodyRequest,
    Orchestrator, RegistryApprovalGate, RunResult, SongStructure, ToolKind, lyrics_tools,
    melody_tools,
};

mod approval;
mod config;

use config::{CliConfig, CliError};

#[derive(Parser, Debug)]
#[command(name = "verso", version = "0.3.0")]
#[command(about = "Verso CLI - guarded lyrics and melody generation")]
struct Cli {
    /// Human-readable logs and result output instead of JSON lines
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn free text into refined song lyrics
    Lyrics {
        /// Source text or concept
        #[arg(long)]
        text: String,
        /// Emotion driving mood and tempo
        #[arg(long)]
        emotion: String,
        #[arg(long)]
        genre: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Set a song structure (JSON file) to a refined melody
    Melody {
        /// Path to a song structure JSON file
        #[arg(long)]
        song: PathBuf,
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long)]
        mood: Option<String>,
        /// Tempo in BPM
        #[arg(long)]
        tempo: Option<u32>,
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        time_signature: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    max_steps: Option<u32>,
    #[arg(long)]
    max_tool_calls: Option<u32>,
    #[arg(long)]
    max_iterations: Option<u32>,
    /// sample or live
    #[arg(long)]
    backend: Option<Backend>,
    /// Review generated content interactively on stdin
    #[arg(long)]
    approve: bool,
}

impl RunArgs {
    fn config(&self) -> Result<CliConfig, CliError> {
        Ok(CliConfig::from_env()?
            .with_max_steps(self.max_steps)
            .with_max_tool_calls(self.max_tool_calls)
            .with_max_iterations(self.max_iterations)
            .with_backend(self.backend))
    }
}

fn init_tracing(pretty: bool) {
    let env_filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = if pretty {
        builder.pretty().try_init()
    } else {
        builder.json().try_init()
    };
}

/// The `RUST_LOG` directives when set and valid, otherwise `info`.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.pretty);

    let result = match cli.command {
        Commands::Lyrics {
            text,
            emotion,
            genre,
            run,
        } => {
            let mut request = LyricsRequest::new(text, emotion);
            if let Some(genre) = genre {
                request = request.with_genre(genre);
            }
            run_lyrics(request, &run).await
        }
        Commands::Melody {
            song,
            emotion,
            mood,
            tempo,
            key,
            time_signature,
            run,
        } => match read_song(&song) {
            Ok(structure) => {
                let request = MelodyRequest {
                    song_structure: structure,
                    emotion,
                    mood,
                    tempo,
                    key,
                    time_signature,
                };
                run_melody(request, &run).await
            }
            Err(e) => Err(e),
        },
    };

    match result.and_then(|result| print_result(&result, cli.pretty).map(|()| result.success)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Verso could not start the run");
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn read_song(path: &Path) -> Result<SongStructure, CliError> {
    let read_error = |message: String| CliError::ReadSong {
        path: path.display().to_string(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| read_error(e.to_string()))
}

fn print_result(result: &RunResult, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{rendered}");
    Ok(())
}

async fn run_lyrics(request: LyricsRequest, args: &RunArgs) -> Result<RunResult, CliError> {
    let config = args.config()?;
    let policy = LyricsPolicy::lyrics(lyrics_tools(config.composer()?), config.max_iterations);
    let orchestrator = Orchestrator::new(
        policy,
        config.guardrails()?,
        [
            ToolKind::GenerateSongStructure,
            ToolKind::EvaluateLyrics,
            ToolKind::ImproveLyrics,
        ],
    );
    execute(orchestrator, serde_json::to_value(request)?, &config, args.approve).await
}

async fn run_melody(request: MelodyRequest, args: &RunArgs) -> Result<RunResult, CliError> {
    let config = args.config()?;
    let policy = MelodyPolicy::melody(melody_tools(config.composer()?), config.max_iterations);
    let orchestrator = Orchestrator::new(
        policy,
        config.guardrails()?,
        [
            ToolKind::GenerateMelody,
            ToolKind::EvaluateMelody,
            ToolKind::ImproveMelody,
        ],
    );
    execute(orchestrator, serde_json::to_value(request)?, &config, args.approve).await
}

async fn execute<P: DecisionPolicy>(
    orchestrator: Orchestrator<P>,
    input: Value,
    config: &CliConfig,
    approve: bool,
) -> Result<RunResult, CliError> {
    let orchestrator = orchestrator.with_progress_hook(Arc::new(TracingProgressHook));
    if !approve {
        return Ok(orchestrator.run(input).await);
    }

    let (notifier, requests) = mpsc::unbounded_channel();
    let registry = ApprovalRegistry::with_notifier(notifier);
    let gate = RegistryApprovalGate::new(registry.clone()).with_timeout(config.approval_timeout);
    let prompt = tokio::spawn(approval::prompt_loop(registry, requests));

    let result = orchestrator
        .with_approval_gate(Arc::new(gate))
        .run(input)
        .await;
    prompt.abort();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, "info")]
    #[case(Some(""), "info")]
    #[case(Some("debug"), "debug")]
    #[case(Some("verso_agent=trace"), "verso_agent=trace")]
    fn test_log_filter_prefers_rust_log(#[case] rust_log: Option<&str>, #[case] expected: &str) {
        let filter = log_filter(rust_log.map(str::to_string));
        assert_eq!(filter.to_string(), expected);
    }
}
