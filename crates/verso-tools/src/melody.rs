//! Melody tools: generate, evaluate and improve a melody structure.

use async_trait::async_trait;
use std::sync::Arc;
use verso_core::model::{
    EvaluateMelodyInput, Evaluation, GenerateMelodyInput, ImproveMelodyInput, MelodyStructure,
};
use verso_core::{ToolKind, ToolWork, WorkError};

use crate::composer::Composer;

/// `generate-melody`: set the lyrics to a first melody.
pub struct MelodyGenerator {
    composer: Arc<dyn Composer>,
}

impl MelodyGenerator {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for MelodyGenerator {
    type Input = GenerateMelodyInput;
    type Output = MelodyStructure;

    fn kind(&self) -> ToolKind {
        ToolKind::GenerateMelody
    }

    fn description(&self) -> &str {
        "Compose a melody for a song structure"
    }

    async fn run(&self, input: GenerateMelodyInput) -> Result<MelodyStructure, WorkError> {
        self.composer.generate_melody(input).await
    }
}

/// `evaluate-melody`
pub struct MelodyEvaluator {
    composer: Arc<dyn Composer>,
}

impl MelodyEvaluator {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for MelodyEvaluator {
    type Input = EvaluateMelodyInput;
    type Output = Evaluation;

    fn kind(&self) -> ToolKind {
        ToolKind::EvaluateMelody
    }

    fn description(&self) -> &str {
        "Score the melody against its lyrics"
    }

    async fn run(&self, input: EvaluateMelodyInput) -> Result<Evaluation, WorkError> {
        self.composer.evaluate_melody(input).await
    }
}

/// `improve-melody`
pub struct MelodyImprover {
    composer: Arc<dyn Composer>,
}

impl MelodyImprover {
    pub fn new(composer: Arc<dyn Composer>) -> Self {
        Self { composer }
    }
}

#[async_trait]
impl ToolWork for MelodyImprover {
    type Input = ImproveMelodyInput;
    type Output = MelodyStructure;

    fn kind(&self) -> ToolKind {
        ToolKind::ImproveMelody
    }

    fn description(&self) -> &str {
        "Revise the melody using its evaluation and user feedback"
    }

    async fn run(&self, input: ImproveMelodyInput) -> Result<MelodyStructure, WorkError> {
        self.composer.improve_melody(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::SampleComposer;
    use serde_json::json;
    use verso_core::{Tool, ValidatedTool};

    fn song() -> serde_json::Value {
        json!({
            "title": "Night Drive",
            "sections": [
                {"kind": "verse", "lines": ["headlights on the wet road"]},
                {"kind": "chorus", "lines": ["drive, just drive"]}
            ]
        })
    }

    #[tokio::test]
    async fn test_generate_requires_emotion_or_mood() {
        let tool = ValidatedTool::new(MelodyGenerator::new(Arc::new(SampleComposer)));
        let err = tool
            .execute(json!({ "songStructure": song() }))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("emotion or mood"));
    }

    #[tokio::test]
    async fn test_generate_honours_explicit_parameters() {
        let tool = ValidatedTool::new(MelodyGenerator::new(Arc::new(SampleComposer)));
        let output = tool
            .execute(json!({
                "songStructure": song(),
                "mood": "serene",
                "tempo": 90,
                "key": "D major",
                "timeSignature": "3/4"
            }))
            .await
            .unwrap();

        assert_eq!(output["tempo"], json!(90));
        assert_eq!(output["key"], json!("D major"));
        assert_eq!(output["timeSignature"], json!("3/4"));
        assert_eq!(output["tracks"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_evaluate_then_improve() {
        let composer: Arc<dyn Composer> = Arc::new(SampleComposer);
        let generate = ValidatedTool::new(MelodyGenerator::new(composer.clone()));
        let evaluate = ValidatedTool::new(MelodyEvaluator::new(composer.clone()));
        let improve = ValidatedTool::new(MelodyImprover::new(composer));

        let melody = generate
            .execute(json!({ "songStructure": song(), "emotion": "calm" }))
            .await
            .unwrap();
        let evaluation = evaluate
            .execute(json!({ "melodyStructure": melody, "songStructure": song() }))
            .await
            .unwrap();
        assert_eq!(evaluation["score"], json!(7.0));

        let improved = improve
            .execute(json!({ "melodyStructure": melody, "evaluation": evaluation }))
            .await
            .unwrap();
        assert_eq!(improved["revision"], json!(1));
    }
}
