//! End-to-End Tests for the Melody Workflow
//!
//! These tests chain the lyrics and melody workflows with the sample
//! backend and check the melody policy's stricter quality threshold.

use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use verso::{
    GuardrailConfig, LyricsPolicy, MelodyPolicy, MelodyRequest, Orchestrator, SampleComposer,
    SongStructure, StateKey, TerminationReason, ToolKind, ToolSet, TraceEventType, lyrics_tools,
    melody_tools,
};
use verso_testing::{MockTool, ToolRecorder, check_tool_call_pairs, tools_called};

const MELODY_TOOLS: [ToolKind; 3] = [
    ToolKind::GenerateMelody,
    ToolKind::EvaluateMelody,
    ToolKind::ImproveMelody,
];

/// Lyrics produced by a full sample lyrics run.
async fn sample_song() -> SongStructure {
    let orchestrator = Orchestrator::new(
        LyricsPolicy::lyrics(lyrics_tools(Arc::new(SampleComposer::new())), 3),
        GuardrailConfig::new(12, 12, 3).unwrap(),
        [
            ToolKind::GenerateSongStructure,
            ToolKind::EvaluateLyrics,
            ToolKind::ImproveLyrics,
        ],
    );
    let result = orchestrator
        .run(json!({ "lyrics": "night drive home", "emotion": "sad" }))
        .await;
    assert!(result.success, "lyrics run failed: {:?}", result.error);

    let song = result.state.artifact(StateKey::SongStructure).unwrap().clone();
    serde_json::from_value(song).unwrap()
}

fn melody_orchestrator(tools: ToolSet, max_iterations: u32) -> Orchestrator<MelodyPolicy> {
    Orchestrator::new(
        MelodyPolicy::melody(tools, max_iterations),
        GuardrailConfig::new(12, 12, max_iterations).unwrap(),
        MELODY_TOOLS,
    )
}

#[tokio::test]
async fn test_sample_melody_run_needs_two_improvements() {
    let song = sample_song().await;
    let (tools, recorder) =
        ToolRecorder::instrument(&melody_tools(Arc::new(SampleComposer::new())));
    let request = MelodyRequest::new(song.clone()).with_emotion("sad");

    let result = melody_orchestrator(tools, 3)
        .run(serde_json::to_value(request).unwrap())
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.termination, Some(TerminationReason::QualityAcceptable));
    assert_eq!(result.stats.tool_calls_made, 6);
    assert_eq!(result.stats.iteration_count, 2);
    assert_eq!(recorder.calls(ToolKind::ImproveMelody), 2);
    assert_eq!(check_tool_call_pairs(&result.trace), Ok(6));

    let melody = result.state.artifact(StateKey::MelodyStructure).unwrap();
    assert_eq!(melody["revision"], json!(2));
    assert_eq!(melody["title"], json!(song.title));
    assert_eq!(
        result.state.artifact(StateKey::Evaluation).unwrap()["score"],
        json!(8.8)
    );

    // the lyrics travel with the melody for evaluation
    let evaluate_input = &recorder.inputs(ToolKind::EvaluateMelody)[0];
    assert_eq!(evaluate_input["songStructure"]["title"], json!(song.title));
}

#[tokio::test]
async fn test_melody_iteration_budget_ends_below_threshold() {
    let song = sample_song().await;
    let tools = melody_tools(Arc::new(SampleComposer::new()));
    let request = MelodyRequest::new(song).with_mood("serene").with_tempo(84);

    let result = melody_orchestrator(tools, 1)
        .run(serde_json::to_value(request).unwrap())
        .await;

    assert!(result.success);
    assert_eq!(result.termination, Some(TerminationReason::MaxIterationsReached));
    assert_eq!(result.stats.tool_calls_made, 4);
    assert_eq!(
        tools_called(&result.trace).last(),
        Some(&ToolKind::EvaluateMelody)
    );
    let melody = result.state.artifact(StateKey::MelodyStructure).unwrap();
    assert_eq!(melody["tempo"], json!(84));
}

#[tokio::test]
async fn test_melody_without_emotion_or_mood_fails_fast() {
    let song = sample_song().await;
    let (tools, recorder) =
        ToolRecorder::instrument(&melody_tools(Arc::new(SampleComposer::new())));

    let result = melody_orchestrator(tools, 3)
        .run(serde_json::to_value(MelodyRequest::new(song)).unwrap())
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("POLICY_ERROR"));
    assert!(result.error.as_deref().unwrap().contains("emotion or mood"));
    assert_eq!(recorder.total_calls(), 0);
}

#[rstest]
#[case(8.5, false, TerminationReason::QualityAcceptable, ">= threshold")]
#[case(8.49, false, TerminationReason::QualityAcceptable, "below threshold")]
#[case(8.49, true, TerminationReason::MaxIterationsReached, "max iterations reached")]
#[tokio::test]
async fn test_melody_threshold_boundary(
    #[case] score: f64,
    #[case] needs_improvement: bool,
    #[case] termination: TerminationReason,
    #[case] expected: &str,
) {
    let song = sample_song().await;
    let tools = ToolSet::new()
        .with_tool(Arc::new(
            MockTool::new(ToolKind::GenerateMelody).with_default_response(json!({ "title": "m" })),
        ))
        .with_tool(Arc::new(MockTool::evaluator(
            ToolKind::EvaluateMelody,
            [(score, needs_improvement)],
        )));
    let request = MelodyRequest::new(song).with_emotion("happy");

    let result = melody_orchestrator(tools, 0)
        .run(serde_json::to_value(request).unwrap())
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.termination, Some(termination));
    let reflect = result.events_of(TraceEventType::Reflect).last().unwrap();
    let reasoning: &Value = &reflect.output.as_ref().unwrap()["reasoning"];
    assert!(reasoning.as_str().unwrap().contains(expected), "{reasoning}");
}
