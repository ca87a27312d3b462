//! Streaming Pipeline Tests
//!
//! Verifies that:
//! - The routing announcement opens the stream and `done` closes it
//! - Classifier reasoning is streamed, its JSON answer is not
//! - Reasoning and answer text are separated even when tags straddle fragments
//! - Retrieval results are consumed internally and never reach the wire
//! - A retrieval that outlives its timeout is reflected on and retried
//! - No empty text event is ever emitted
//! - Dropping the receiver cancels the remaining stages

use std::sync::Arc;

use tokio::sync::mpsc;

use agent_m::services::prompts::{
    DB_COMMAND_SYSTEM, DB_REFLECTION_SYSTEM, GENERAL_SYSTEM, REPORT_PLAN_SYSTEM, ROUTING_SYSTEM,
    SYNTHESIS_SYSTEM,
};
use agent_m::PipelineConfig;
use agent_m_core::WireEvent;

use crate::support::*;

fn streaming_llm() -> StageLlm {
    StageLlm::new()
        .on(ROUTING_SYSTEM, &[ROUTE_DATABASE])
        .on(
            REPORT_PLAN_SYSTEM,
            &[format!("<think>satu bagian cukup</think>{}", ONE_SECTION_PLAN).as_str()],
        )
        .on(DB_COMMAND_SYSTEM, &["Ambil FCR kolam F1 terbaru"])
        .on(SYNTHESIS_SYSTEM, &[SYNTHESIS_ANSWER])
}

fn position(events: &[WireEvent], needle: &str) -> Option<usize> {
    events.iter().position(|e| match e {
        WireEvent::Thinking { content } | WireEvent::Content { content } => content.contains(needle),
        WireEvent::Done => false,
    })
}

// ============================================================================
// Data-retrieval stream
// ============================================================================

#[tokio::test]
async fn test_data_stream_event_order() {
    let llm = Arc::new(streaming_llm());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    assert_eq!(
        events[0],
        WireEvent::Thinking {
            content: "Routing to: database\nReasoning: butuh data\n\n".to_string()
        }
    );
    assert_eq!(events.last(), Some(&WireEvent::Done));
    assert_eq!(events.iter().filter(|e| **e == WireEvent::Done).count(), 1);

    let planning = position(&events, "Planning retrieval...").unwrap();
    let querying = position(&events, "Querying database...").unwrap();
    let progress = position(&events, "Executing: Ambil FCR kolam F1 terbaru").unwrap();
    let synthesizing = position(&events, "Synthesizing response...").unwrap();
    let first_content = events
        .iter()
        .position(|e| matches!(e, WireEvent::Content { .. }))
        .unwrap();
    assert!(planning < querying);
    assert!(querying < progress);
    assert!(progress < synthesizing);
    assert!(synthesizing < first_content);
}

#[tokio::test]
async fn test_data_stream_separates_reasoning_from_answer() {
    let llm = Arc::new(streaming_llm());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    assert_eq!(content_text(&events), "FCR kolam F1 saat ini **1.35**.");
    let thinking = thinking_text(&events);
    assert!(thinking.contains("satu bagian cukup"));
    assert!(thinking.contains("dua sampel, ambil terbaru"));
    assert!(llm.calls().iter().all(|call| call.streamed));

    for event in &events {
        assert!(!event.is_empty(), "empty event emitted: {:?}", event);
        if let WireEvent::Thinking { content } | WireEvent::Content { content } = event {
            assert!(!content.contains("<think"));
            assert!(!content.contains("</think"));
            assert!(!content.contains("\"sections\""));
        }
    }
}

#[tokio::test]
async fn test_routing_reasoning_streams_before_announcement() {
    let llm = Arc::new(
        StageLlm::new()
            .on(
                ROUTING_SYSTEM,
                &[format!("<think>butuh angka FCR</think>{}", ROUTE_DATABASE).as_str()],
            )
            .on(REPORT_PLAN_SYSTEM, &[ONE_SECTION_PLAN])
            .on(DB_COMMAND_SYSTEM, &["Ambil FCR kolam F1 terbaru"])
            .on(SYNTHESIS_SYSTEM, &[SYNTHESIS_ANSWER]),
    );
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    let reasoning = position(&events, "butuh angka FCR").unwrap();
    let announcement = position(&events, "Routing to: database").unwrap();
    assert!(reasoning < announcement);
    assert!(position(&events, "routed_input").is_none());
    assert!(thinking_text(&events).starts_with("butuh angka FCR"));
    assert_eq!(events.last(), Some(&WireEvent::Done));
}

#[tokio::test]
async fn test_retrieval_result_never_reaches_the_wire() {
    let llm = Arc::new(streaming_llm());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    assert!(position(&events, "Found 2 rows").is_none());
    assert!(position(&events, "F1 | 1.32").is_none());
    assert!(llm.calls_for(SYNTHESIS_SYSTEM)[0]
        .user_text()
        .contains("F1 | 1.32"));
}

#[tokio::test]
async fn test_stream_without_result_is_treated_as_failure() {
    let llm = Arc::new(streaming_llm().on(DB_REFLECTION_SYSTEM, &["Ambil FCR F1 dari tabel cultivation"]));
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![
        Step::NoResult,
        Step::Return(fcr_rows()),
    ]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    assert!(llm.calls_for(DB_REFLECTION_SYSTEM)[0]
        .user_text()
        .contains("Database agent returned no result."));
    assert_eq!(retrieval.instructions().len(), 2);
    assert!(position(&events, "Retrieval failed, revising instruction...").is_some());
    assert!(position(&events, "Retrying with revised instruction...").is_some());
    assert_eq!(events.last(), Some(&WireEvent::Done));
}

#[tokio::test]
async fn test_stream_timeout_feeds_reflection() {
    let llm = Arc::new(streaming_llm().on(DB_REFLECTION_SYSTEM, &["Ambil FCR F1 dari tabel cultivation"]));
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Stall, Step::Return(fcr_rows())]));
    let options = PipelineConfig {
        retrieval_timeout_secs: Some(1),
        ..PipelineConfig::default()
    };
    let coordinator = coordinator_with(&llm, &retrieval, options);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));
    outcome.unwrap();

    assert!(llm.calls_for(DB_REFLECTION_SYSTEM)[0]
        .user_text()
        .contains("retrieval timed out after 1s"));
    assert_eq!(
        retrieval.instructions(),
        vec!["Ambil FCR kolam F1 terbaru", "Ambil FCR F1 dari tabel cultivation"]
    );
    let first_progress = position(&events, "Executing: Ambil FCR kolam F1 terbaru").unwrap();
    let revising = position(&events, "Retrieval failed, revising instruction...").unwrap();
    assert!(first_progress < revising);
    assert!(position(&events, "Executing: Ambil FCR F1 dari tabel cultivation").is_some());
    assert!(!content_text(&events).contains("late rows"));
    assert_eq!(events.last(), Some(&WireEvent::Done));
}

#[tokio::test]
async fn test_stream_transport_error_has_no_done() {
    let llm = Arc::new(
        StageLlm::new()
            .on(ROUTING_SYSTEM, &[ROUTE_DATABASE])
            .on(REPORT_PLAN_SYSTEM, &[ONE_SECTION_PLAN])
            .on(DB_COMMAND_SYSTEM, &["Ambil FCR kolam F1 terbaru"])
            .fail(SYNTHESIS_SYSTEM),
    );
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), collect(rx));

    assert!(outcome.is_err());
    assert!(!events.contains(&WireEvent::Done));
}

// ============================================================================
// Conversational and short-circuit streams
// ============================================================================

#[tokio::test]
async fn test_conversational_stream() {
    let llm = Arc::new(
        StageLlm::new()
            .on(ROUTING_SYSTEM, &[r#"{"agent":"general","reasoning":"sapaan"}"#])
            .on(GENERAL_SYSTEM, &["<think>sapa balik</think>Halo! Ada yang bisa dibantu?"]),
    );
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream("halo", &[], tx), collect(rx));
    outcome.unwrap();

    assert_eq!(
        thinking_text(&events),
        "Routing to: general\nReasoning: sapaan\n\nsapa balik"
    );
    assert_eq!(content_text(&events), "Halo! Ada yang bisa dibantu?");
    assert_eq!(events.last(), Some(&WireEvent::Done));
    assert!(retrieval.instructions().is_empty());
}

#[tokio::test]
async fn test_empty_input_stream() {
    let llm = Arc::new(StageLlm::new());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);

    let (outcome, events) = tokio::join!(coordinator.execute_stream("", &[], tx), collect(rx));
    outcome.unwrap();

    assert_eq!(
        events,
        vec![
            WireEvent::Content {
                content: "Error: Empty query.".to_string()
            },
            WireEvent::Done
        ]
    );
    assert!(llm.calls().is_empty());
}

#[test]
fn test_done_frame() {
    assert_eq!(
        WireEvent::Done.to_sse_frame().unwrap(),
        "data: {\"type\":\"done\"}\n\n"
    );
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_dropped_receiver_stops_after_routing() {
    let llm = Arc::new(streaming_llm());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, rx) = mpsc::channel(16);
    drop(rx);

    coordinator.execute_stream(QUESTION, &[], tx).await.unwrap();

    assert_eq!(llm.stages(), vec![ROUTING_SYSTEM]);
    assert!(retrieval.instructions().is_empty());
}

#[tokio::test]
async fn test_receiver_dropped_mid_stream_skips_remaining_stages() {
    let llm = Arc::new(streaming_llm());
    let retrieval = Arc::new(ScriptedRetrieval::new(vec![Step::Return(fcr_rows())]));
    let coordinator = coordinator(&llm, &retrieval);
    let (tx, mut rx) = mpsc::channel(1);

    let consumer = async move {
        let first = rx.recv().await;
        drop(rx);
        first
    };
    let (outcome, first) = tokio::join!(coordinator.execute_stream(QUESTION, &[], tx), consumer);

    outcome.unwrap();
    assert!(matches!(first, Some(WireEvent::Thinking { .. })));
    assert!(retrieval.instructions().is_empty());
    assert!(llm.calls_for(SYNTHESIS_SYSTEM).is_empty());
}
