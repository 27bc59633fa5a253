mod common;

use std::time::Duration;

use anyhow::{Context, Result};
use diplo_core::network::read_replay;
use diplo_core::{start_feed_server, DashboardConfig, EventKind, LiveSession};
use diplo_proto::{encode_frame, RawFrame};
use diplo_runtime::{
    parse_command_line, response_event, ActionRequest, AnalysisClient, ApiError, ClientTimeouts,
    DashboardCommand, UserAction,
};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn until(
    session: &mut LiveSession,
    mut done: impl FnMut(&LiveSession) -> bool,
) -> Result<()> {
    timeout(WAIT, async {
        while !done(session) {
            session.next_signal().await;
        }
    })
    .await
    .context("timed out waiting for live session")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replayed_feed_reaches_the_dashboard() -> Result<()> {
    let server = start_feed_server("127.0.0.1:0".parse()?).await?;
    let config = DashboardConfig {
        ws_base: server.ws_base(),
        ..DashboardConfig::default()
    };

    let mut session = LiveSession::new(Handle::current(), &config)?;
    session.mount("integration-meeting");
    until(&mut session, LiveSession::connected).await?;
    timeout(WAIT, server.wait_for_clients(1)).await?;

    let frames = read_replay(&common::fixture("negotiation_replay.jsonl")).await?;
    assert_eq!(frames.len(), 4);
    for frame in &frames {
        server.broadcast(frame);
    }
    server.broadcast("not a frame");
    server.broadcast(&frames[0]);

    until(&mut session, |s| s.history().len() >= 4).await?;

    let kinds: Vec<_> = session.history().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::DemoAnalysis,
            EventKind::FacialAnalysis,
            EventKind::AudioAnalysis,
            EventKind::DemoAnalysis,
        ]
    );
    assert_eq!(session.dropped_frames(), 1);
    assert!(session
        .history()
        .iter()
        .all(|event| event.meeting_id() == "integration-meeting"));

    let view = session.view();
    assert!(view.connected);
    assert_eq!(view.series.len(), 4);
    assert_eq!(view.activity[0].label, "Demo Analysis");
    assert!(view.transcript.contains("We need assurances."));
    assert!(view.transcript.contains("We must reject these sanctions"));
    let cable = view.cable.context("expected an assessment")?;
    assert!(cable.transcript_based || cable.risk_level != "Low");

    session.unmount();
    assert!(!session.connected());
    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn meeting_change_reconnects_and_keeps_history() -> Result<()> {
    let server = start_feed_server("127.0.0.1:0".parse()?).await?;
    let config = DashboardConfig {
        ws_base: server.ws_base(),
        ..DashboardConfig::default()
    };
    let mut session = LiveSession::new(Handle::current(), &config)?;

    session.mount("first");
    until(&mut session, LiveSession::connected).await?;
    timeout(WAIT, server.wait_for_clients(1)).await?;
    server.broadcast(&frame("text_analysis", "first", "t1", None)?);
    until(&mut session, |s| s.history().len() == 1).await?;

    session.change_meeting("second");
    until(&mut session, LiveSession::connected).await?;
    server.broadcast(&frame("text_analysis", "first", "t2", None)?);
    server.broadcast(&frame("video_analysis", "second", "t3", Some(0.4))?);
    until(&mut session, |s| s.history().len() == 2).await?;

    assert_eq!(session.meeting_id(), Some("second"));
    let kinds: Vec<_> = session.history().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![EventKind::TextAnalysis, EventKind::VideoAnalysis]);
    assert_eq!(session.view().frame_progress, Some(0.4));
    Ok(())
}

fn frame(kind: &str, meeting_id: &str, timestamp: &str, progress: Option<f64>) -> Result<String> {
    Ok(encode_frame(&RawFrame {
        kind: kind.to_string(),
        meeting_id: meeting_id.to_string(),
        data: json!({}),
        timestamp: timestamp.to_string(),
        frame_progress: progress,
    })?)
}

#[tokio::test]
async fn generated_cable_is_shown_verbatim() -> Result<()> {
    let config = DashboardConfig {
        ws_base: "ws://127.0.0.1:1/ws".to_string(),
        ..DashboardConfig::default()
    };
    let mut session = LiveSession::new(Handle::current(), &config)?;
    session.record(
        response_event(
            &UserAction::AnalyzeAudio {
                path: "opening.wav".into(),
            },
            "integration-meeting",
            json!({"analysis": {"transcript": "This is a threat of war"}}),
            "2025-06-03T12:00:00Z".to_string(),
        )
        .context("audio upload yields an event")?,
    );
    let body = json!({"cable": {
        "executive_summary": "Talks remain constructive.",
        "risk_assessment": {"risk_level": "Low", "recommendations": ["Keep the channel open"]},
        "cultural_analysis": {"cultural_insights": ["Indirect refusals are customary"]}
    }});
    session.record(
        response_event(
            &UserAction::GenerateCable,
            "integration-meeting",
            body,
            "2025-06-03T12:00:05Z".to_string(),
        )
        .context("cable generation yields an event")?,
    );

    let cable = session.view().cable.context("expected a cable")?;
    assert_eq!(cable.source, "received cable");
    assert_eq!(cable.risk_level, "Low");
    assert_eq!(cable.executive_summary, "Talks remain constructive.");
    assert_eq!(cable.recommendations, vec!["Keep the channel open".to_string()]);
    assert_eq!(
        cable.cultural_notes,
        vec!["Indirect refusals are customary".to_string()]
    );
    assert!(!cable.transcript_based);
    Ok(())
}

#[tokio::test]
async fn failed_user_action_surfaces_an_error() -> Result<()> {
    let DashboardCommand::Run(action) = parse_command_line("demo")? else {
        anyhow::bail!("expected a runnable action");
    };
    let client = AnalysisClient::new("http://127.0.0.1:1", ClientTimeouts::default())?;
    let result = client
        .perform(ActionRequest::new("integration-meeting", action))
        .await;
    assert!(matches!(result, Err(ApiError::Transport { .. })));
    Ok(())
}
