mod common;

use anyhow::Result;
use diplo_core::{load_dashboard_config_from_env, DashboardConfig, LiveSession};

#[test]
fn env_override_points_at_fixture() -> Result<()> {
    common::ensure_test_config();
    let (config, path) = load_dashboard_config_from_env();

    assert_eq!(path, Some(common::fixture("test_dashboard_config.json")));
    assert_eq!(config.default_meeting_id, "integration-meeting");
    assert_eq!(config.history_limit, 50);
    assert_eq!(config.timeouts.upload_secs, 5);
    assert_ne!(config, DashboardConfig::builtin());
    Ok(())
}

#[tokio::test]
async fn fixture_config_builds_a_session() -> Result<()> {
    common::ensure_test_config();
    let (config, _) = load_dashboard_config_from_env();
    let session = LiveSession::new(tokio::runtime::Handle::current(), &config)?;
    let view = session.view();
    assert_eq!(view.status, "Idle");
    assert_eq!(view.event_count, 0);
    Ok(())
}
