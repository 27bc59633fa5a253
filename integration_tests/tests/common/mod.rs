use std::path::PathBuf;
use std::sync::Once;

use diplo_core::{AnalysisEvent, EventKind};
use serde_json::Value;

static INIT: Once = Once::new();

#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture("test_dashboard_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test dashboard config at {}",
            config_path.display()
        );

        std::env::set_var("DIPLOSENSE_CONFIG_PATH", &config_path);
    });
}

#[allow(dead_code)]
pub fn event(kind: EventKind, data: Value, timestamp: &str) -> AnalysisEvent {
    AnalysisEvent::new(kind, "integration-meeting", data, timestamp)
}
