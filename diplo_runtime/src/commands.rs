use std::path::PathBuf;

use diplo_proto::EventKind;

/// Requests the dashboard can send to the analysis API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    AnalyzeVideo { path: PathBuf },
    AnalyzeAudio { path: PathBuf },
    AnalyzeText { text: String, cultures: Vec<String> },
    AnalyzeVideoUrl { url: String },
    AnalyzeDemoVideo { video_id: String },
    LiveCameraFrame { path: PathBuf },
    AnalyzeNews { text: String },
    RunDemo,
    GenerateCable,
    ListDemoVideos,
    UsageStats,
    /// Save the usage export to `path`, or a dated file in the working directory.
    ExportUsage { path: Option<PathBuf> },
}

/// Which configured timeout bounds a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Request,
    Upload,
    UrlFetch,
}

impl UserAction {
    /// Path relative to the API base.
    pub fn endpoint(&self) -> &'static str {
        match self {
            UserAction::AnalyzeVideo { .. } => "analyze/video",
            UserAction::AnalyzeAudio { .. } => "analyze/audio",
            UserAction::AnalyzeText { .. } => "analyze/text",
            UserAction::AnalyzeVideoUrl { .. } => "analyze/video-url",
            UserAction::AnalyzeDemoVideo { .. } => "analyze/demo-video",
            UserAction::LiveCameraFrame { .. } => "analyze/live-camera",
            UserAction::AnalyzeNews { .. } => "analyze/news",
            UserAction::RunDemo => "demo/analyze",
            UserAction::GenerateCable => "generate/cable",
            UserAction::ListDemoVideos => "demo/videos",
            UserAction::UsageStats => "usage/stats",
            UserAction::ExportUsage { .. } => "usage/export",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(
            self,
            UserAction::ListDemoVideos | UserAction::UsageStats | UserAction::ExportUsage { .. }
        )
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            UserAction::AnalyzeVideo { .. }
            | UserAction::AnalyzeAudio { .. }
            | UserAction::LiveCameraFrame { .. } => TimeoutClass::Upload,
            UserAction::AnalyzeVideoUrl { .. } => TimeoutClass::UrlFetch,
            _ => TimeoutClass::Request,
        }
    }

    /// Kind of the event a successful response becomes, if any.
    ///
    /// Live-camera results come back over the stream. News analysis, usage
    /// accounting and the demo video listing are shown but never recorded.
    pub fn event_kind(&self) -> Option<EventKind> {
        match self {
            UserAction::AnalyzeVideo { .. } | UserAction::AnalyzeVideoUrl { .. } => {
                Some(EventKind::VideoAnalysis)
            }
            UserAction::AnalyzeAudio { .. } => Some(EventKind::AudioAnalysis),
            UserAction::AnalyzeText { .. } => Some(EventKind::TextAnalysis),
            UserAction::AnalyzeDemoVideo { .. } | UserAction::RunDemo => {
                Some(EventKind::DemoAnalysis)
            }
            UserAction::GenerateCable => Some(EventKind::DiplomaticCable),
            UserAction::LiveCameraFrame { .. }
            | UserAction::AnalyzeNews { .. }
            | UserAction::ListDemoVideos
            | UserAction::UsageStats
            | UserAction::ExportUsage { .. } => None,
        }
    }

    /// Response field holding the event payload.
    pub fn response_key(&self) -> &'static str {
        match self {
            UserAction::GenerateCable => "cable",
            _ => "analysis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserAction::AnalyzeVideo { .. } => "video upload",
            UserAction::AnalyzeAudio { .. } => "audio upload",
            UserAction::AnalyzeText { .. } => "text analysis",
            UserAction::AnalyzeVideoUrl { .. } => "video url analysis",
            UserAction::AnalyzeDemoVideo { .. } => "demo video analysis",
            UserAction::LiveCameraFrame { .. } => "camera frame",
            UserAction::AnalyzeNews { .. } => "news analysis",
            UserAction::RunDemo => "demo analysis",
            UserAction::GenerateCable => "cable generation",
            UserAction::ListDemoVideos => "demo video listing",
            UserAction::UsageStats => "usage statistics",
            UserAction::ExportUsage { .. } => "usage export",
        }
    }
}

/// A parsed dashboard prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    Run(UserAction),
    SwitchMeeting(String),
    Reconnect,
    /// Send the images in a directory as live-camera frames, one per tick.
    StartCapture { dir: PathBuf },
    StopCapture,
}
