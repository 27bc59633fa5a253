//! Outbound side of the DiploSense dashboard.
//!
//! This crate re-exports the wire contracts from `diplo_proto` and adds the
//! user actions the dashboard can trigger: the text command grammar that names
//! them, the HTTP client that turns each completed request into an analysis
//! event or report, and the periodic live-camera capture.

pub use diplo_proto::*;

pub mod capture;
pub mod client;
pub mod command_text;
pub mod commands;

pub use capture::{
    list_frames, spawn_capture, CaptureError, CaptureHandle, CaptureProgress, CaptureTick,
    CAPTURE_INTERVAL,
};
pub use client::{
    default_export_path, parse_demo_videos, response_event, ActionRequest, ActionResult,
    AnalysisClient, ApiError, ClientTimeouts, DemoVideo,
};
pub use command_text::{parse_command_line, CommandParseError};
pub use commands::{DashboardCommand, TimeoutClass, UserAction};
