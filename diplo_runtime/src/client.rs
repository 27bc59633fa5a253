//! HTTP client for the analysis API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, SecondsFormat, Utc};
use diplo_proto::{AnalysisEvent, NewsAnalysis, UsageStats};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::commands::{TimeoutClass, UserAction};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidBase(#[from] url::ParseError),
    #[error("{endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{endpoint} returned invalid JSON: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request: Duration,
    pub upload: Duration,
    pub url_fetch: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            upload: Duration::from_secs(120),
            url_fetch: Duration::from_secs(300),
        }
    }
}

impl ClientTimeouts {
    pub fn for_class(&self, class: TimeoutClass) -> Duration {
        match class {
            TimeoutClass::Request => self.request,
            TimeoutClass::Upload => self.upload,
            TimeoutClass::UrlFetch => self.url_fetch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub meeting_id: String,
    pub action: UserAction,
    /// History snapshot sent along with cable generation.
    pub analysis_data: Option<Value>,
}

impl ActionRequest {
    pub fn new(meeting_id: impl Into<String>, action: UserAction) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            action,
            analysis_data: None,
        }
    }

    pub fn with_analysis_data(mut self, analysis_data: Value) -> Self {
        self.analysis_data = Some(analysis_data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoVideo {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Event(AnalysisEvent),
    /// Request succeeded; its result arrives over the live stream.
    Accepted,
    DemoVideos(Vec<DemoVideo>),
    News(NewsAnalysis),
    Usage(UsageStats),
    UsageExported(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    api_base: Url,
    timeouts: ClientTimeouts,
}

impl AnalysisClient {
    pub fn new(api_base: &str, timeouts: ClientTimeouts) -> Result<Self, ApiError> {
        let mut api_base = Url::parse(api_base)?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            timeouts,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn endpoint_url(&self, action: &UserAction) -> Result<Url, ApiError> {
        Ok(self.api_base.join(action.endpoint())?)
    }

    pub async fn perform(&self, request: ActionRequest) -> Result<ActionResult, ApiError> {
        let ActionRequest {
            meeting_id,
            action,
            analysis_data,
        } = request;
        let url = self.endpoint_url(&action)?;
        let endpoint = action.endpoint().to_string();
        let timeout = self.timeouts.for_class(action.timeout_class());

        let body = request_body(&action, &meeting_id, analysis_data).await?;
        let builder = if action.is_get() {
            self.http.get(url)
        } else {
            self.http.post(url)
        };
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Multipart(form) => builder.multipart(form),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Json(value) => builder.json(&value),
        };

        tracing::info!(
            target: "diplosense::api",
            endpoint = %endpoint,
            meeting_id = %meeting_id,
            "api.request_sent"
        );
        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| transport_error(&endpoint, timeout, source))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| transport_error(&endpoint, timeout, source))?;
        if !status.is_success() {
            tracing::warn!(
                target: "diplosense::api",
                endpoint = %endpoint,
                status = status.as_u16(),
                "api.request_failed"
            );
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.clone(),
            source,
        })?;
        Ok(match action {
            UserAction::ListDemoVideos => ActionResult::DemoVideos(parse_demo_videos(&body)),
            UserAction::AnalyzeNews { .. } => {
                ActionResult::News(NewsAnalysis::from_response(&body))
            }
            UserAction::UsageStats => ActionResult::Usage(UsageStats::from_response(&body)),
            UserAction::ExportUsage { path } => {
                let path = path.unwrap_or_else(|| default_export_path(Utc::now().date_naive()));
                write_export(&path, &body).await?;
                tracing::info!(
                    target: "diplosense::api",
                    path = %path.display(),
                    "api.usage_exported"
                );
                ActionResult::UsageExported(path)
            }
            _ => match response_event(&action, &meeting_id, body, now_timestamp()) {
                Some(event) => ActionResult::Event(event),
                None => ActionResult::Accepted,
            },
        })
    }
}

enum RequestBody {
    Empty,
    Multipart(Form),
    Form(Vec<(&'static str, String)>),
    Json(Value),
}

async fn request_body(
    action: &UserAction,
    meeting_id: &str,
    analysis_data: Option<Value>,
) -> Result<RequestBody, ApiError> {
    Ok(match action {
        UserAction::ListDemoVideos | UserAction::UsageStats | UserAction::ExportUsage { .. } => {
            RequestBody::Empty
        }
        UserAction::AnalyzeVideo { path } => {
            RequestBody::Multipart(upload_form("video_file", path, meeting_id).await?)
        }
        UserAction::AnalyzeAudio { path } => {
            RequestBody::Multipart(upload_form("audio_file", path, meeting_id).await?)
        }
        UserAction::AnalyzeText { text, cultures } => {
            let cultures = serde_json::to_string(cultures).unwrap_or_else(|_| "[]".into());
            RequestBody::Form(vec![
                ("text", text.clone()),
                ("meeting_id", meeting_id.to_string()),
                ("cultures", cultures),
            ])
        }
        UserAction::AnalyzeVideoUrl { url } => {
            RequestBody::Json(json!({ "url": url, "meeting_id": meeting_id }))
        }
        UserAction::AnalyzeDemoVideo { video_id } => {
            RequestBody::Json(json!({ "video_id": video_id, "meeting_id": meeting_id }))
        }
        UserAction::LiveCameraFrame { path } => RequestBody::Json(json!({
            "meeting_id": meeting_id,
            "image_data": read_file(path).await?,
            "timestamp": now_timestamp(),
        })),
        UserAction::AnalyzeNews { text } => {
            RequestBody::Json(json!({ "text": text, "analysis_type": "diplomatic" }))
        }
        UserAction::RunDemo => RequestBody::Form(vec![("meeting_id", meeting_id.to_string())]),
        UserAction::GenerateCable => {
            let analysis_data = analysis_data.unwrap_or_else(|| Value::Array(Vec::new()));
            RequestBody::Form(vec![
                ("meeting_id", meeting_id.to_string()),
                ("analysis_data", analysis_data.to_string()),
            ])
        }
    })
}

/// `diplosense-usage-YYYY-MM-DD.json` in the working directory.
pub fn default_export_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("diplosense-usage-{}.json", date.format("%Y-%m-%d")))
}

async fn write_export(path: &Path, body: &Value) -> Result<(), ApiError> {
    let text = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    tokio::fs::write(path, text)
        .await
        .map_err(|source| ApiError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn transport_error(endpoint: &str, after: Duration, source: reqwest::Error) -> ApiError {
    if source.is_timeout() {
        ApiError::Timeout {
            endpoint: endpoint.to_string(),
            after,
        }
    } else {
        ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path).await.map_err(|source| ApiError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn upload_form(field: &'static str, path: &Path, meeting_id: &str) -> Result<Form, ApiError> {
    let bytes = read_file(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| field.to_string());
    Ok(Form::new()
        .part(field, Part::bytes(bytes).file_name(file_name))
        .text("meeting_id", meeting_id.to_string()))
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Event for a successful response body, if the action produces one.
///
/// The payload is the action's response key when present, the whole body otherwise.
pub fn response_event(
    action: &UserAction,
    meeting_id: &str,
    body: Value,
    timestamp: String,
) -> Option<AnalysisEvent> {
    let kind = action.event_kind()?;
    let key = action.response_key();
    let data = match body {
        Value::Object(mut fields) if fields.contains_key(key) => {
            fields.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    };
    Some(AnalysisEvent::new(kind, meeting_id, data, timestamp))
}

/// Accepts a bare array or `{"videos": [...]}`; entries may be strings or objects.
pub fn parse_demo_videos(body: &Value) -> Vec<DemoVideo> {
    let entries = match body {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(fields) => fields
            .get("videos")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(id) => Some(DemoVideo {
                id: id.clone(),
                title: None,
            }),
            Value::Object(fields) => {
                let id = match fields.get("id").or_else(|| fields.get("video_id"))? {
                    Value::String(id) => id.clone(),
                    Value::Number(id) => id.to_string(),
                    _ => return None,
                };
                let title = fields
                    .get("title")
                    .or_else(|| fields.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(DemoVideo { id, title })
            }
            _ => None,
        })
        .collect()
}
