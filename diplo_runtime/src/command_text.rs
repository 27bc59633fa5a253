use std::path::PathBuf;

use thiserror::Error;

use crate::commands::{DashboardCommand, UserAction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

/// Parse a prompt line such as `text --cultures us,cn We welcome the proposal`.
pub fn parse_command_line(input: &str) -> Result<DashboardCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    let command = match verb.as_str() {
        "video" => DashboardCommand::Run(UserAction::AnalyzeVideo {
            path: required_path(&mut parts, "video path")?,
        }),
        "audio" => DashboardCommand::Run(UserAction::AnalyzeAudio {
            path: required_path(&mut parts, "audio path")?,
        }),
        "frame" | "camera" => DashboardCommand::Run(UserAction::LiveCameraFrame {
            path: required_path(&mut parts, "image path")?,
        }),
        "url" => DashboardCommand::Run(UserAction::AnalyzeVideoUrl {
            url: required(&mut parts, "video url")?.to_string(),
        }),
        "demo_video" | "demo-video" => DashboardCommand::Run(UserAction::AnalyzeDemoVideo {
            video_id: required(&mut parts, "video id")?.to_string(),
        }),
        "text" => {
            let mut cultures = Vec::new();
            let mut words: Vec<&str> = Vec::new();
            while let Some(token) = parts.next() {
                if token == "--cultures" && words.is_empty() {
                    let list = parts
                        .next()
                        .ok_or(CommandParseError::MissingArgument("cultures"))?;
                    cultures = list
                        .split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect();
                } else {
                    words.push(token);
                }
            }
            if words.is_empty() {
                return Err(CommandParseError::MissingArgument("text"));
            }
            return Ok(DashboardCommand::Run(UserAction::AnalyzeText {
                text: words.join(" "),
                cultures,
            }));
        }
        "news" => {
            let words: Vec<&str> = parts.collect();
            if words.is_empty() {
                return Err(CommandParseError::MissingArgument("news text"));
            }
            return Ok(DashboardCommand::Run(UserAction::AnalyzeNews {
                text: words.join(" "),
            }));
        }
        "usage" => match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("stats") => DashboardCommand::Run(UserAction::UsageStats),
            Some("export") => DashboardCommand::Run(UserAction::ExportUsage {
                path: parts.next().map(PathBuf::from),
            }),
            Some(_) => return Err(CommandParseError::UnknownCommand(trimmed.to_string())),
        },
        "live" => match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("start") => DashboardCommand::StartCapture {
                dir: required_path(&mut parts, "frame directory")?,
            },
            Some("stop") => DashboardCommand::StopCapture,
            Some(_) => return Err(CommandParseError::UnknownCommand(trimmed.to_string())),
            None => return Err(CommandParseError::MissingArgument("start or stop")),
        },
        "demo" => DashboardCommand::Run(UserAction::RunDemo),
        "cable" => DashboardCommand::Run(UserAction::GenerateCable),
        "videos" => DashboardCommand::Run(UserAction::ListDemoVideos),
        "meeting" => {
            DashboardCommand::SwitchMeeting(required(&mut parts, "meeting id")?.to_string())
        }
        "reconnect" => DashboardCommand::Reconnect,
        other => return Err(CommandParseError::UnknownCommand(other.to_string())),
    };

    match parts.next() {
        Some(extra) => Err(CommandParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn required<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<&'a str, CommandParseError> {
    parts.next().ok_or(CommandParseError::MissingArgument(name))
}

fn required_path<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<PathBuf, CommandParseError> {
    required(parts, name).map(PathBuf::from)
}
