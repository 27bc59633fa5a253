use std::collections::VecDeque;
use std::fmt::Display;

use diplo_core::{CableSummary, DashboardView};
use diplo_runtime::{DemoVideo, NewsAnalysis, UsageStats};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Sparkline, Wrap};
use ratatui::Frame;

const RECENT_USAGE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Info,
    Error,
}

/// Modal text panel drawn over the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub title: String,
    pub lines: Vec<String>,
}

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub prompt: Option<String>,
    pub status: Option<(String, StatusTone)>,
    pub meetings: Vec<String>,
    pub meeting_cursor: usize,
    pub demo_videos: Vec<DemoVideo>,
    pub overlay: Option<Overlay>,
    pub selected_activity: Option<usize>,
    pub capture_dir: Option<String>,
    pub capture_progress: Option<f64>,
}

impl UiState {
    pub fn new(initial_meeting: String) -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 6,
            prompt: None,
            status: None,
            meetings: vec![initial_meeting],
            meeting_cursor: 0,
            demo_videos: Vec::new(),
            overlay: None,
            selected_activity: None,
            capture_dir: None,
            capture_progress: None,
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some((message.into(), StatusTone::Info));
    }

    pub fn set_error<S: Into<String>>(&mut self, message: S) {
        self.status = Some((message.into(), StatusTone::Error));
    }

    pub fn remember_meeting(&mut self, meeting_id: &str) {
        match self.meetings.iter().position(|known| known == meeting_id) {
            Some(index) => self.meeting_cursor = index,
            None => {
                self.meetings.push(meeting_id.to_string());
                self.meeting_cursor = self.meetings.len() - 1;
            }
        }
    }

    pub fn show_overlay<S: Into<String>>(&mut self, title: S, lines: Vec<String>) {
        self.overlay = Some(Overlay {
            title: title.into(),
            lines,
        });
    }

    /// Move the activity cursor by `delta` rows, clamped to `len` entries.
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected_activity = None;
            return;
        }
        let current = self.selected_activity.map_or(-1, |index| index as isize);
        let next = (current + delta).clamp(0, len as isize - 1);
        self.selected_activity = Some(next as usize);
    }

    /// Advance to the next known meeting id, wrapping around.
    pub fn next_meeting(&mut self) -> String {
        self.meeting_cursor = (self.meeting_cursor + 1) % self.meetings.len().max(1);
        self.meetings
            .get(self.meeting_cursor)
            .cloned()
            .unwrap_or_default()
    }
}

/// Map emotion in [-1, 1] onto sparkline bar heights.
pub fn emotion_bar(emotion: f64) -> u64 {
    ((emotion.clamp(-1.0, 1.0) + 1.0) * 50.0).round() as u64
}

pub fn stress_bar(stress: f64) -> u64 {
    (stress.clamp(0.0, 1.0) * 100.0).round() as u64
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |value| value.to_string())
}

fn push_section(lines: &mut Vec<String>, heading: &str, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    lines.push(format!("{heading}:"));
    lines.extend(items.iter().map(|item| format!("  - {item}")));
}

pub fn news_lines(news: &NewsAnalysis) -> Vec<String> {
    let mut lines = vec![format!("Risk level: {}", or_na(news.risk_level.as_deref()))];
    if let Some(overview) = &news.diplomatic_overview {
        lines.push(overview.clone());
    }
    if let Some(sentiment) = &news.sentiment_analysis {
        let label = sentiment.overall_sentiment.as_deref().unwrap_or("unknown");
        lines.push(match sentiment.confidence {
            Some(confidence) => {
                format!("Sentiment: {label} ({:.0}% confidence)", confidence * 100.0)
            }
            None => format!("Sentiment: {label}"),
        });
    }
    push_section(&mut lines, "Key entities", news.key_entities.as_deref());
    push_section(
        &mut lines,
        "Strategic recommendations",
        news.strategic_recommendations.as_deref(),
    );
    push_section(
        &mut lines,
        "Geopolitical implications",
        news.geopolitical_implications.as_deref(),
    );
    lines
}

pub fn usage_lines(stats: &UsageStats) -> Vec<String> {
    let mut lines = vec![
        format!("Total requests: {}", or_na(stats.total_requests)),
        format!(
            "Total cost: {}",
            or_na(stats.total_cost_usd.map(|cost| format!("${cost:.4}")))
        ),
        format!("Total tokens: {}", or_na(stats.total_tokens)),
    ];
    if let Some(services) = stats.service_stats.as_deref().filter(|s| !s.is_empty()) {
        lines.push("Services:".to_string());
        lines.extend(services.iter().map(|service| {
            format!(
                "  {}: {} requests, {} cost, {} tokens",
                service.service.as_deref().unwrap_or("unknown"),
                or_na(service.request_count),
                or_na(service.total_cost.map(|cost| format!("${cost:.4}"))),
                or_na(service.total_tokens),
            )
        }));
    }
    if let Some(recent) = stats.recent_requests.as_deref().filter(|r| !r.is_empty()) {
        lines.push("Recent requests:".to_string());
        lines.extend(recent.iter().take(RECENT_USAGE_ROWS).map(|request| {
            format!(
                "  {} {} {}",
                request.request_timestamp.as_deref().unwrap_or("-"),
                request.service.as_deref().unwrap_or("unknown"),
                request.model_used.as_deref().unwrap_or("-"),
            )
        }));
    }
    lines.push(format!("Recent errors: {}", stats.error_count()));
    lines
}

fn risk_color(level: &str) -> Color {
    match level.to_ascii_lowercase().as_str() {
        "high" => Color::Red,
        "medium" | "moderate" => Color::Yellow,
        "low" => Color::Green,
        _ => Color::Gray,
    }
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, view: &DashboardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(chunks[0]);
    draw_header(frame, top[0], view);
    draw_progress(frame, top[1], state, view);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    draw_series(frame, charts[0], view);
    draw_facial(frame, charts[1], view);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    draw_cable(frame, middle[0], view);
    draw_transcript(frame, middle[1], view);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    draw_activity(frame, lower[0], state, view);
    draw_logs(frame, lower[1], state);

    draw_footer(frame, chunks[4], state);

    if let Some(overlay) = &state.overlay {
        draw_overlay(frame, popup_area(frame.size()), overlay);
    }
}

/// Centered rectangle covering most of `area`.
pub fn popup_area(area: Rect) -> Rect {
    let width = area.width.saturating_mul(4) / 5;
    let height = area.height.saturating_mul(4) / 5;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_overlay(frame: &mut Frame, area: Rect, overlay: &Overlay) {
    frame.render_widget(Clear, area);
    let lines: Vec<Line> = overlay
        .lines
        .iter()
        .map(|line| Line::from(Span::raw(line.clone())))
        .collect();
    render_in_block(
        frame,
        area,
        &format!("{} (esc to close)", overlay.title),
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_progress(frame: &mut Frame, area: Rect, state: &UiState, view: &DashboardView) {
    let (title, progress) = match state.capture_progress {
        Some(progress) => ("Capture", Some(progress)),
        None => ("Frame progress", view.frame_progress),
    };
    let ratio = progress.unwrap_or(0.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(match progress {
            Some(_) => format!("{:.0}%", ratio * 100.0),
            None => "idle".to_string(),
        });
    frame.render_widget(gauge, area);
}

fn render_in_block(frame: &mut Frame, area: Rect, title: &str, paragraph: Paragraph) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_header(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let status_color = if view.connected { Color::Green } else { Color::Red };
    let line = Line::from(vec![
        Span::styled(view.status, Style::default().fg(status_color)),
        Span::raw(" | meeting "),
        Span::styled(
            view.meeting_id.clone().unwrap_or_else(|| "-".to_string()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | emotion "),
        Span::styled(view.emotion.clone(), Style::default().fg(Color::Yellow)),
        Span::raw(" | stress "),
        Span::styled(view.stress.clone(), Style::default().fg(Color::Magenta)),
        Span::raw(format!(
            " | events {} | dropped {}",
            view.event_count, view.dropped_frames
        )),
    ]);
    render_in_block(
        frame,
        area,
        "DiploSense Live Dashboard",
        Paragraph::new(line).wrap(Wrap { trim: true }),
    );
}

fn draw_series(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Emotion / Stress ({} samples)", view.series.len()));
    let inner = area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);
    let width = inner.width as usize;
    let skip = view.series.len().saturating_sub(width);
    let emotion: Vec<u64> = view.series.iter().skip(skip).map(|s| emotion_bar(s.emotion)).collect();
    let stress: Vec<u64> = view.series.iter().skip(skip).map(|s| stress_bar(s.stress)).collect();

    frame.render_widget(
        Sparkline::default()
            .data(&emotion)
            .max(100)
            .style(Style::default().fg(Color::Yellow)),
        rows[0],
    );
    frame.render_widget(
        Sparkline::default()
            .data(&stress)
            .max(100)
            .style(Style::default().fg(Color::Magenta)),
        rows[1],
    );
}

fn draw_facial(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let lines: Vec<Line> = if view.facial.is_empty() {
        vec![Line::from(Span::raw("No facial analysis yet"))]
    } else {
        view.facial
            .iter()
            .map(|share| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<12}", share.emotion),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(format!("{:>5.1}%", share.percent)),
                ])
            })
            .collect()
    };
    render_in_block(frame, area, "Facial Expressions", Paragraph::new(lines));
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

pub fn cable_lines(cable: &CableSummary) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::raw("Risk: "),
        Span::styled(
            cable.risk_level.clone(),
            Style::default()
                .fg(risk_color(&cable.risk_level))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(if cable.transcript_based {
            " (transcript-based)"
        } else {
            ""
        }),
        Span::styled(
            format!(" [{}]", cable.source),
            Style::default().fg(Color::DarkGray),
        ),
    ])];
    if !cable.executive_summary.is_empty() {
        lines.push(Line::from(Span::raw(cable.executive_summary.clone())));
    }
    let sections = [
        ("Why", &cable.reasons),
        ("Recommendations", &cable.recommendations),
        ("Cultural context", &cable.cultural_notes),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        lines.push(heading(title));
        lines.extend(
            items
                .iter()
                .map(|item| Line::from(Span::raw(format!("- {item}")))),
        );
    }
    lines
}

fn draw_cable(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let lines: Vec<Line> = match &view.cable {
        None => vec![Line::from(Span::raw("No assessment available"))],
        Some(cable) => cable_lines(cable),
    };
    render_in_block(
        frame,
        area,
        "Diplomatic Cable",
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_transcript(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<&str> = view.transcript.lines().collect();
    let skip = lines.len().saturating_sub(visible);
    let lines: Vec<Line> = lines
        .into_iter()
        .skip(skip)
        .map(|line| Line::from(Span::raw(line.to_string())))
        .collect();
    render_in_block(
        frame,
        area,
        "Live Transcript",
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_activity(frame: &mut Frame, area: Rect, state: &UiState, view: &DashboardView) {
    let lines: Vec<Line> = view
        .activity
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let selected = state.selected_activity == Some(index);
            let mark = |style: Style| {
                if selected {
                    style.add_modifier(Modifier::REVERSED)
                } else {
                    style
                }
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<17}", entry.label),
                    mark(Style::default().fg(Color::Yellow)),
                ),
                Span::styled(format!("{} ", entry.time_label), mark(Style::default())),
                Span::styled(entry.summary.clone(), mark(Style::default())),
            ])
        })
        .collect();
    render_in_block(frame, area, "Recent Activity", Paragraph::new(lines));
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    render_in_block(
        frame,
        area,
        "Logs",
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &UiState) {
    let line = match (&state.prompt, &state.status) {
        (Some(prompt), _) => Line::from(vec![
            Span::styled(":", Style::default().fg(Color::Yellow)),
            Span::raw(prompt.clone()),
        ]),
        (None, Some((message, tone))) => {
            let color = match tone {
                StatusTone::Info => Color::Green,
                StatusTone::Error => Color::Red,
            };
            Line::from(Span::styled(message.clone(), Style::default().fg(color)))
        }
        (None, None) => Line::from(vec![
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(" quit  "),
            Span::styled(":", Style::default().fg(Color::Yellow)),
            Span::raw(" command  "),
            Span::styled("c", Style::default().fg(Color::Yellow)),
            Span::raw(" cable  "),
            Span::styled("d", Style::default().fg(Color::Yellow)),
            Span::raw(" demo  "),
            Span::styled("v", Style::default().fg(Color::Yellow)),
            Span::raw(" videos  "),
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(" reconnect  "),
            Span::styled("m", Style::default().fg(Color::Yellow)),
            Span::raw(" next meeting  "),
            Span::styled("up/down", Style::default().fg(Color::Yellow)),
            Span::raw(" select  "),
            Span::styled("enter", Style::default().fg(Color::Yellow)),
            Span::raw(" details"),
        ]),
    };
    let mut title = "Commands".to_string();
    if let Some(dir) = &state.capture_dir {
        title.push_str(&format!(" | capturing {dir}"));
    }
    if !state.demo_videos.is_empty() {
        let ids: Vec<&str> = state.demo_videos.iter().map(|video| video.id.as_str()).collect();
        title.push_str(&format!(" | demo videos: {}", ids.join(", ")));
    }
    render_in_block(frame, area, &title, Paragraph::new(line));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn bars_scale_into_sparkline_range() {
        assert_eq!(emotion_bar(-1.0), 0);
        assert_eq!(emotion_bar(0.0), 50);
        assert_eq!(emotion_bar(1.4), 100);
        assert_eq!(stress_bar(0.8), 80);
        assert_eq!(stress_bar(-0.2), 0);
    }

    #[test]
    fn meetings_cycle_and_dedupe() {
        let mut state = UiState::new("m1".to_string());
        assert_eq!(state.next_meeting(), "m1");
        state.remember_meeting("m2");
        state.remember_meeting("m1");
        assert_eq!(state.next_meeting(), "m2");
        assert_eq!(state.next_meeting(), "m1");
    }

    #[test]
    fn logs_are_trimmed_and_capped() {
        let mut state = UiState::new("m".to_string());
        state.push_log("\n");
        for index in 0..10 {
            state.push_log(format!("line {index}\n"));
        }
        assert_eq!(state.logs.len(), state.max_logs);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 9"));
    }

    #[test]
    fn cable_panel_lists_reasons_and_cultural_context() {
        let cable = CableSummary {
            source: "facial and audio analysis",
            risk_level: "HIGH".to_string(),
            executive_summary: "Talks are strained.".to_string(),
            reasons: vec!["High stress detected (80%)".to_string()],
            recommendations: vec!["Request a recess".to_string()],
            cultural_notes: Vec::new(),
            transcript_based: false,
        };
        let lines: Vec<String> = cable_lines(&cable).iter().map(text).collect();
        assert_eq!(lines[0], "Risk: HIGH [facial and audio analysis]");
        assert_eq!(
            &lines[2..],
            ["Why", "- High stress detected (80%)", "Recommendations", "- Request a recess"]
        );

        let cable = CableSummary {
            cultural_notes: vec!["Indirect refusals are common".to_string()],
            ..cable
        };
        let lines: Vec<String> = cable_lines(&cable).iter().map(text).collect();
        assert_eq!(lines.last().map(String::as_str), Some("- Indirect refusals are common"));
        assert!(lines.iter().any(|line| line == "Cultural context"));
    }

    #[test]
    fn news_overlay_lists_sections() {
        let news = NewsAnalysis::from_response(&json!({"analysis": {
            "diplomatic_overview": "Talks stalled.",
            "risk_level": "high",
            "key_entities": ["EU"],
            "sentiment_analysis": {"overall_sentiment": "negative", "confidence": 0.8}
        }}));
        assert_eq!(
            news_lines(&news),
            vec![
                "Risk level: high",
                "Talks stalled.",
                "Sentiment: negative (80% confidence)",
                "Key entities:",
                "  - EU",
            ]
        );
        assert_eq!(news_lines(&NewsAnalysis::default()), vec!["Risk level: N/A"]);
    }

    #[test]
    fn usage_overlay_summarises_services() {
        let stats = UsageStats::from_response(&json!({
            "total_requests": 3,
            "total_cost_usd": 0.25,
            "service_stats": [{"service": "whisper", "request_count": 3}],
            "recent_errors": [{"error": "timeout"}]
        }));
        assert_eq!(
            usage_lines(&stats),
            vec![
                "Total requests: 3",
                "Total cost: $0.2500",
                "Total tokens: N/A",
                "Services:",
                "  whisper: 3 requests, N/A cost, N/A tokens",
                "Recent errors: 1",
            ]
        );
    }

    #[test]
    fn activity_selection_is_clamped() {
        let mut state = UiState::new("m".to_string());
        state.move_selection(-1, 3);
        assert_eq!(state.selected_activity, Some(0));
        state.move_selection(5, 3);
        assert_eq!(state.selected_activity, Some(2));
        state.move_selection(1, 0);
        assert_eq!(state.selected_activity, None);
    }

    #[test]
    fn popup_is_centered() {
        let area = popup_area(Rect::new(0, 0, 100, 40));
        assert_eq!(area, Rect::new(10, 4, 80, 32));
    }
}
