use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode};
use diplo_core::{activity_detail, DashboardConfig, LiveSession};
use diplo_runtime::{
    parse_command_line, spawn_capture, ActionRequest, ActionResult, AnalysisClient, ApiError,
    CaptureHandle, CaptureTick, ClientTimeouts, DashboardCommand, UserAction, CAPTURE_INTERVAL,
};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::ui::{draw_ui, news_lines, usage_lines, UiState};

/// Completion of a request started from the dashboard.
#[derive(Debug)]
pub struct ActionOutcome {
    pub action: UserAction,
    pub result: Result<ActionResult, ApiError>,
}

pub struct DashboardApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    session: LiveSession,
    client: AnalysisClient,
    runtime: Handle,
    outcome_sender: Sender<ActionOutcome>,
    outcome_receiver: Receiver<ActionOutcome>,
    capture: Option<CaptureHandle>,
    tick_sender: Sender<CaptureTick>,
    tick_receiver: Receiver<CaptureTick>,
    log_receiver: Receiver<String>,
}

impl DashboardApp {
    pub fn new(
        runtime: Handle,
        config: DashboardConfig,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let timeouts = ClientTimeouts {
            request: config.timeouts.request(),
            upload: config.timeouts.upload(),
            url_fetch: config.timeouts.url_fetch(),
        };
        let client = AnalysisClient::new(&config.api_base, timeouts)?;
        let mut session = LiveSession::new(runtime.clone(), &config)?;
        session.mount(&config.default_meeting_id);

        let (outcome_sender, outcome_receiver) = mpsc::channel();
        let (tick_sender, tick_receiver) = mpsc::channel();
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::new(config.default_meeting_id.clone()),
            session,
            client,
            runtime,
            outcome_sender,
            outcome_receiver,
            capture: None,
            tick_sender,
            tick_receiver,
            log_receiver,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();

        loop {
            self.session.pump();

            while let Ok(outcome) = self.outcome_receiver.try_recv() {
                self.apply_outcome(outcome);
            }

            while let Ok(tick) = self.tick_receiver.try_recv() {
                self.apply_tick(tick);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                let view = self.session.view();
                self.terminal
                    .draw(|frame| draw_ui(frame, &self.ui_state, &view))?;
                last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if self.ui_state.prompt.is_some() {
                        self.handle_prompt_key(key.code);
                        continue;
                    }
                    if self.ui_state.overlay.is_some() {
                        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                            self.ui_state.overlay = None;
                        }
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Up | KeyCode::Char('k') => self.select_activity(-1),
                        KeyCode::Down | KeyCode::Char('j') => self.select_activity(1),
                        KeyCode::Enter => self.show_activity_detail(),
                        KeyCode::Char(':') => self.ui_state.prompt = Some(String::new()),
                        KeyCode::Char('c') => self.dispatch(UserAction::GenerateCable),
                        KeyCode::Char('d') => self.dispatch(UserAction::RunDemo),
                        KeyCode::Char('v') => self.dispatch(UserAction::ListDemoVideos),
                        KeyCode::Char('r') => self.reconnect(),
                        KeyCode::Char('m') => {
                            let next = self.ui_state.next_meeting();
                            self.switch_meeting(next);
                        }
                        _ => {}
                    }
                }
            }
        }

        self.stop_capture();
        self.session.unmount();
        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        Ok(())
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.ui_state.prompt.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.ui_state.prompt = None,
            KeyCode::Backspace => {
                prompt.pop();
            }
            KeyCode::Char(ch) => prompt.push(ch),
            KeyCode::Enter => {
                let line = self.ui_state.prompt.take().unwrap_or_default();
                match parse_command_line(&line) {
                    Ok(DashboardCommand::Run(action)) => self.dispatch(action),
                    Ok(DashboardCommand::SwitchMeeting(meeting_id)) => {
                        self.ui_state.remember_meeting(&meeting_id);
                        self.switch_meeting(meeting_id);
                    }
                    Ok(DashboardCommand::Reconnect) => self.reconnect(),
                    Ok(DashboardCommand::StartCapture { dir }) => self.start_capture(dir),
                    Ok(DashboardCommand::StopCapture) => {
                        if self.stop_capture() {
                            self.ui_state.set_status("Live capture stopped");
                        } else {
                            self.ui_state.set_error("No live capture running");
                        }
                    }
                    Err(err) => self.ui_state.set_error(format!("{line}: {err}")),
                }
            }
            _ => {}
        }
    }

    fn reconnect(&mut self) {
        if let Some(meeting_id) = self.session.meeting_id().map(str::to_string) {
            info!(meeting_id = %meeting_id, "dashboard.reconnect");
            self.session.mount(&meeting_id);
            self.ui_state.set_status(format!("Reconnecting to {meeting_id}"));
        }
    }

    fn select_activity(&mut self, delta: isize) {
        let len = self.session.view().activity.len();
        self.ui_state.move_selection(delta, len);
    }

    fn show_activity_detail(&mut self) {
        let Some(index) = self.ui_state.selected_activity else {
            return;
        };
        let view = self.session.view();
        let detail = view
            .activity
            .get(index)
            .and_then(|entry| self.session.history().get(entry.sequence))
            .map(activity_detail);
        match detail {
            Some(lines) => self.ui_state.show_overlay("Activity Detail", lines),
            None => self.ui_state.set_error("That event is no longer in the history"),
        }
    }

    fn start_capture(&mut self, dir: PathBuf) {
        let Some(meeting_id) = self.session.meeting_id().map(str::to_string) else {
            self.ui_state.set_error("No meeting mounted");
            return;
        };
        self.stop_capture();
        let sender = self.tick_sender.clone();
        match spawn_capture(
            &self.runtime,
            self.client.clone(),
            meeting_id.clone(),
            dir,
            CAPTURE_INTERVAL,
            move |tick| {
                let _ = sender.send(tick);
            },
        ) {
            Ok(handle) => {
                let dir = handle.dir().display().to_string();
                info!(meeting_id = %meeting_id, dir = %dir, "dashboard.capture_started");
                self.ui_state
                    .set_status(format!("Live capture of {dir} for {meeting_id}"));
                self.ui_state.capture_dir = Some(dir);
                self.capture = Some(handle);
            }
            Err(err) => self.ui_state.set_error(format!("live start: {err}")),
        }
    }

    /// Returns whether a capture was running.
    fn stop_capture(&mut self) -> bool {
        self.ui_state.capture_dir = None;
        self.ui_state.capture_progress = None;
        match self.capture.take() {
            Some(handle) => {
                handle.stop();
                // drop ticks already queued by the stopped loop
                while self.tick_receiver.try_recv().is_ok() {}
                true
            }
            None => false,
        }
    }

    fn apply_tick(&mut self, tick: CaptureTick) {
        if self.capture.is_none() {
            return;
        }
        self.ui_state.capture_progress = Some(tick.progress);
        match tick.result {
            Ok(ActionResult::Event(event)) => {
                self.session.record(event);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(frame = %tick.frame.display(), error = %err, "dashboard.capture_failed");
                self.ui_state.set_error(format!("live frame failed: {err}"));
            }
        }
    }

    fn switch_meeting(&mut self, meeting_id: String) {
        if self.stop_capture() {
            info!("dashboard.capture_stopped_for_meeting_change");
        }
        self.ui_state.selected_activity = None;
        self.session.change_meeting(&meeting_id);
        self.ui_state.set_status(format!("Following meeting {meeting_id}"));
    }

    fn dispatch(&mut self, action: UserAction) {
        let Some(meeting_id) = self.session.meeting_id().map(str::to_string) else {
            self.ui_state.set_error("No meeting mounted");
            return;
        };
        let mut request = ActionRequest::new(meeting_id, action.clone());
        if action == UserAction::GenerateCable {
            let history = serde_json::to_value(self.session.history().to_vec())
                .unwrap_or_else(|_| Value::Array(Vec::new()));
            request = request.with_analysis_data(history);
        }

        self.ui_state
            .set_status(format!("Running {}...", action.label()));
        let client = self.client.clone();
        let sender = self.outcome_sender.clone();
        self.runtime.spawn(async move {
            let result = client.perform(request).await;
            let _ = sender.send(ActionOutcome { action, result });
        });
    }

    fn apply_outcome(&mut self, outcome: ActionOutcome) {
        let label = outcome.action.label();
        match outcome.result {
            Ok(ActionResult::Event(event)) => {
                let kind = event.kind();
                self.session.record(event);
                info!(%kind, "dashboard.event_recorded");
                self.ui_state.set_status(format!("{label} complete"));
            }
            Ok(ActionResult::Accepted) => {
                self.ui_state
                    .set_status(format!("{label} accepted; results follow on the live feed"));
            }
            Ok(ActionResult::DemoVideos(videos)) => {
                self.ui_state
                    .set_status(format!("{} demo videos available", videos.len()));
                self.ui_state.demo_videos = videos;
            }
            Ok(ActionResult::News(news)) => {
                self.ui_state.show_overlay("News Analysis", news_lines(&news));
                self.ui_state.set_status(format!("{label} complete"));
            }
            Ok(ActionResult::Usage(stats)) => {
                self.ui_state.show_overlay("Usage Statistics", usage_lines(&stats));
                self.ui_state.set_status(format!("{label} complete"));
            }
            Ok(ActionResult::UsageExported(path)) => {
                self.ui_state
                    .set_status(format!("Usage exported to {}", path.display()));
            }
            Err(err) => {
                warn!(action = label, error = %err, "dashboard.action_failed");
                self.ui_state.set_error(format!("{label} failed: {err}"));
            }
        }
    }
}
