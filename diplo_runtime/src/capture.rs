//! Continuous live-camera capture: a directory of still images is sent to the
//! live-camera endpoint one frame per tick until the capture is stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::client::{ActionRequest, ActionResult, AnalysisClient, ApiError};
use crate::commands::UserAction;

pub const CAPTURE_INTERVAL: Duration = Duration::from_secs(1);
const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const TICKS_PER_CYCLE: u32 = 10;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read frame directory {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no jpg or png frames in {0:?}")]
    NoFrames(PathBuf),
}

/// Image files in `dir`, sorted by name.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let read_error = |source: std::io::Error| CaptureError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            frames.push(path);
        }
    }
    if frames.is_empty() {
        return Err(CaptureError::NoFrames(dir.to_path_buf()));
    }
    frames.sort();
    Ok(frames)
}

/// Progress through a ten-tick analysis cycle: 0.1, 0.2, ... 1.0, then 0.1 again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureProgress {
    ticks: u32,
}

impl CaptureProgress {
    pub fn advance(&mut self) -> f64 {
        self.ticks = self.ticks % TICKS_PER_CYCLE + 1;
        f64::from(self.ticks) / f64::from(TICKS_PER_CYCLE)
    }
}

/// One frame sent by a running capture.
#[derive(Debug)]
pub struct CaptureTick {
    pub frame: PathBuf,
    pub progress: f64,
    pub result: Result<ActionResult, ApiError>,
}

/// Running capture; dropping it stops the loop.
#[derive(Debug)]
pub struct CaptureHandle {
    dir: PathBuf,
    stop: Option<oneshot::Sender<()>>,
}

impl CaptureHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Start sending the frames in `dir` for `meeting_id`, one per `interval`,
/// cycling through the directory. Every completed request is passed to `on_tick`.
pub fn spawn_capture<F>(
    runtime: &Handle,
    client: AnalysisClient,
    meeting_id: String,
    dir: PathBuf,
    interval: Duration,
    on_tick: F,
) -> Result<CaptureHandle, CaptureError>
where
    F: Fn(CaptureTick) + Send + 'static,
{
    let frames = list_frames(&dir)?;
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    tracing::info!(
        target: "diplosense::capture",
        dir = %dir.display(),
        frames = frames.len(),
        "capture.started"
    );

    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress = CaptureProgress::default();

        for frame in frames.iter().cycle() {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
            }
            let progress = progress.advance();
            let request = ActionRequest::new(
                meeting_id.clone(),
                UserAction::LiveCameraFrame {
                    path: frame.clone(),
                },
            );
            let result = tokio::select! {
                _ = &mut stop_rx => break,
                result = client.perform(request) => result,
            };
            on_tick(CaptureTick {
                frame: frame.clone(),
                progress,
                result,
            });
        }
        tracing::info!(target: "diplosense::capture", "capture.stopped");
    });

    Ok(CaptureHandle {
        dir,
        stop: Some(stop_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientTimeouts;
    use tokio::sync::mpsc;

    fn frame_dir(name: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("diplo-capture-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), [0xFF, 0xD8, 0xFF]).unwrap();
        }
        dir
    }

    #[test]
    fn progress_wraps_after_ten_ticks() {
        let mut progress = CaptureProgress::default();
        let steps: Vec<f64> = (0..12).map(|_| progress.advance()).collect();
        assert_eq!(steps[0], 0.1);
        assert_eq!(steps[9], 1.0);
        assert_eq!(steps[10], 0.1);
        assert_eq!(steps[11], 0.2);
    }

    #[test]
    fn frames_are_images_sorted_by_name() {
        let dir = frame_dir("sorted", &["b.PNG", "a.jpg", "notes.txt", "c.jpeg"]);
        let names: Vec<String> = list_frames(&dir)
            .unwrap()
            .iter()
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn empty_or_missing_directories_are_rejected() {
        let dir = frame_dir("empty", &["readme.md"]);
        assert!(matches!(list_frames(&dir), Err(CaptureError::NoFrames(_))));
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(list_frames(&dir), Err(CaptureError::Read { .. })));
    }

    #[tokio::test]
    async fn capture_reports_each_frame_until_stopped() {
        let dir = frame_dir("loop", &["one.jpg", "two.jpg"]);
        let client = AnalysisClient::new("http://127.0.0.1:1", ClientTimeouts::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_capture(
            &Handle::current(),
            client,
            "m".to_string(),
            dir.clone(),
            Duration::from_millis(10),
            move |tick| {
                let _ = tx.send(tick);
            },
        )
        .unwrap();
        assert_eq!(handle.dir(), dir.as_path());

        let mut ticks = Vec::new();
        for _ in 0..3 {
            ticks.push(rx.recv().await.unwrap());
        }
        handle.stop();

        let progress: Vec<f64> = ticks.iter().map(|tick| tick.progress).collect();
        assert_eq!(progress, vec![0.1, 0.2, 0.3]);
        assert_eq!(ticks[0].frame, dir.join("one.jpg"));
        assert_eq!(ticks[2].frame, dir.join("one.jpg"));
        assert!(ticks
            .iter()
            .all(|tick| matches!(tick.result, Err(ApiError::Transport { .. }))));

        // the loop ends and drops its sender once stopped
        while rx.recv().await.is_some() {}
        std::fs::remove_dir_all(dir).unwrap();
    }
}
