//! G-code file streaming
//!
//! Sends a file to the printer line by line from a background task.
//! Blank lines are skipped, each line is trimmed, and a short delay
//! between lines keeps the firmware's receive buffer from overflowing.
//! Bytes that are not valid UTF-8 (Latin-1 comments from older slicers)
//! are replaced rather than failing the job.
//!
//! Every job ends with exactly one `StreamEvent::Finished`, whatever
//! happens: completion, cancellation, an unreadable file, or a lost
//! connection.

use super::ChannelSlot;
use crate::communication::SendOptions;
use parking_lot::Mutex;
use printkit_core::{
    DataCallback, EventDispatcher, PrinterEvent, StreamError, StreamEvent, StreamOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observer invoked synchronously, in order, from the streaming task
pub type StreamObserver = DataCallback<StreamEvent>;

/// Streaming timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Pause after each line
    pub line_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            line_delay: Duration::from_millis(5),
        }
    }
}

/// Handle to a running stream job
pub struct StreamHandle {
    path: PathBuf,
    cancel: CancellationToken,
    join: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// File being streamed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Request cancellation; takes effect before the next line
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this job
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check whether the job has ended
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job to end
    pub async fn wait(self) -> StreamOutcome {
        self.join.await.unwrap_or_else(|e| StreamOutcome::Failed {
            lines_sent: 0,
            reason: format!("stream task ended abnormally: {}", e),
        })
    }
}

/// Starts stream jobs, at most one at a time
pub struct GcodeStreamer {
    slot: ChannelSlot,
    config: StreamConfig,
    events: EventDispatcher,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl GcodeStreamer {
    /// Create a streamer over a channel slot
    pub fn new(slot: ChannelSlot, config: StreamConfig, events: EventDispatcher) -> Self {
        Self {
            slot,
            config,
            events,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start streaming a file
    pub fn start(
        &self,
        path: impl Into<PathBuf>,
        observer: Option<StreamObserver>,
    ) -> Result<StreamHandle, StreamError> {
        self.start_with_cancel(path, observer, CancellationToken::new())
    }

    /// Start streaming a file with a caller-supplied cancellation token
    ///
    /// Fails only if the printer is disconnected or another job is
    /// running; everything after that is reported through the job's
    /// terminal event.
    pub fn start_with_cancel(
        &self,
        path: impl Into<PathBuf>,
        observer: Option<StreamObserver>,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, StreamError> {
        self.slot.get()?;

        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(StreamError::AlreadyRunning);
            }
            *active = Some(cancel.clone());
        }

        let path = path.into();
        tracing::info!("Streaming {}", path.display());

        let job = StreamJob {
            path: path.clone(),
            slot: self.slot.clone(),
            config: self.config,
            events: self.events.clone(),
            observer,
            cancel: cancel.clone(),
        };
        let active = self.active.clone();
        let join = tokio::spawn(async move {
            let outcome = job.run().await;
            *active.lock() = None;
            outcome
        });

        Ok(StreamHandle { path, cancel, join })
    }

    /// Check whether a job is running
    pub fn is_streaming(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Cancel the running job, if any
    pub fn cancel_active(&self) -> bool {
        match &*self.active.lock() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

struct StreamJob {
    path: PathBuf,
    slot: ChannelSlot,
    config: StreamConfig,
    events: EventDispatcher,
    observer: Option<StreamObserver>,
    cancel: CancellationToken,
}

impl StreamJob {
    fn emit(&self, event: StreamEvent) {
        if let Some(observer) = &self.observer {
            observer(event.clone());
        }
        self.events.publish(PrinterEvent::Stream(event));
    }

    async fn run(self) -> StreamOutcome {
        let outcome = self.stream().await;
        match &outcome {
            StreamOutcome::Completed { lines_sent } => {
                tracing::info!("Streamed {} line(s) from {}", lines_sent, self.path.display())
            }
            StreamOutcome::Cancelled { lines_sent } => {
                tracing::info!("Stream cancelled after {} line(s)", lines_sent)
            }
            StreamOutcome::Failed { lines_sent, reason } => {
                tracing::warn!("Stream failed after {} line(s): {}", lines_sent, reason)
            }
        }
        self.emit(StreamEvent::Finished(outcome.clone()));
        outcome
    }

    async fn stream(&self) -> StreamOutcome {
        let unreadable = |e: std::io::Error, lines_sent: usize| StreamOutcome::Failed {
            lines_sent,
            reason: StreamError::FileUnreadable {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .to_string(),
        };

        let total_lines = match count_lines(&self.path).await {
            Ok(n) => n,
            Err(e) => return unreadable(e, 0),
        };

        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => return unreadable(e, 0),
        };
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut lines_sent = 0usize;

        loop {
            let line = match next_line(&mut reader, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return unreadable(e, lines_sent),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if self.cancel.is_cancelled() {
                return StreamOutcome::Cancelled { lines_sent };
            }

            let sent = match self.slot.get() {
                Ok(channel) => channel.send(line, SendOptions::fire_and_forget()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                return StreamOutcome::Failed {
                    lines_sent,
                    reason: e.to_string(),
                };
            }

            lines_sent += 1;
            self.emit(StreamEvent::Progress {
                lines_sent,
                total_lines,
                percent: percent(lines_sent, total_lines),
            });

            if !self.config.line_delay.is_zero() {
                tokio::time::sleep(self.config.line_delay).await;
            }
        }

        StreamOutcome::Completed { lines_sent }
    }
}

/// Count non-blank lines without loading the file
async fn count_lines(path: &Path) -> std::io::Result<usize> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut count = 0;
    while let Some(line) = next_line(&mut reader, &mut buf).await? {
        if !line.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Read one line, decoding invalid UTF-8 lossily
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 * 100.0 / total as f64).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(40, 100), 40.0);
        assert_eq!(percent(3, 3), 100.0);
        assert_eq!(percent(0, 0), 100.0);
    }

    #[tokio::test]
    async fn test_count_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.gcode");
        std::fs::write(&path, "G28\n\n   \nG1 X1\r\nM84").unwrap();
        assert_eq!(count_lines(&path).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_count_tolerates_latin1_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.gcode");
        std::fs::write(&path, b"G28\n; nozzle 200\xb0C\nG1 X1\n").unwrap();
        assert_eq!(count_lines(&path).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_start_requires_connection() {
        let streamer = GcodeStreamer::new(
            ChannelSlot::new(),
            StreamConfig::default(),
            EventDispatcher::default(),
        );
        assert!(matches!(
            streamer.start("missing.gcode", None),
            Err(StreamError::Channel(_))
        ));
        assert!(!streamer.is_streaming());
    }
}
