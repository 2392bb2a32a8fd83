//! Slicing jobs
//!
//! Runs the external slicer as a child process in a background task.
//! Combined stdout/stderr is forwarded line by line as it arrives, and
//! every spawned job ends with exactly one `SliceEvent::Finished`.

use crate::locate::SlicerLocator;
use crate::profile::{render_ini, SliceOptions};
use printkit_core::{
    DataCallback, EventDispatcher, PrinterEvent, PrinterProfile, SliceError, SliceEvent,
    SliceSuccess,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Model formats the slicer accepts
pub const MODEL_EXTENSIONS: [&str; 3] = ["stl", "obj", "3mf"];

/// Observer invoked in order from the job task
pub type SliceObserver = DataCallback<SliceEvent>;

/// What to slice and where to put the result
#[derive(Debug, Clone, PartialEq)]
pub struct SliceRequest {
    /// Input model
    pub input: PathBuf,
    /// G-code (or 3MF project) to write
    pub output: PathBuf,
    /// Printer and print parameters
    pub profile: PrinterProfile,
    /// Brim and support choices
    pub options: SliceOptions,
    /// Export a 3MF project instead of G-code
    pub export_3mf: bool,
}

impl SliceRequest {
    /// Slice `input` to G-code at `output`
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, profile: PrinterProfile) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            profile,
            options: SliceOptions::default(),
            export_3mf: false,
        }
    }

    /// Default output next to the model: same stem, `.gcode` or `.3mf`
    pub fn default_output(input: &Path, export_3mf: bool) -> PathBuf {
        input.with_extension(if export_3mf { "3mf" } else { "gcode" })
    }

    fn validate_input(&self) -> Result<(), SliceError> {
        let invalid = |reason: &str| SliceError::InvalidModel {
            path: self.input.clone(),
            reason: reason.to_string(),
        };

        let extension = self
            .input
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| invalid("no file extension"))?;
        if !MODEL_EXTENSIONS.contains(&extension.as_str()) {
            return Err(invalid("expected .stl, .obj or .3mf"));
        }
        if !self.input.is_file() {
            return Err(invalid("file does not exist"));
        }
        Ok(())
    }

    /// Command-line arguments after the executable
    pub fn args(&self, ini: &Path) -> Vec<String> {
        let action = if self.export_3mf { "--export-3mf" } else { "--slice" };
        vec![
            "--load".to_string(),
            ini.display().to_string(),
            "--scale".to_string(),
            self.profile.scale_factor().to_string(),
            action.to_string(),
            self.input.display().to_string(),
            "--output".to_string(),
            self.output.display().to_string(),
        ]
    }
}

/// Handle to a running slicing job
pub struct SliceHandle {
    output: PathBuf,
    join: JoinHandle<Result<SliceSuccess, SliceError>>,
}

impl SliceHandle {
    /// File the job writes
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Check whether the subprocess has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job and return the run's result
    pub async fn wait(self) -> Result<SliceSuccess, SliceError> {
        self.join.await.unwrap_or_else(|e| {
            Err(SliceError::Spawn {
                reason: format!("slicing task ended abnormally: {}", e),
            })
        })
    }
}

/// A slicing job waiting to be spawned
pub struct SlicingJob {
    request: SliceRequest,
    observer: Option<SliceObserver>,
    events: Option<EventDispatcher>,
}

impl SlicingJob {
    /// Prepare a job for `request`
    pub fn new(request: SliceRequest) -> Self {
        Self {
            request,
            observer: None,
            events: None,
        }
    }

    /// Call `observer` with every event
    pub fn with_observer(mut self, observer: SliceObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Also publish every event on `events`
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    /// Start the slicer in the background
    ///
    /// Returns immediately. Fails without spawning anything if the
    /// executable cannot be resolved, the model is unusable, or the
    /// profile cannot be written.
    pub fn spawn(self, locator: &SlicerLocator) -> Result<SliceHandle, SliceError> {
        let executable = locator.resolve()?;
        self.request.validate_input()?;
        self.request
            .profile
            .validate()
            .map_err(|reason| SliceError::Profile { reason })?;
        let ini = write_profile(&self.request)?;

        let mut command = Command::new(&executable);
        command
            .args(self.request.args(ini.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| SliceError::Spawn {
            reason: format!("{}: {}", executable.display(), e),
        })?;
        tracing::info!(
            "Slicing {} with {}",
            self.request.input.display(),
            executable.display()
        );

        let output = self.request.output.clone();
        let join = tokio::spawn(self.run(child, ini));
        Ok(SliceHandle { output, join })
    }

    fn emit(&self, event: SliceEvent) {
        if let Some(observer) = &self.observer {
            observer(event.clone());
        }
        if let Some(events) = &self.events {
            events.publish(PrinterEvent::Slice(event));
        }
    }

    async fn run(self, mut child: tokio::process::Child, ini: NamedTempFile) -> Result<SliceSuccess, SliceError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut captured = String::new();
        while let Some(line) = rx.recv().await {
            tracing::debug!("slicer: {}", line);
            captured.push_str(&line);
            captured.push('\n');
            self.emit(SliceEvent::Output(line));
        }

        let result = match child.wait().await {
            Ok(status) if status.success() => {
                tracing::info!("Sliced to {}", self.request.output.display());
                Ok(SliceSuccess {
                    output: self.request.output.clone(),
                    exit_code: status.code(),
                    captured_output: captured,
                })
            }
            Ok(status) => {
                tracing::warn!("Slicer exited with {}", status);
                Err(SliceError::SubprocessFailure {
                    exit_code: status.code(),
                    output: captured,
                })
            }
            Err(e) => Err(SliceError::Spawn {
                reason: e.to_string(),
            }),
        };

        // The profile must outlive the child process
        drop(ini);
        self.emit(SliceEvent::Finished(result.clone()));
        result
    }
}

fn write_profile(request: &SliceRequest) -> Result<NamedTempFile, SliceError> {
    let profile_error = |e: std::io::Error| SliceError::Profile {
        reason: e.to_string(),
    };
    let mut file = tempfile::Builder::new()
        .prefix("printkit-")
        .suffix(".ini")
        .tempfile()
        .map_err(profile_error)?;
    file.write_all(render_ini(&request.profile, &request.options).as_bytes())
        .map_err(profile_error)?;
    file.flush().map_err(profile_error)?;
    Ok(file)
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if tx.send(line.trim_end().to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading slicer output: {}", e);
                break;
            }
        }
    }
}
