//! Printer listener interface
//!
//! Defines the callback trait UI collaborators implement to observe the
//! printer without polling.

use crate::core::event::{ConsoleLine, PrinterEvent, SliceEvent, StreamEvent};
use crate::data::{ConnectionState, SdFileEntry, StatusSnapshot};
use async_trait::async_trait;
use std::path::Path;

/// Handle for a registered printer listener.
///
/// Uniquely identifies a listener subscription. Can be used to unsubscribe
/// from printer events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrinterListenerHandle(pub String);

/// Listener trait for printer events
///
/// Implement this trait to receive notifications; every method has an
/// empty default.
#[async_trait]
pub trait PrinterListener: Send + Sync {
    /// Called when the connection opens or closes
    async fn on_connection_changed(&self, _state: &ConnectionState) {}

    /// Called after a poll tick produced new telemetry
    async fn on_status_updated(&self, _snapshot: &StatusSnapshot) {}

    /// Called after an SD card listing refresh
    async fn on_sd_listing(&self, _entries: &[SdFileEntry]) {}

    /// Called after each streamed line (0-100)
    async fn on_stream_progress(&self, _percent: f64) {}

    /// Called once when a stream ends
    async fn on_stream_finished(&self, _lines_sent: usize, _completed: bool) {}

    /// Called for each line of slicer output
    async fn on_slice_output(&self, _line: &str) {}

    /// Called once when slicing ends; `None` means failure
    async fn on_slice_finished(&self, _output: Option<&Path>) {}

    /// Called for console traffic
    async fn on_console(&self, _line: &ConsoleLine) {}

    /// Called when an error occurs
    async fn on_error(&self, _message: &str) {}
}

/// Route one event to the matching listener method
pub async fn dispatch_to_listener(listener: &dyn PrinterListener, event: &PrinterEvent) {
    match event {
        PrinterEvent::ConnectionChanged(state) => listener.on_connection_changed(state).await,
        PrinterEvent::StatusUpdated(snapshot) => listener.on_status_updated(snapshot).await,
        PrinterEvent::PollModeChanged(_) => {}
        PrinterEvent::SdListingUpdated(entries) => listener.on_sd_listing(entries).await,
        PrinterEvent::Stream(StreamEvent::Progress { percent, .. }) => {
            listener.on_stream_progress(*percent).await
        }
        PrinterEvent::Stream(StreamEvent::Finished(outcome)) => {
            let completed = matches!(
                outcome,
                crate::core::event::StreamOutcome::Completed { .. }
            );
            listener
                .on_stream_finished(outcome.lines_sent(), completed)
                .await
        }
        PrinterEvent::Slice(SliceEvent::Output(line)) => listener.on_slice_output(line).await,
        PrinterEvent::Slice(SliceEvent::Finished(result)) => {
            listener
                .on_slice_finished(result.as_ref().ok().map(|s| s.output.as_path()))
                .await
        }
        PrinterEvent::Console(line) => listener.on_console(line).await,
        PrinterEvent::Error(msg) => listener.on_error(msg).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::StreamOutcome;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PrinterListener for Recorder {
        async fn on_stream_finished(&self, lines_sent: usize, completed: bool) {
            self.calls
                .lock()
                .push(format!("finished:{}:{}", lines_sent, completed));
        }

        async fn on_error(&self, message: &str) {
            self.calls.lock().push(format!("error:{}", message));
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_events() {
        let recorder = Recorder::default();
        dispatch_to_listener(
            &recorder,
            &PrinterEvent::Stream(StreamEvent::Finished(StreamOutcome::Cancelled {
                lines_sent: 40,
            })),
        )
        .await;
        dispatch_to_listener(&recorder, &PrinterEvent::Error("boom".into())).await;
        // Unhandled variants fall through to the default no-op
        dispatch_to_listener(&recorder, &PrinterEvent::StatusUpdated(StatusSnapshot::unknown()))
            .await;

        let calls = recorder.calls.lock();
        assert_eq!(*calls, vec!["finished:40:false", "error:boom"]);
    }
}
