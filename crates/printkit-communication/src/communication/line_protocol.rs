//! Line framing and response collection
//!
//! Printers speak newline-terminated ASCII. There is no reliable
//! end-of-response marker across firmwares, so a response is considered
//! complete once the link has been quiet for one settle window.

use super::Transport;
use std::io;
use std::time::Duration;
use tokio::time::Instant;

/// Default pause between writing a command and reading its reply
pub const DEFAULT_RESPONSE_SETTLE: Duration = Duration::from_millis(100);

/// Default upper bound on response collection
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Frame a command for the wire
///
/// Keeps printable ASCII and spaces only, trims, and appends a single
/// `\n`. A blank command frames to just the newline.
pub fn frame(command: &str) -> Vec<u8> {
    let printable: String = command
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    let mut line = printable.trim().to_string();
    line.push('\n');
    line.into_bytes()
}

/// Collect a response after a write
///
/// Sleeps `settle`, then keeps draining until a full settle window passes
/// with no new bytes or `timeout` elapses. Invalid UTF-8 is replaced, and
/// a timeout returns whatever was gathered.
pub async fn collect_response(
    transport: &mut dyn Transport,
    settle: Duration,
    timeout: Duration,
) -> io::Result<String> {
    let deadline = Instant::now() + timeout;
    let mut response = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(settle.min(remaining)).await;

        let chunk = transport.read_available()?;
        if chunk.is_empty() {
            break;
        }
        response.extend_from_slice(&chunk);

        if Instant::now() >= deadline {
            tracing::debug!("Response collection hit the {:?} timeout", timeout);
            break;
        }
    }

    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// Read whatever is buffered without writing
pub fn drain(transport: &mut dyn Transport) -> io::Result<String> {
    let bytes = transport.read_available()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
