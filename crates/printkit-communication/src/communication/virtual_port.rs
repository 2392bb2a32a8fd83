//! Simulated printer
//!
//! An in-process stand-in for a Marlin-style board. It answers the
//! commands the host issues (temperature/position queries, SD card
//! listing and printing, heater targets, moves) and records every byte
//! written so tests can inspect the exact traffic.
//!
//! Clones share the same simulated machine, so a test can keep one clone
//! for inspection while another is handed to the command channel.

use super::{ConnectionParams, Transport, TransportFactory};
use parking_lot::Mutex;
use printkit_core::ConnectionError;
use std::io;
use std::sync::Arc;

#[derive(Debug)]
struct MachineState {
    written: Vec<u8>,
    line_buffer: String,
    outgoing: Vec<u8>,
    nozzle: (f64, f64),
    bed: (f64, f64),
    position: (f64, f64, f64),
    sd_files: Vec<(String, u64)>,
    selected: Option<String>,
    printing: bool,
    halted: bool,
    fail_io: bool,
    io_calls: usize,
    closed: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            written: Vec::new(),
            line_buffer: String::new(),
            outgoing: Vec::new(),
            nozzle: (21.3, 0.0),
            bed: (20.8, 0.0),
            position: (0.0, 0.0, 0.0),
            sd_files: vec![
                ("BENCHY.GCO".to_string(), 2_431_117),
                ("cube.gcode".to_string(), 48_210),
            ],
            selected: None,
            printing: false,
            halted: false,
            fail_io: false,
            io_calls: 0,
            closed: false,
        }
    }
}

impl MachineState {
    fn reply(&mut self, text: &str) {
        self.outgoing.extend_from_slice(text.as_bytes());
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.halted {
            self.reply("Error:Printer halted. kill() called!\n");
            return;
        }

        let mut words = line.split_whitespace();
        let code = words.next().unwrap_or_default().to_ascii_uppercase();
        let rest = line[code.len()..].trim().to_string();

        match code.as_str() {
            "M105" => {
                let text = format!(
                    "ok T:{:.1} /{:.1} B:{:.1} /{:.1} @:0 B@:0\n",
                    self.nozzle.0, self.nozzle.1, self.bed.0, self.bed.1
                );
                self.reply(&text);
            }
            "M114" => {
                let (x, y, z) = self.position;
                let text = format!(
                    "X:{:.2} Y:{:.2} Z:{:.2} E:0.00 Count X:{} Y:{} Z:{}\nok\n",
                    x,
                    y,
                    z,
                    (x * 80.0) as i64,
                    (y * 80.0) as i64,
                    (z * 400.0) as i64
                );
                self.reply(&text);
            }
            "M21" => self.reply("echo:SD card ok\nok\n"),
            "M20" => {
                let mut text = String::from("Begin file list\n");
                for (name, size) in &self.sd_files {
                    text.push_str(&format!("{} {}\n", name, size));
                }
                text.push_str("End file list\nok\n");
                self.reply(&text);
            }
            "M23" => {
                let size = self
                    .sd_files
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&rest))
                    .map(|(_, size)| *size);
                match size {
                    Some(size) => {
                        self.selected = Some(rest.clone());
                        let text = format!("echo:Now fresh file: {}\nFile opened: {} Size: {}\nFile selected\nok\n", rest, rest, size);
                        self.reply(&text);
                    }
                    None => {
                        let text = format!("echo:Open failed, File: {}.\nok\n", rest);
                        self.reply(&text);
                    }
                }
            }
            "M24" => {
                if self.selected.is_some() {
                    self.printing = true;
                }
                self.reply("ok\n");
            }
            "M30" => {
                let before = self.sd_files.len();
                self.sd_files
                    .retain(|(name, _)| !name.eq_ignore_ascii_case(&rest));
                if self.sd_files.len() < before {
                    let text = format!("File deleted:{}\nok\n", rest);
                    self.reply(&text);
                } else {
                    self.reply("Deletion failed, File: \nok\n");
                }
            }
            "M104" | "M109" => {
                if let Some(target) = word_value(&rest, 'S') {
                    self.nozzle.1 = target;
                }
                self.reply("ok\n");
            }
            "M140" | "M190" => {
                if let Some(target) = word_value(&rest, 'S') {
                    self.bed.1 = target;
                }
                self.reply("ok\n");
            }
            "M112" => {
                self.halted = true;
                self.printing = false;
                self.reply("echo:Emergency stop\n");
            }
            "G28" => {
                self.position = (0.0, 0.0, 0.0);
                self.reply("ok\n");
            }
            "G0" | "G1" => {
                if let Some(x) = word_value(&rest, 'X') {
                    self.position.0 = x;
                }
                if let Some(y) = word_value(&rest, 'Y') {
                    self.position.1 = y;
                }
                if let Some(z) = word_value(&rest, 'Z') {
                    self.position.2 = z;
                }
                self.reply("ok\n");
            }
            _ => self.reply("ok\n"),
        }
    }
}

/// Value of a G-code word (e.g. `S205` for letter `S`)
fn word_value(args: &str, letter: char) -> Option<f64> {
    args.split_whitespace()
        .take_while(|w| !w.starts_with(';'))
        .find_map(|w| {
            let mut chars = w.chars();
            let first = chars.next()?;
            if first.eq_ignore_ascii_case(&letter) {
                chars.as_str().parse().ok()
            } else {
                None
            }
        })
}

/// Simulated Marlin-style printer
#[derive(Debug, Clone, Default)]
pub struct VirtualPrinter {
    state: Arc<Mutex<MachineState>>,
}

impl VirtualPrinter {
    /// Create a simulated printer with a cold hotend and two SD files
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the files on the simulated SD card
    pub fn with_sd_files(self, files: &[(&str, u64)]) -> Self {
        self.state.lock().sd_files = files
            .iter()
            .map(|(name, size)| (name.to_string(), *size))
            .collect();
        self
    }

    /// Set the simulated heater readings
    pub fn set_temperatures(&self, nozzle: (f64, f64), bed: (f64, f64)) {
        let mut state = self.state.lock();
        state.nozzle = nozzle;
        state.bed = bed;
    }

    /// Queue raw bytes as if the printer had sent them unprompted
    pub fn push_output(&self, text: &str) {
        self.state.lock().reply(text);
    }

    /// Make every subsequent read and write fail, as if the cable was pulled
    pub fn set_disconnected(&self, failed: bool) {
        self.state.lock().fail_io = failed;
    }

    /// Every byte written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Every line written so far, without the trailing newline
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.state.lock().written)
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    /// Number of reads and writes performed through the transport
    pub fn io_calls(&self) -> usize {
        self.state.lock().io_calls
    }

    /// Names currently on the simulated SD card
    pub fn sd_files(&self) -> Vec<String> {
        self.state
            .lock()
            .sd_files
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether an SD print was started
    pub fn is_printing(&self) -> bool {
        self.state.lock().printing
    }

    /// Whether an emergency stop was received
    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }

    /// Whether the host closed the link
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Transport for VirtualPrinter {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.io_calls += 1;
        if state.fail_io || state.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated printer unplugged",
            ));
        }

        state.written.extend_from_slice(data);
        state.line_buffer.push_str(&String::from_utf8_lossy(data));
        while let Some(end) = state.line_buffer.find('\n') {
            let line: String = state.line_buffer.drain(..=end).collect();
            state.handle_line(&line);
        }
        Ok(())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.io_calls += 1;
        if state.fail_io || state.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated printer unplugged",
            ));
        }
        Ok(std::mem::take(&mut state.outgoing))
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn name(&self) -> String {
        "virtual".to_string()
    }
}

impl TransportFactory for VirtualPrinter {
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Transport>, ConnectionError> {
        let mut state = self.state.lock();
        if state.fail_io {
            return Err(ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: "simulated printer unplugged".to_string(),
            });
        }
        state.closed = false;
        state.halted = false;
        state.outgoing.clear();
        drop(state);
        tracing::info!("Opened simulated printer as {}", params.port);
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(printer: &mut VirtualPrinter, command: &str) -> String {
        printer.write_bytes(format!("{}\n", command).as_bytes()).unwrap();
        String::from_utf8(printer.read_available().unwrap()).unwrap()
    }

    #[test]
    fn test_temperature_reply_tracks_targets() {
        let mut printer = VirtualPrinter::new();
        exchange(&mut printer, "M104 S205");
        exchange(&mut printer, "M140 S60");
        let reply = exchange(&mut printer, "M105");
        assert!(reply.contains("/205.0"));
        assert!(reply.contains("/60.0"));
    }

    #[test]
    fn test_moves_update_position() {
        let mut printer = VirtualPrinter::new();
        exchange(&mut printer, "G1 X10 Y20 Z0.2 F3000");
        let reply = exchange(&mut printer, "M114");
        assert!(reply.starts_with("X:10.00 Y:20.00 Z:0.20"));
    }

    #[test]
    fn test_sd_delete_removes_file() {
        let mut printer = VirtualPrinter::new().with_sd_files(&[("a.gcode", 1), ("b.gcode", 2)]);
        let reply = exchange(&mut printer, "M30 a.gcode");
        assert!(reply.contains("File deleted:a.gcode"));
        assert_eq!(printer.sd_files(), vec!["b.gcode"]);
    }

    #[test]
    fn test_unplugged_fails_io() {
        let mut printer = VirtualPrinter::new();
        printer.set_disconnected(true);
        assert!(printer.write_bytes(b"M105\n").is_err());
        assert!(printer.read_available().is_err());
    }

    #[test]
    fn test_partial_writes_are_buffered() {
        let mut printer = VirtualPrinter::new();
        printer.write_bytes(b"M1").unwrap();
        assert!(printer.read_available().unwrap().is_empty());
        printer.write_bytes(b"05\n").unwrap();
        assert!(!printer.read_available().unwrap().is_empty());
        assert_eq!(printer.written_lines(), vec!["M105"]);
    }
}
