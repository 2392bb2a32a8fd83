//! Shared fixtures for communication integration tests

#![allow(dead_code)]

use printkit_communication::{
    ChannelConfig, ControllerConfig, PollerConfig, PrinterController, SdCardConfig, StreamConfig,
    VirtualPrinter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Controller timing shrunk so tests finish quickly
pub fn fast_config() -> ControllerConfig {
    ControllerConfig {
        open_settle: Duration::ZERO,
        channel: ChannelConfig {
            response_settle: Duration::from_millis(1),
            response_timeout: Duration::from_millis(100),
        },
        poller: PollerConfig {
            idle_interval: Duration::from_secs(60),
            print_interval: Duration::from_secs(60),
        },
        sd_card: SdCardConfig {
            listing_settle: Duration::from_millis(1),
        },
        stream: StreamConfig {
            line_delay: Duration::ZERO,
        },
        ..ControllerConfig::default()
    }
}

/// Controller attached to a simulated printer
pub fn simulated(config: ControllerConfig) -> (PrinterController, VirtualPrinter) {
    let printer = VirtualPrinter::new();
    let controller = PrinterController::new(config, Arc::new(printer.clone()));
    (controller, printer)
}

/// Write a G-code file of `count` moves (plus blank lines that must be skipped)
pub fn write_moves(dir: &Path, count: usize) -> PathBuf {
    let path = dir.join("moves.gcode");
    let mut text = String::from("\n");
    for i in 0..count {
        text.push_str(&format!("  G1 X{} Y{}  \n", i, i));
        if i % 10 == 0 {
            text.push('\n');
        }
    }
    std::fs::write(&path, text).unwrap();
    path
}
