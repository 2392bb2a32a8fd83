//! Controller lifecycle, telemetry, and listener tests

mod common;

use async_trait::async_trait;
use common::{fast_config, simulated};
use parking_lot::Mutex;
use printkit_communication::{PrinterController, VirtualPrinter};
use printkit_core::{ConnectionState, PrinterEvent, PrinterListener, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_connect_publishes_state_changes() {
    let (controller, _printer) = simulated(fast_config());
    let mut rx = controller.subscribe();

    controller.connect("sim", 250000).await.unwrap();
    assert_eq!(
        controller.connection_state(),
        ConnectionState::Connected {
            port: "sim".into(),
            baud_rate: 250000
        }
    );

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PrinterEvent::ConnectionChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(states.first(), Some(&ConnectionState::Connecting));
    assert!(states.last().is_some_and(|s| s.is_connected()));
    controller.disconnect().await;
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_failed_connect_stays_disconnected() {
    let printer = VirtualPrinter::new();
    printer.set_disconnected(true);
    let controller = PrinterController::new(fast_config(), Arc::new(printer));

    assert!(controller.connect("sim", 115200).await.is_err());
    assert!(!controller.is_connected());
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_refresh_status_parses_telemetry() {
    let (controller, printer) = simulated(fast_config());
    printer.set_temperatures((200.0, 205.0), (59.5, 60.0));
    assert!(controller.snapshot().is_unknown());

    controller.connect("sim", 115200).await.unwrap();
    controller.send_command("G1 X10 Y20 Z0.2").await.unwrap();
    let snapshot = controller.refresh_status().await.unwrap();
    assert_eq!(snapshot.nozzle.current, Some(200.0));
    assert_eq!(snapshot.nozzle.target, Some(205.0));
    assert_eq!(snapshot.bed.current, Some(59.5));
    assert_eq!(snapshot.bed.target, Some(60.0));
    assert_eq!(snapshot.position_label(), "X10.00 Y20.00 Z0.20");
    assert_eq!(controller.snapshot(), snapshot);

    controller.disconnect().await;
    assert!(controller.snapshot().is_unknown());
}

#[tokio::test]
async fn test_background_polling_updates_watchers() {
    let mut config = fast_config();
    config.poller.idle_interval = Duration::from_millis(10);
    let (controller, printer) = simulated(config);
    printer.set_temperatures((180.0, 205.0), (40.0, 60.0));
    let mut status = controller.watch_status();

    controller.connect("sim", 115200).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), status.changed())
        .await
        .expect("poller never published")
        .unwrap();
    let snapshot: StatusSnapshot = *status.borrow();
    assert_eq!(snapshot.nozzle.current, Some(180.0));
    controller.disconnect().await;
}

#[derive(Default)]
struct ConsoleRecorder {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl PrinterListener for ConsoleRecorder {
    async fn on_console(&self, line: &printkit_core::ConsoleLine) {
        self.lines.lock().push(line.text.clone());
    }
}

#[tokio::test]
async fn test_listener_sees_console_traffic() {
    let (controller, _printer) = simulated(fast_config());
    let recorder = Arc::new(ConsoleRecorder::default());
    let handle = controller.register_listener(recorder.clone());
    assert_eq!(controller.listener_count(), 1);

    controller.connect("sim", 115200).await.unwrap();
    controller.send_command("M115").await.unwrap();
    controller.disconnect().await;

    // Give the listener task time to drain its queue
    for _ in 0..50 {
        if recorder.lines.lock().iter().any(|l| l == "Disconnected") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let lines = recorder.lines.lock().clone();
    assert!(lines.contains(&"M115".to_string()));
    assert!(lines.contains(&"ok".to_string()));

    assert!(controller.unregister_listener(&handle));
    assert!(!controller.unregister_listener(&handle));
    assert_eq!(controller.listener_count(), 0);
}

#[tokio::test]
async fn test_emergency_stop_halts_printer() {
    let (controller, printer) = simulated(fast_config());
    controller.connect("sim", 115200).await.unwrap();

    controller.emergency_stop().await.unwrap();
    controller.send_command("M105").await.unwrap();
    assert!(printer.is_halted());
    assert!(printer.written_lines().contains(&"M112".to_string()));
    controller.disconnect().await;
}
