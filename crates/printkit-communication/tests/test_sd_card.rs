//! SD card workflow through the controller

mod common;

use common::{fast_config, simulated, write_moves};
use printkit_core::{PollMode, SdCardError, StreamOutcome};
use std::time::Duration;

#[tokio::test]
async fn test_sd_print_switches_to_print_polling() {
    let (controller, printer) = simulated(fast_config());
    controller.connect("sim", 115200).await.unwrap();
    assert_eq!(controller.poll_mode(), PollMode::Idle);

    let started = controller.start_sd_print("BENCHY.GCO").await.unwrap();
    assert_eq!(started, "BENCHY.GCO");
    assert!(printer.is_printing());
    assert_eq!(controller.poll_mode(), PollMode::Printing);
    assert!(controller.is_connected());

    let lines = printer.written_lines();
    assert!(lines.contains(&"M20".to_string()));
    assert_eq!(&lines[lines.len() - 2..], ["M23 BENCHY.GCO", "M24"]);
    controller.disconnect().await;
}

#[tokio::test]
async fn test_sd_print_can_disconnect() {
    let mut config = fast_config();
    config.disconnect_on_sd_print = true;
    let (controller, printer) = simulated(config);
    controller.connect("sim", 115200).await.unwrap();

    controller.start_sd_print("cube.gcode").await.unwrap();
    assert!(printer.is_printing());
    assert!(!controller.is_connected());
    assert!(printer.is_closed());
}

#[tokio::test]
async fn test_sd_errors_are_user_facing() {
    let (controller, _printer) = simulated(fast_config());

    let err = controller.start_sd_print("cube.gcode").await.unwrap_err();
    assert_eq!(err.to_string(), "Printer not connected.");

    controller.connect("sim", 115200).await.unwrap();
    let err = controller.start_sd_print("missing.gcode").await.unwrap_err();
    assert!(matches!(err, SdCardError::UnknownFile { .. }));

    let session = controller.sd_session();
    assert!(matches!(
        session.delete_selected(true).await,
        Err(SdCardError::NoSelection)
    ));
    controller.disconnect().await;
    assert!(session.entries().is_empty());
}

#[tokio::test]
async fn test_manual_command_waits_for_sd_listing() {
    let mut config = fast_config();
    config.sd_card.listing_settle = Duration::from_millis(300);
    let (controller, printer) = simulated(config);
    controller.connect("sim", 115200).await.unwrap();
    let session = controller.sd_session();

    let manual = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.send_command("G28").await
    };
    let (entries, reply) = tokio::join!(session.refresh(), manual);

    let names: Vec<_> = entries
        .unwrap()
        .into_iter()
        .map(|e| e.filename)
        .collect();
    assert_eq!(names, vec!["BENCHY.GCO", "cube.gcode"]);
    let reply = reply.unwrap().unwrap();
    assert!(!reply.contains("file list"));
    assert!(reply.contains("ok"));
    assert_eq!(printer.written_lines(), vec!["M21", "M20", "G28"]);
    controller.disconnect().await;
}

#[tokio::test]
async fn test_stream_waits_for_sd_listing() {
    let mut config = fast_config();
    config.sd_card.listing_settle = Duration::from_millis(300);
    let (controller, printer) = simulated(config);
    controller.connect("sim", 115200).await.unwrap();
    let session = controller.sd_session();
    let dir = tempfile::tempdir().unwrap();
    let path = write_moves(dir.path(), 5);

    let stream = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.start_stream(&path, None).unwrap().wait().await
    };
    let (entries, outcome) = tokio::join!(session.refresh(), stream);

    assert_eq!(entries.unwrap().len(), 2);
    assert_eq!(outcome, StreamOutcome::Completed { lines_sent: 5 });
    let lines = printer.written_lines();
    assert_eq!(lines.len(), 7);
    assert_eq!(&lines[..3], ["M21", "M20", "G1 X0 Y0"]);
    controller.disconnect().await;
}
