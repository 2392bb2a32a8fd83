use printkit_core::*;
use std::path::PathBuf;

#[test]
fn test_material_presets() {
    let pla = Material::PLA.preset();
    assert_eq!((pla.nozzle_temp, pla.bed_temp, pla.fan_speed), (205, 60, 100));

    let tpu = Material::TPU.preset();
    assert_eq!((tpu.nozzle_temp, tpu.bed_temp, tpu.fan_speed), (230, 0, 100));

    assert_eq!("petg".parse::<Material>().unwrap(), Material::PETG);
    assert!("wood".parse::<Material>().is_err());
}

#[test]
fn test_firmware_kind_names() {
    assert_eq!(FirmwareKind::default(), FirmwareKind::Marlin);
    assert_eq!("rrf".parse::<FirmwareKind>().unwrap(), FirmwareKind::RepRap);
    assert_eq!(FirmwareKind::Klipper.gcode_flavor(), "klipper");
}

#[test]
fn test_event_display() {
    let event = PrinterEvent::StatusUpdated(StatusSnapshot {
        nozzle: Temperature::new(200.0, 205.0),
        bed: Temperature::default(),
        position: Some(Position::new(10.0, 20.0, 0.2)),
    });
    assert_eq!(
        event.to_string(),
        "Status: Nozzle: 200.0 / 205.0 | Bed: -- / -- | X10.00 Y20.00 Z0.20"
    );

    let event = PrinterEvent::Slice(SliceEvent::Finished(Ok(SliceSuccess {
        output: PathBuf::from("part.gcode"),
        exit_code: Some(0),
        captured_output: String::new(),
    })));
    assert_eq!(event.to_string(), "Slicing complete: part.gcode");

    let event = PrinterEvent::Stream(StreamEvent::Progress {
        lines_sent: 1,
        total_lines: 4,
        percent: 25.0,
    });
    assert_eq!(event.to_string(), "Streaming: 25%");
}

#[tokio::test]
async fn test_console_lines_reach_subscribers() {
    let events = EventDispatcher::default();
    let mut rx = events.subscribe();
    events.console(ConsoleDirection::Sent, "M105");

    match rx.recv().await.unwrap() {
        PrinterEvent::Console(line) => {
            assert_eq!(line.direction, ConsoleDirection::Sent);
            assert!(line.to_string().ends_with("SENT: M105"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_unified_error_wraps_layers() {
    let err: Error = SdCardError::NoSelection.into();
    assert_eq!(err.to_string(), "No SD file selected.");

    let err: Error = ChannelError::NotConnected.into();
    assert_eq!(err.to_string(), "Printer not connected");
}
