//! Serial port transport
//!
//! Provides port enumeration and a `Transport` backed by the `serialport`
//! crate. Reads are non-blocking: only the bytes already buffered by the
//! driver are returned.

use super::{ConnectionParams, Transport, TransportFactory};
use printkit_core::ConnectionError;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

/// List serial ports a printer could be attached to
///
/// Filters ports to the usual USB printer patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
///
/// Enumeration failure yields an empty list; the user can still type a
/// port name.
pub fn list_ports() -> Vec<SerialPortInfo> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .filter(|port| is_printer_port(&port.port_name))
            .map(|port| {
                let description = port_description(&port.port_type);
                match port.port_type {
                    serialport::SerialPortType::UsbPort(usb) => SerialPortInfo {
                        port_name: port.port_name,
                        description,
                        manufacturer: usb.manufacturer,
                        vid: Some(usb.vid),
                        pid: Some(usb.pid),
                    },
                    _ => SerialPortInfo {
                        port_name: port.port_name,
                        description,
                        manufacturer: None,
                        vid: None,
                        pid: None,
                    },
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Check if a port name looks like a printer connection
pub fn is_printer_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb_info) => format!(
            "USB {} {}",
            usb_info.manufacturer.as_deref().unwrap_or("Device"),
            usb_info.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Transport over a real serial port
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial port with the given parameters
    ///
    /// DTR and RTS are driven as configured (both low by default) so
    /// boards that reset on DTR do not reboot mid-session.
    pub fn open(params: &ConnectionParams) -> Result<Self, ConnectionError> {
        params.validate()?;

        let mut port = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.read_timeout_ms))
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                match e.kind() {
                    serialport::ErrorKind::NoDevice => ConnectionError::PortNotFound {
                        port: params.port.clone(),
                    },
                    _ => ConnectionError::FailedToOpen {
                        port: params.port.clone(),
                        reason: e.to_string(),
                    },
                }
            })?;

        // Not every adapter supports modem control lines
        if let Err(e) = port.write_data_terminal_ready(params.dtr) {
            tracing::debug!("Could not set DTR on {}: {}", params.port, e);
        }
        if let Err(e) = port.write_request_to_send(params.rts) {
            tracing::debug!("Could not set RTS on {}: {}", params.port, e);
        }

        tracing::info!("Opened {} @ {}", params.port, params.baud_rate);
        Ok(Self {
            port,
            name: params.port.clone(),
        })
    }
}

impl Transport for SerialTransport {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::other)? as usize;
        if waiting == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; waiting];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        tracing::info!("Closing {}", self.name);
        self.port.flush()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Factory for `SerialTransport`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTransportFactory;

impl TransportFactory for SerialTransportFactory {
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Transport>, ConnectionError> {
        Ok(Box::new(SerialTransport::open(params)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_port_patterns() {
        assert!(is_printer_port("COM3"));
        assert!(is_printer_port("/dev/ttyUSB0"));
        assert!(is_printer_port("/dev/ttyACM1"));
        assert!(is_printer_port("/dev/cu.usbmodem14101"));
        assert!(!is_printer_port("COM"));
        assert!(!is_printer_port("/dev/ttyS0"));
        assert!(!is_printer_port("/dev/tty.Bluetooth-Incoming-Port"));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let params = ConnectionParams::new("/dev/ttyUSB-printkit-missing", 115200);
        assert!(SerialTransport::open(&params).is_err());
    }
}
