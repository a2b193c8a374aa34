//! Serial port transport implementation
//!
//! Provides low-level serial port operations for direct hardware
//! connection to the router via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Non-blocking single-byte reads (short timeout mapped to "no data")

use super::{ConnectionParams, Transport};
use routerhost_core::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Information about an available serial port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }
}

/// List available serial ports on the system
///
/// Filters ports to include only controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let port_infos: Vec<SerialPortInfo> = ports
                .iter()
                .filter(|port| is_valid_router_port(&port.port_name))
                .map(|port| {
                    let mut info =
                        SerialPortInfo::new(&port.port_name, get_port_description(port));
                    if let serialport::SerialPortType::UsbPort(usb_info) = &port.port_type {
                        info.vid = Some(usb_info.vid);
                        info.pid = Some(usb_info.pid);
                        info.manufacturer = usb_info.manufacturer.clone();
                        info.serial_number = usb_info.serial_number.clone();
                    }
                    info
                })
                .collect();

            Ok(port_infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(TransportError::Other {
                message: format!("Failed to enumerate ports: {}", e),
            }
            .into())
        }
    }
}

/// Check if a port name matches controller patterns
fn is_valid_router_port(port_name: &str) -> bool {
    // Windows COM ports
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial transport using the serialport crate.
#[derive(Default)]
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    /// New, closed transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, params: &ConnectionParams) -> Result<()> {
        if self.port.is_some() {
            return Err(TransportError::Other {
                message: format!("Port {} is already open", params.port),
            }
            .into());
        }

        // Short timeout so read_byte behaves as a non-blocking poll.
        let builder = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(10))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open() {
            Ok(port) => {
                self.port = Some(port);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Err(TransportError::FailedToOpen {
                    port: params.port.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let written = port.write(bytes).map_err(|e| TransportError::IoError {
            reason: e.to_string(),
        })?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: bytes.len(),
            }
            .into());
        }
        Ok(written)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let mut buf = [0u8; 1];
        match port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => Err(TransportError::IoError {
                reason: e.to_string(),
            }
            .into()),
        }
    }
}
