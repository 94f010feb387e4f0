//! Serial port access
//!
//! Thin adapters over the `serialport` crate behind two seams: enumerating
//! endpoints and opening one as a byte stream.

use std::io::Read;

use crate::config::defaults::SERIAL_READ_TIMEOUT;

/// One serial endpoint visible to the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDescriptor {
    /// OS name of the port (e.g. `/dev/ttyACM0`, `COM7`)
    pub name: String,
    /// USB vendor id, if the port is USB-backed
    pub vid: Option<u16>,
    /// USB product id, if the port is USB-backed
    pub pid: Option<u16>,
    /// Human readable description (manufacturer and product)
    pub description: String,
    /// USB interface string, when the platform reports one
    pub interface: Option<String>,
}

/// Lists serial endpoints
pub trait PortEnumerator: Send + Sync {
    /// Currently visible endpoints
    fn ports(&self) -> std::io::Result<Vec<PortDescriptor>>;
}

/// Failure to open a port
#[derive(Debug)]
pub enum OpenError {
    /// The port vanished (driver rebind, re-enumeration)
    NotFound(String),
    /// Any other failure (access denied, busy, ...)
    Other(String),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "device not found: {msg}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// A readable serial stream
pub type SerialStream = Box<dyn Read + Send>;

/// Opens a port for reading
pub trait PortOpener: Send + Sync {
    /// Open `port` at `baud`; reads must time out periodically
    fn open(&self, port: &str, baud: u32) -> Result<SerialStream, OpenError>;
}

/// Enumerates and opens ports through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerial;

impl PortEnumerator for SystemSerial {
    fn ports(&self) -> std::io::Result<Vec<PortDescriptor>> {
        let ports = serialport::available_ports().map_err(std::io::Error::other)?;
        Ok(ports.into_iter().map(describe).collect())
    }
}

impl PortOpener for SystemSerial {
    fn open(&self, port: &str, baud: u32) -> Result<SerialStream, OpenError> {
        let mut builder = serialport::new(port, baud).timeout(SERIAL_READ_TIMEOUT);
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        match builder.open() {
            Ok(stream) => Ok(Box::new(stream)),
            Err(e) => Err(classify_open_error(&e)),
        }
    }
}

fn classify_open_error(e: &serialport::Error) -> OpenError {
    match e.kind() {
        serialport::ErrorKind::NoDevice
        | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            OpenError::NotFound(e.to_string())
        }
        _ => OpenError::Other(e.to_string()),
    }
}

fn describe(info: serialport::SerialPortInfo) -> PortDescriptor {
    match info.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let description = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            PortDescriptor {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                description,
                interface: None,
            }
        }
        serialport::SerialPortType::BluetoothPort => PortDescriptor {
            name: info.port_name,
            description: "Bluetooth".to_string(),
            ..PortDescriptor::default()
        },
        serialport::SerialPortType::PciPort | serialport::SerialPortType::Unknown => {
            PortDescriptor {
                name: info.port_name,
                ..PortDescriptor::default()
            }
        }
    }
}
