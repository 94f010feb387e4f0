//! Serial endpoint discovery
//!
//! Matches a visible serial port by exact USB vendor/product id, falling back
//! to case-insensitive name hints against the port description.

use crate::config::defaults::BUILTIN_PORT_HINTS;
use crate::infra::serial::{PortDescriptor, PortEnumerator};

/// Finds the radio's serial endpoint among the host's ports
pub struct SerialLocator<'a> {
    enumerator: &'a dyn PortEnumerator,
}

impl<'a> SerialLocator<'a> {
    /// Locator over `enumerator`
    pub fn new(enumerator: &'a dyn PortEnumerator) -> Self {
        Self { enumerator }
    }

    /// Visible ports, empty when enumeration fails
    pub fn ports(&self) -> Vec<PortDescriptor> {
        match self.enumerator.ports() {
            Ok(ports) => {
                for port in &ports {
                    tracing::debug!(
                        "Detected port {} vid={:?} pid={:?} desc='{}' iface={:?}",
                        port.name,
                        port.vid.map(|v| format!("{v:04x}")),
                        port.pid.map(|p| format!("{p:04x}")),
                        port.description,
                        port.interface
                    );
                }
                ports
            }
            Err(e) => {
                tracing::warn!("Serial port enumeration failed: {e}");
                Vec::new()
            }
        }
    }

    /// Name of the first matching port
    ///
    /// An exact vid/pid match wins when both ids parse as hex. Otherwise the
    /// first port whose description or interface contains `name_hint` or a
    /// built-in hint is returned.
    pub fn find_port(
        &self,
        vid: Option<&str>,
        pid: Option<&str>,
        name_hint: Option<&str>,
    ) -> Option<String> {
        let ports = self.ports();

        if let (Some(vid), Some(pid)) = (vid.and_then(parse_hex_id), pid.and_then(parse_hex_id)) {
            if let Some(port) = ports
                .iter()
                .find(|p| p.vid == Some(vid) && p.pid == Some(pid))
            {
                tracing::debug!("Matched {} by id {vid:04x}:{pid:04x}", port.name);
                return Some(port.name.clone());
            }
        }

        let hints: Vec<String> = name_hint
            .filter(|h| !h.trim().is_empty())
            .map(|h| h.trim().to_lowercase())
            .into_iter()
            .chain(BUILTIN_PORT_HINTS.iter().map(|h| (*h).to_string()))
            .collect();

        ports
            .iter()
            .find(|p| {
                let haystack = format!(
                    "{} {}",
                    p.description,
                    p.interface.as_deref().unwrap_or_default()
                )
                .to_lowercase();
                hints.iter().any(|h| haystack.contains(h.as_str()))
            })
            .map(|p| {
                tracing::debug!("Matched {} by name hint", p.name);
                p.name.clone()
            })
    }
}

/// Parse a 16-bit id given as hex, with or without `0x`
pub fn parse_hex_id(id: &str) -> Option<u16> {
    let id = id.trim();
    let digits = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .unwrap_or(id);
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fixed port list
    pub(crate) struct FixedPorts(pub Vec<PortDescriptor>);

    impl PortEnumerator for FixedPorts {
        fn ports(&self) -> std::io::Result<Vec<PortDescriptor>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenEnumerator;

    impl PortEnumerator for BrokenEnumerator {
        fn ports(&self) -> std::io::Result<Vec<PortDescriptor>> {
            Err(std::io::Error::other("no access"))
        }
    }

    pub(crate) fn usb_port(name: &str, vid: u16, pid: u16, description: &str) -> PortDescriptor {
        PortDescriptor {
            name: name.to_string(),
            vid: Some(vid),
            pid: Some(pid),
            description: description.to_string(),
            interface: None,
        }
    }

    #[test]
    fn test_exact_match_returns_first() {
        let ports = FixedPorts(vec![
            usb_port("/dev/ttyACM0", 0x0483, 0x5750, "STMicro"),
            usb_port("/dev/ttyACM1", 0x1234, 0x5678, "Other"),
        ]);
        let locator = SerialLocator::new(&ports);
        assert_eq!(
            locator.find_port(Some("0483"), Some("5750"), None).as_deref(),
            Some("/dev/ttyACM0")
        );
        assert_eq!(
            locator.find_port(Some("0x1234"), Some("5678"), None).as_deref(),
            Some("/dev/ttyACM1")
        );
    }

    #[test]
    fn test_hint_fallback_without_ids() {
        let ports = FixedPorts(vec![
            PortDescriptor {
                name: "/dev/ttyS0".to_string(),
                description: "Onboard UART".to_string(),
                ..PortDescriptor::default()
            },
            PortDescriptor {
                name: "COM9".to_string(),
                description: "FrSky Ethos Radio".to_string(),
                ..PortDescriptor::default()
            },
        ]);
        let locator = SerialLocator::new(&ports);
        assert_eq!(
            locator.find_port(None, None, Some("frsky")).as_deref(),
            Some("COM9")
        );
    }

    #[test]
    fn test_interface_string_is_matched() {
        let ports = FixedPorts(vec![PortDescriptor {
            name: "COM4".to_string(),
            description: "USB device".to_string(),
            interface: Some("Radio VCP".to_string()),
            ..PortDescriptor::default()
        }]);
        let locator = SerialLocator::new(&ports);
        assert_eq!(locator.find_port(None, None, None).as_deref(), Some("COM4"));
    }

    #[test]
    fn test_invalid_ids_fall_back_to_hints() {
        let ports = FixedPorts(vec![usb_port("COM3", 0x0483, 0x5750, "X20 serial")]);
        let locator = SerialLocator::new(&ports);
        assert_eq!(
            locator.find_port(Some("zz"), Some("5750"), Some("x20")).as_deref(),
            Some("COM3")
        );
    }

    #[test]
    fn test_no_match_is_none() {
        let ports = FixedPorts(vec![usb_port("COM1", 0x1111, 0x2222, "Keyboard")]);
        let locator = SerialLocator::new(&ports);
        assert_eq!(locator.find_port(Some("0483"), Some("5750"), Some("radio")), None);
    }

    #[test]
    fn test_enumeration_failure_is_empty() {
        let locator = SerialLocator::new(&BrokenEnumerator);
        assert!(locator.ports().is_empty());
        assert_eq!(locator.find_port(Some("0483"), Some("5750"), None), None);
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("0483"), Some(0x0483));
        assert_eq!(parse_hex_id(" 0X5750 "), Some(0x5750));
        assert_eq!(parse_hex_id("12345"), None);
        assert_eq!(parse_hex_id("xyz"), None);
    }
}
