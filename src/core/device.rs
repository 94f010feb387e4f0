//! Radio state as reported by the vendor tool
//!
//! Ethos Suite prints fixed-layout, pipe-delimited tables. Parsing follows an
//! explicit line schema and fails with [`DeviceParseError`] when the output is
//! shorter than the schema requires. The one tolerated short form is the path
//! listing of a radio in debug mode, which omits the drive rows.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::DeviceParseError;

/// Version of the line schema below
pub const LINE_SCHEMA_VERSION: u32 = 1;

/// Row of `--list-radio` holding product and USB identifier
const RADIO_ROW: usize = 3;
const RADIO_MIN_LINES: usize = RADIO_ROW + 1;

/// First row of `--radio-path` holding a drive path
const PATHS_FIRST_ROW: usize = 3;
/// Lines needed for a full path listing; fewer means debug mode
const PATHS_MIN_LINES: usize = 8;

/// Drive folders reported by the radio, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountedPaths {
    pub bitmaps: PathBuf,
    pub scripts: PathBuf,
    pub screenshots: PathBuf,
    pub audio: PathBuf,
    pub i18n: PathBuf,
}

/// One physical radio, rebuilt from scratch on every query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Product name (e.g. `X20S`)
    pub product: String,
    /// Raw USB identifier string
    pub usb_identifier: String,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Mounted drive folders, absent in debug mode
    pub mounted_paths: Option<MountedPaths>,
    /// Radio exposes serial instead of mass storage
    pub in_debug_mode: bool,
    /// Serial endpoint, when known
    pub serial_port: Option<String>,
}

impl DeviceInfo {
    /// Parse the outputs of `--list-radio` and `--radio-path`
    pub fn parse(listing: &str, paths: &str) -> Result<Self, DeviceParseError> {
        Self::from_radio(parse_radio_listing(listing)?, paths)
    }

    /// Combine an already parsed radio row with the `--radio-path` output
    pub(crate) fn from_radio(radio: RadioRow, paths: &str) -> Result<Self, DeviceParseError> {
        let mounted_paths = parse_path_listing(paths)?;
        Ok(Self {
            product: radio.product,
            usb_identifier: radio.usb_identifier,
            vendor_id: radio.vendor_id,
            product_id: radio.product_id,
            in_debug_mode: mounted_paths.is_none(),
            mounted_paths,
            serial_port: None,
        })
    }

    /// Copy of this info with a serial endpoint attached
    #[must_use]
    pub fn with_serial_port(self, port: Option<String>) -> Self {
        Self {
            serial_port: port,
            ..self
        }
    }

    /// Vendor id as 4 hex digits
    pub fn vid_hex(&self) -> String {
        format!("{:04x}", self.vendor_id)
    }

    /// Product id as 4 hex digits
    pub fn pid_hex(&self) -> String {
        format!("{:04x}", self.product_id)
    }
}

pub(crate) struct RadioRow {
    product: String,
    usb_identifier: String,
    vendor_id: u16,
    product_id: u16,
}

/// Split a table row on `|`, trimming fields and dropping empty ones
pub fn row_fields(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

pub(crate) fn parse_radio_listing(output: &str) -> Result<RadioRow, DeviceParseError> {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() < RADIO_MIN_LINES {
        return Err(DeviceParseError::TooFewLines {
            query: "--list-radio".to_string(),
            expected: RADIO_MIN_LINES,
            found: lines.len(),
            schema: LINE_SCHEMA_VERSION,
        });
    }

    let fields = row_fields(lines[RADIO_ROW]);
    let field = |idx: usize, name: &str| {
        fields
            .get(idx)
            .map(|s| (*s).to_string())
            .ok_or_else(|| DeviceParseError::MissingField {
                query: "--list-radio".to_string(),
                line: RADIO_ROW,
                field: name.to_string(),
            })
    };
    let product = field(0, "product")?;
    let usb_identifier = field(1, "usbinfo")?;
    let (vendor_id, product_id) =
        parse_usb_ids(&usb_identifier).ok_or_else(|| DeviceParseError::MissingUsbIds {
            identifier: usb_identifier.clone(),
        })?;

    Ok(RadioRow {
        product,
        usb_identifier,
        vendor_id,
        product_id,
    })
}

fn parse_path_listing(output: &str) -> Result<Option<MountedPaths>, DeviceParseError> {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() < PATHS_MIN_LINES {
        tracing::debug!(
            "--radio-path returned {} lines (< {PATHS_MIN_LINES}), radio is in debug mode",
            lines.len()
        );
        return Ok(None);
    }

    let path_at = |offset: usize, name: &str| {
        let line = PATHS_FIRST_ROW + offset;
        row_fields(lines[line])
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| DeviceParseError::MissingField {
                query: "--radio-path".to_string(),
                line,
                field: name.to_string(),
            })
    };

    Ok(Some(MountedPaths {
        bitmaps: path_at(0, "bitmaps")?,
        scripts: path_at(1, "scripts")?,
        screenshots: path_at(2, "screenshots")?,
        audio: path_at(3, "audio")?,
        i18n: path_at(4, "i18n")?,
    }))
}

/// Extract vendor/product ids from `VID_0483&PID_5750` or `0483:5750` forms
pub fn parse_usb_ids(identifier: &str) -> Option<(u16, u16)> {
    static TAGGED: OnceLock<Option<Regex>> = OnceLock::new();
    static PAIR: OnceLock<Option<Regex>> = OnceLock::new();

    let tagged = TAGGED
        .get_or_init(|| Regex::new(r"(?i)VID[_:=]?([0-9a-f]{4}).*?PID[_:=]?([0-9a-f]{4})").ok());
    let pair = PAIR.get_or_init(|| Regex::new(r"(?i)\b([0-9a-f]{4}):([0-9a-f]{4})\b").ok());

    [tagged, pair]
        .into_iter()
        .flatten()
        .find_map(|re| re.captures(identifier))
        .and_then(|caps| {
            let vid = u16::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
            let pid = u16::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
            Some((vid, pid))
        })
}

/// Extract the path from `--get-path` output
///
/// The path is the last non-empty line, or the one before it when the tool
/// appends an `exit code` trailer.
pub fn parse_get_path(output: &str) -> Option<PathBuf> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let last = *lines.last()?;
    let path = if last.to_lowercase().starts_with("exit code") && lines.len() >= 2 {
        lines[lines.len() - 2]
    } else {
        last
    };
    Some(PathBuf::from(path))
}
