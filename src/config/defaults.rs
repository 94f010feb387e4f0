//! Default configuration values

use std::time::Duration;

/// Environment variable naming the configuration document
pub const CONFIG_ENV: &str = "RFSUITE_CONFIG";

/// STM32 VCP ids used by FrSky radios in debug mode
pub const DEFAULT_SERIAL_VID: &str = "0483";
pub const DEFAULT_SERIAL_PID: &str = "5750";

/// Default serial baud rate
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

/// Default number of port discovery attempts
pub const DEFAULT_SERIAL_RETRIES: u32 = 10;

/// Default delay between serial attempts (seconds)
pub const DEFAULT_SERIAL_RETRY_DELAY: f64 = 1.0;

/// Default description hint for port matching
pub const DEFAULT_SERIAL_NAME_HINT: &str = "Serial";

/// Built-in description hints, tried after the configured one
pub const BUILTIN_PORT_HINTS: &[&str] = &["frsky", "serial", "stm", "vcp", "x20", "x18", "x14"];

/// Attempts to resolve the SCRIPTS path after disabling serial
pub const DEFAULT_MOUNT_ATTEMPTS: u32 = 10;

/// Delay between mount attempts (seconds)
pub const DEFAULT_MOUNT_RETRY_DELAY: f64 = 2.0;

/// Longest accepted retry delay (seconds)
pub const MAX_RETRY_DELAY: f64 = 3600.0;

/// Default Lua minifier executable
pub const DEFAULT_MINIFIER: &str = "luamin";

/// Pause after destructive steps on slow media
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Files above this size get an extra flush before copying to a radio
pub const LARGE_FILE_THRESHOLD: u64 = 5 * 1024;

/// Pause before copying a large file to a radio
pub const LARGE_FILE_PAUSE: Duration = Duration::from_millis(100);

/// USB re-enumeration latency after enabling serial mode
pub const TAIL_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Attempts to open a discovered port
pub const PORT_OPEN_ATTEMPTS: u32 = 8;

/// Serial read timeout, bounds cancellation latency
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial read chunk size
pub const SERIAL_READ_CHUNK: usize = 1024;

/// Vendor tool timeouts
pub const GET_PATH_TIMEOUT: Duration = Duration::from_secs(15);
pub const SERIAL_TOGGLE_TIMEOUT: Duration = Duration::from_secs(20);
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-file minifier timeout
pub const MINIFY_TIMEOUT: Duration = Duration::from_secs(60);
