//! Logging infrastructure for nextgsim
//!
//! Configurable logging on top of `tracing`, plus helpers that log RRC and
//! inter-gNB messages with a hex payload at trace level.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose, includes payload hex dumps
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Initialize the tracing subscriber with the specified log level.
///
/// The `RUST_LOG` environment variable overrides `level` when set. Calling
/// this more than once is harmless; later calls leave the first subscriber
/// in place.
///
/// # Example
///
/// ```
/// use nextgsim_common::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(&level.to_string());
}

/// Initialize logging with a custom filter string.
///
/// Allows fine-grained control over which modules log at which levels.
///
/// # Example
///
/// ```
/// use nextgsim_common::logging::init_logging_with_filter;
///
/// // Default to info, but show every state transition of the RRC layer
/// init_logging_with_filter("info,nextgsim_gnb::rrc=debug");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// Protocol direction for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Incoming/received message
    Rx,
    /// Outgoing/transmitted message
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("RX"),
            Direction::Tx => f.write_str("TX"),
        }
    }
}

/// Log an RRC message for one UE at debug level, with a hex dump at trace.
///
/// # Arguments
///
/// * `direction` - Message direction (RX or TX)
/// * `rnti` - RNTI of the UE the message belongs to
/// * `channel` - Logical channel name (e.g. "UL-CCCH")
/// * `msg_type` - Message type description
/// * `data` - Encoded message bytes
///
/// # Example
///
/// ```
/// use nextgsim_common::logging::{log_rrc_message, Direction};
///
/// log_rrc_message(Direction::Tx, 7, "DL-CCCH", "RRCSetup", &[0x20, 0x41]);
/// ```
pub fn log_rrc_message(direction: Direction, rnti: u16, channel: &str, msg_type: &str, data: &[u8]) {
    tracing::debug!(
        rnti,
        channel,
        len = data.len(),
        "{} RRC {} UE[{}]",
        direction,
        msg_type,
        rnti
    );
    tracing::trace!(rnti, hex = %HexDump(data), "RRC payload");
}

/// Log an inter-gNB message at debug level.
pub fn log_x2_message(direction: Direction, source_cell: u16, target_cell: u16, msg_type: &str) {
    tracing::debug!(
        source_cell,
        target_cell,
        "{} X2 {} cell {} -> cell {}",
        direction,
        msg_type,
        source_cell,
        target_cell
    );
}

/// Wrapper for hex dump formatting
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Format bytes as a compact hex string with optional grouping.
///
/// # Arguments
///
/// * `data` - Bytes to format
/// * `group_size` - Number of bytes per group (0 for no grouping)
///
/// # Example
///
/// ```
/// use nextgsim_common::logging::format_hex_compact;
///
/// let data = [0x12, 0x34, 0x56, 0x78];
/// assert_eq!(format_hex_compact(&data, 0), "12345678");
/// assert_eq!(format_hex_compact(&data, 2), "1234 5678");
/// ```
pub fn format_hex_compact(data: &[u8], group_size: usize) -> String {
    if group_size == 0 {
        return hex::encode(data);
    }

    data.chunks(group_size)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}
