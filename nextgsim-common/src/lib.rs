//! Common types and utilities for nextgsim
//!
//! This crate provides the bit cursor used by the RRC codec, shared
//! identifier and configuration types, logging setup, and the virtual-time
//! event queue that drives RRC timers.

pub mod bit_buffer;
pub mod config;
pub mod event_queue;
pub mod logging;
pub mod types;

pub use bit_buffer::{BitBuffer, BitBufferError, BitBufferReader};
pub use config::{
    CellConfig, GnbConfig, HandoverConfig, NeighbourCellConfig, RlcModePolicy, RrcConfig,
    RrcProtocolMode, RrcTimerConfig, SRS_PERIODICITIES,
};
pub use event_queue::{FiredEvent, Scheduler, SimTime, TimerHandle, VirtualScheduler};
pub use logging::{
    format_hex_compact, init_logging, init_logging_with_filter, log_rrc_message, log_x2_message,
    Direction, HexDump, LogLevel,
};
pub use types::{CellId, Plmn, Rnti, Teid};
