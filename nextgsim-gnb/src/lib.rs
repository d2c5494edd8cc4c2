//! nextgsim-gnb - gNB RRC Control-Plane Session Manager
#![allow(missing_docs)]
//!
//! This crate implements the RRC control plane of a gNB:
//!
//! - UE context registry with RNTI allocation and per-UE state machines
//! - RRC connection setup, reconfiguration, release, suspend and resume
//! - Data radio bearer management
//! - Intra-gNB and X2 inter-gNB handover
//! - System information broadcast
//!
//! # Architecture
//!
//! The registry is synchronous and driven by a virtual-time scheduler, so
//! it can be stepped deterministically in tests. The [`rrc::RrcTask`] wraps
//! it in an async task that maps the wall clock onto registry time.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    RrcTask                     │
//! │   RrcMessage ──> Registry ──> Collaborators ──┼──> RrcOutput
//! │                     │                          │
//! │                VirtualScheduler                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nextgsim_gnb::app::load_and_validate_gnb_config;
//! use nextgsim_gnb::rrc::{channel_collaborators, RrcTask};
//! use nextgsim_gnb::tasks::{Task, TaskHandle, DEFAULT_CHANNEL_CAPACITY};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = load_and_validate_gnb_config("config/gnb.yaml").unwrap();
//!     let (output, output_rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);
//!     let (handle, rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);
//!     let collab = channel_collaborators(&config, output);
//!     let mut task = RrcTask::new(config, collab);
//!     tokio::spawn(async move { task.run(rx).await });
//!     // handle.send(RrcMessage::RadioAttempt { cell_id: 1 }).await;
//! }
//! ```

pub mod app;
pub mod rrc;
pub mod tasks;

// Re-export RRC module types
pub use rrc::{
    a3_target, channel_collaborators, deliver_x2, BearerId, Collaborators, Registry,
    RegistryStats, RrcError, RrcState, RrcTask, Step, UeContext,
};

// Re-export app module types
pub use app::{
    load_and_validate_gnb_config, load_gnb_config, load_gnb_config_from_str, validate_gnb_config,
    ConfigError, ConfigValidationError,
};

// Re-export task framework types
pub use tasks::{
    RrcMessage, RrcOutput, Task, TaskHandle, TaskMessage, TaskState, DEFAULT_CHANNEL_CAPACITY,
};
