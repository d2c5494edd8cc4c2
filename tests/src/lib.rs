//! Integration test framework for the nextgsim gNB RRC control plane
#![allow(missing_docs)]
//!
//! This crate provides mock collaborators and a UE emulator for driving
//! one or two gNB registries through complete RRC procedures.
//!
//! # Components
//!
//! - [`mock_env`] - Recording admission, data path, radio, core and X2
//!   collaborators
//! - [`ue_emulator`] - Uplink message builders and a scripted UE
//! - [`test_fixtures`] - Common gNB configurations and X2 message pumping
//! - [`test_utils`] - Utility functions for test setup and assertions
//!
//! # Test Categories
//!
//! 1. **Scenarios** - Connection setup, timeouts, bearer exhaustion,
//!    intra-gNB handover
//! 2. **Handover** - Intra-gNB and X2 handover, data forwarding, A3 triggers
//! 3. **Inactive** - RedCap suspend, paging, resume and small data transfer
//! 4. **Procedures** - Reestablishment, protocol violations, timers
//! 5. **Properties** - Identifier uniqueness and codec invariants
//! 6. **RRC task** - The registry running inside a tokio task

pub mod mock_env;
pub mod test_fixtures;
pub mod ue_emulator;

pub use mock_env::{MockEnv, Recorder};
pub use test_fixtures::{
    cell, exchange_x2, single_cell_config, two_cell_config, x2_pair_configs, TestGnb,
};
pub use test_utils::{
    init_test_logging, wait_for, wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
pub use ue_emulator::Ue;
