//! Configuration Loading for gNB Application
//!
//! This module provides configuration loading and validation for the gNB.
//! It wraps the `GnbConfig` from `nextgsim-common` with additional validation
//! and error handling specific to the gNB application.
//!
//! # Example
//!
//! ```rust,ignore
//! use nextgsim_gnb::app::{load_gnb_config, validate_gnb_config};
//!
//! // Load and validate configuration
//! let config = load_gnb_config("config/gnb.yaml")?;
//! validate_gnb_config(&config)?;
//! ```

use std::collections::HashSet;
use std::path::Path;

use nextgsim_common::config::{GnbConfig, RrcConfig, SRS_PERIODICITIES};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Invalid gNB identifier
    #[error("Invalid gNB ID: {0}")]
    InvalidGnbId(String),

    /// Invalid TAC value
    #[error("Invalid TAC: {0}")]
    InvalidTac(String),

    /// Invalid PLMN
    #[error("Invalid PLMN: {0}")]
    InvalidPlmn(String),

    /// No served cell
    #[error("No cell configured: at least one cell must be served")]
    NoCellConfigured,

    /// Invalid served cell
    #[error("Invalid cell configuration: {0}")]
    InvalidCell(String),

    /// Invalid X2 neighbour
    #[error("Invalid neighbour configuration: {0}")]
    InvalidNeighbour(String),

    /// Invalid RRC section
    #[error("Invalid RRC configuration: {0}")]
    InvalidRrc(String),
}

/// Loads a gNB configuration from a YAML file.
///
/// This function reads the configuration file and parses it. For
/// comprehensive validation, call `validate_gnb_config` after loading.
pub fn load_gnb_config<P: AsRef<Path>>(path: P) -> Result<GnbConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_gnb_config_from_str(&contents)
}

/// Loads a gNB configuration from a YAML string.
pub fn load_gnb_config_from_str(yaml: &str) -> Result<GnbConfig, ConfigError> {
    let config: GnbConfig =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(config)
}

/// Validates a gNB configuration.
///
/// # Validation Rules
///
/// - gNB ID must fit in 24 bits (it forms the upper part of the 36-bit cell
///   identity broadcast in SIB1)
/// - TAC must be a valid 24-bit value (1 to 0xFFFFFF, 0 is reserved)
/// - PLMN MCC must be 3 digits (001-999), MNC 2-3 digits (00-999)
/// - At least one cell; cell ids unique and below 4096, PCIs in 0-1007
///   and unique, bandwidths in 1-275 PRBs
/// - Neighbour cells must not collide with served cells
/// - SRS periodicity must have an index window, reject wait time 1-16 s,
///   every timer non-zero
pub fn validate_gnb_config(config: &GnbConfig) -> Result<(), ConfigValidationError> {
    const MAX_GNB_ID: u32 = 0xFF_FFFF;
    if config.gnb_id > MAX_GNB_ID {
        return Err(ConfigValidationError::InvalidGnbId(format!(
            "gNB ID {} exceeds maximum 24-bit value ({})",
            config.gnb_id, MAX_GNB_ID
        )));
    }

    const MAX_TAC: u32 = 0xFF_FFFF;
    if config.tac == 0 {
        return Err(ConfigValidationError::InvalidTac(
            "TAC value 0 is reserved and cannot be used".to_string(),
        ));
    }
    if config.tac > MAX_TAC {
        return Err(ConfigValidationError::InvalidTac(format!(
            "TAC {} exceeds maximum 24-bit value ({})",
            config.tac, MAX_TAC
        )));
    }

    validate_plmn(&config.plmn)?;
    validate_cells(config)?;
    validate_rrc(&config.rrc)?;
    Ok(())
}

/// Validates a PLMN configuration.
fn validate_plmn(plmn: &nextgsim_common::Plmn) -> Result<(), ConfigValidationError> {
    if plmn.mcc == 0 || plmn.mcc > 999 {
        return Err(ConfigValidationError::InvalidPlmn(format!(
            "MCC {} must be between 001 and 999",
            plmn.mcc
        )));
    }
    if plmn.mnc > 999 {
        return Err(ConfigValidationError::InvalidPlmn(format!(
            "MNC {} must be between 00 and 999",
            plmn.mnc
        )));
    }
    Ok(())
}

fn validate_cells(config: &GnbConfig) -> Result<(), ConfigValidationError> {
    const MAX_CELL_ID: u16 = 0xFFF;
    const MAX_PCI: u16 = 1007;
    const MAX_PRBS: u16 = 275;

    if config.cells.is_empty() {
        return Err(ConfigValidationError::NoCellConfigured);
    }

    let mut cell_ids = HashSet::new();
    let mut pcis = HashSet::new();
    for cell in &config.cells {
        if cell.cell_id > MAX_CELL_ID {
            return Err(ConfigValidationError::InvalidCell(format!(
                "cell ID {} exceeds maximum 12-bit value ({})",
                cell.cell_id, MAX_CELL_ID
            )));
        }
        if !cell_ids.insert(cell.cell_id) {
            return Err(ConfigValidationError::InvalidCell(format!(
                "cell ID {} configured twice",
                cell.cell_id
            )));
        }
        if cell.pci > MAX_PCI || !pcis.insert(cell.pci) {
            return Err(ConfigValidationError::InvalidCell(format!(
                "cell {} has invalid or duplicate PCI {}",
                cell.cell_id, cell.pci
            )));
        }
        for (name, prbs) in [("DL", cell.dl_bandwidth_prbs), ("UL", cell.ul_bandwidth_prbs)] {
            if prbs == 0 || prbs > MAX_PRBS {
                return Err(ConfigValidationError::InvalidCell(format!(
                    "cell {} {} bandwidth {} PRBs must be between 1 and {}",
                    cell.cell_id, name, prbs, MAX_PRBS
                )));
            }
        }
    }

    for neighbour in &config.neighbours {
        if cell_ids.contains(&neighbour.cell_id) {
            return Err(ConfigValidationError::InvalidNeighbour(format!(
                "neighbour cell {} is also a served cell",
                neighbour.cell_id
            )));
        }
        if neighbour.pci > MAX_PCI || pcis.contains(&neighbour.pci) {
            return Err(ConfigValidationError::InvalidNeighbour(format!(
                "neighbour cell {} has invalid or clashing PCI {}",
                neighbour.cell_id, neighbour.pci
            )));
        }
    }
    Ok(())
}

fn validate_rrc(rrc: &RrcConfig) -> Result<(), ConfigValidationError> {
    if !SRS_PERIODICITIES.contains(&rrc.srs_periodicity) {
        return Err(ConfigValidationError::InvalidRrc(format!(
            "SRS periodicity {} must be one of {:?}",
            rrc.srs_periodicity, SRS_PERIODICITIES
        )));
    }
    if !(1..=16).contains(&rrc.reject_wait_time_s) {
        return Err(ConfigValidationError::InvalidRrc(format!(
            "reject wait time {} s must be between 1 and 16",
            rrc.reject_wait_time_s
        )));
    }
    let timers = &rrc.timers;
    for (name, ms) in [
        ("connection_request_ms", timers.connection_request_ms),
        ("connection_setup_ms", timers.connection_setup_ms),
        ("connection_rejected_ms", timers.connection_rejected_ms),
        ("handover_joining_ms", timers.handover_joining_ms),
        ("handover_leaving_ms", timers.handover_leaving_ms),
        ("data_inactivity_ms", timers.data_inactivity_ms),
        (
            "system_information_periodicity_ms",
            timers.system_information_periodicity_ms,
        ),
    ] {
        if ms == 0 {
            return Err(ConfigValidationError::InvalidRrc(format!("timer {} must be non-zero", name)));
        }
    }
    if rrc.max_connected_ues == Some(0) {
        return Err(ConfigValidationError::InvalidRrc(
            "max_connected_ues 0 admits no UE, omit it to disable the cap".to_string(),
        ));
    }
    Ok(())
}

/// Loads and validates a gNB configuration in one step.
pub fn load_and_validate_gnb_config<P: AsRef<Path>>(path: P) -> Result<GnbConfig, ConfigError> {
    let config = load_gnb_config(path)?;
    validate_gnb_config(&config)?;
    Ok(config)
}
