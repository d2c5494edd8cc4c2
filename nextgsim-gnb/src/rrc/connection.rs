//! RRC connection admission
//!
//! This module holds the pieces of RRC connection handling that do not
//! belong to a single UE context:
//! - `RrcAdmission` - config-driven admission control for connection,
//!   resume and handover requests, including cell barring
//! - `TransactionCounter` - the per-context RRC transaction identifier

use tracing::{debug, info};

use nextgsim_common::RrcConfig;

use super::sap::{AdmissionControl, AdmissionRequest};

/// Admission control driven by the RRC configuration.
///
/// Connection requests are admitted while the cell is not barred and the
/// number of connected UEs is below the configured cap. Handovers follow
/// their own flag and the same cap.
#[derive(Debug, Clone)]
pub struct RrcAdmission {
    /// Whether the cell is barred for new connections
    is_barred: bool,
    /// Whether incoming handovers are admitted
    admit_handover: bool,
    /// Cap on connected UEs
    max_connected_ues: Option<usize>,
}

impl RrcAdmission {
    /// Creates admission control from the RRC configuration
    pub fn new(config: &RrcConfig) -> Self {
        Self {
            is_barred: !config.admit_connection_request,
            admit_handover: config.admit_handover_request,
            max_connected_ues: config.max_connected_ues,
        }
    }

    /// Sets the cell barred status
    pub fn set_barred(&mut self, barred: bool) {
        self.is_barred = barred;
        if barred {
            info!("Cell is now barred");
        } else {
            info!("Cell is now unbarred");
        }
    }

    /// Returns true if the cell is barred
    pub fn is_barred(&self) -> bool {
        self.is_barred
    }

    pub fn set_admit_handover(&mut self, admit: bool) {
        self.admit_handover = admit;
    }

    fn below_cap(&self, request: &AdmissionRequest) -> bool {
        match self.max_connected_ues {
            Some(cap) if request.connected_ues >= cap => {
                debug!(
                    "UE[{}] {} connected UEs, cap is {}",
                    request.rnti, request.connected_ues, cap
                );
                false
            }
            _ => true,
        }
    }
}

impl AdmissionControl for RrcAdmission {
    fn admit_connection(&mut self, request: &AdmissionRequest) -> bool {
        if self.is_barred {
            debug!("UE[{}] rejected: cell {} is barred", request.rnti, request.cell_id);
            return false;
        }
        self.below_cap(request)
    }

    fn admit_handover(&mut self, request: &AdmissionRequest) -> bool {
        if !self.admit_handover {
            debug!("UE[{}] handover into cell {} not admitted", request.rnti, request.cell_id);
            return false;
        }
        self.below_cap(request)
    }
}

/// RRC transaction identifier of one context.
///
/// Identifiers are 2 bits wide; each new transaction pre-increments the
/// counter, so the first one issued is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionCounter {
    last: u8,
}

impl TransactionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the next transaction ID (cycles 0-3)
    pub fn next_tid(&mut self) -> u8 {
        self.last = (self.last + 1) % 4;
        self.last
    }

    /// Identifier of the most recent transaction
    pub fn last(&self) -> u8 {
        self.last
    }
}
