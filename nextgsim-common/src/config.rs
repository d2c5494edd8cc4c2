//! Configuration structures for the gNB RRC layer
//!
//! `GnbConfig` is loaded from YAML. Every RRC tuning knob has a default so a
//! minimal file only needs the PLMN, TAC and the served cells.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CellId, Plmn};

/// gNB (gNodeB) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnbConfig {
    /// gNB identifier
    #[serde(default = "default_gnb_id")]
    pub gnb_id: u32,
    /// Public Land Mobile Network identifier
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
    /// Cells served by this gNB
    pub cells: Vec<CellConfig>,
    /// Cells of other gNBs reachable over X2
    #[serde(default)]
    pub neighbours: Vec<NeighbourCellConfig>,
    /// RRC layer configuration
    #[serde(default)]
    pub rrc: RrcConfig,
}

fn default_gnb_id() -> u32 {
    1
}

impl GnbConfig {
    /// Returns the configuration of a served cell.
    pub fn cell(&self, cell_id: CellId) -> Option<&CellConfig> {
        self.cells.iter().find(|c| c.cell_id == cell_id)
    }

    /// Returns true if `cell_id` is served by this gNB.
    pub fn has_cell(&self, cell_id: CellId) -> bool {
        self.cell(cell_id).is_some()
    }

    /// Resolves a physical cell id to a cell id, looking at served cells
    /// first and then at X2 neighbours.
    pub fn cell_id_for_pci(&self, pci: u16) -> Option<CellId> {
        self.cells
            .iter()
            .find(|c| c.pci == pci)
            .map(|c| c.cell_id)
            .or_else(|| {
                self.neighbours
                    .iter()
                    .find(|n| n.pci == pci)
                    .map(|n| n.cell_id)
            })
    }
}

/// One served cell (component carrier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConfig {
    /// Cell identifier, unique across the network
    pub cell_id: CellId,
    /// Physical cell identifier (0-1007)
    pub pci: u16,
    /// NR absolute radio frequency channel number
    #[serde(default = "default_arfcn")]
    pub arfcn: u32,
    /// Downlink bandwidth in resource blocks
    #[serde(default = "default_bandwidth")]
    pub dl_bandwidth_prbs: u16,
    /// Uplink bandwidth in resource blocks
    #[serde(default = "default_bandwidth")]
    pub ul_bandwidth_prbs: u16,
}

fn default_arfcn() -> u32 {
    632628
}

fn default_bandwidth() -> u16 {
    100
}

/// A cell of a peer gNB reachable over X2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighbourCellConfig {
    /// Cell identifier
    pub cell_id: CellId,
    /// Physical cell identifier
    pub pci: u16,
}

/// How the RLC mode of a new data bearer is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RlcModePolicy {
    /// Transparent mode for every bearer
    AlwaysTm,
    /// Unacknowledged mode for every bearer
    #[default]
    AlwaysUm,
    /// Acknowledged mode for every bearer
    AlwaysAm,
    /// Acknowledged mode when the QoS class tolerates at most 1e-5 packet
    /// loss, unacknowledged otherwise
    PerBased,
}

/// How RRC containers travel inside inter-gNB messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RrcProtocolMode {
    /// Containers are bit-packed with the RRC codec
    #[default]
    Real,
    /// Containers are single-use tokens into the sending gNB's arena
    Ideal,
}

/// RRC procedure timers, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrcTimerConfig {
    /// Wait for a connection request after random access
    pub connection_request_ms: u64,
    /// Wait for setup complete after sending RRC Setup
    pub connection_setup_ms: u64,
    /// Keep a rejected context before removing it
    pub connection_rejected_ms: u64,
    /// Wait for the UE to arrive at a handover target
    pub handover_joining_ms: u64,
    /// Wait for the source side of a handover to be released
    pub handover_leaving_ms: u64,
    /// Release a connected UE after this much silence
    pub data_inactivity_ms: u64,
    /// System information broadcast period
    pub system_information_periodicity_ms: u64,
}

impl Default for RrcTimerConfig {
    fn default() -> Self {
        Self {
            connection_request_ms: 15,
            connection_setup_ms: 150,
            connection_rejected_ms: 30,
            handover_joining_ms: 200,
            handover_leaving_ms: 500,
            data_inactivity_ms: 10_000,
            system_information_periodicity_ms: 80,
        }
    }
}

impl RrcTimerConfig {
    pub fn connection_request(&self) -> Duration {
        Duration::from_millis(self.connection_request_ms)
    }

    pub fn connection_setup(&self) -> Duration {
        Duration::from_millis(self.connection_setup_ms)
    }

    pub fn connection_rejected(&self) -> Duration {
        Duration::from_millis(self.connection_rejected_ms)
    }

    pub fn handover_joining(&self) -> Duration {
        Duration::from_millis(self.handover_joining_ms)
    }

    pub fn handover_leaving(&self) -> Duration {
        Duration::from_millis(self.handover_leaving_ms)
    }

    pub fn data_inactivity(&self) -> Duration {
        Duration::from_millis(self.data_inactivity_ms)
    }

    pub fn system_information_periodicity(&self) -> Duration {
        Duration::from_millis(self.system_information_periodicity_ms)
    }
}

/// Measurement-based handover parameters (event A3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoverConfig {
    /// A3 offset in dB
    pub a3_offset_db: i32,
    /// Hysteresis in dB
    pub hysteresis_db: i32,
    /// Time the A3 condition must hold before triggering
    pub time_to_trigger_ms: u64,
    /// Trigger handovers from measurement reports
    pub automatic: bool,
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            a3_offset_db: 3,
            hysteresis_db: 1,
            time_to_trigger_ms: 640,
            automatic: false,
        }
    }
}

/// RRC layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrcConfig {
    /// Procedure timers
    pub timers: RrcTimerConfig,
    /// RLC mode selection for data bearers
    pub rlc_mode_policy: RlcModePolicy,
    /// Admit new RRC connections (false bars the cell)
    pub admit_connection_request: bool,
    /// Admit incoming handovers
    pub admit_handover_request: bool,
    /// Cap on simultaneously connected UEs
    pub max_connected_ues: Option<usize>,
    /// A core network collaborator is attached
    pub core_network_enabled: bool,
    /// Small data transfer from RRC_INACTIVE
    pub sdt_enabled: bool,
    /// SRS periodicity in ms (2, 5, 10, 20, 40, 80, 160 or 320)
    pub srs_periodicity: u16,
    /// Encoding of RRC containers in inter-gNB messages
    pub protocol: RrcProtocolMode,
    /// Back-off sent in RRC Reject, in seconds (1-16)
    pub reject_wait_time_s: u8,
    /// Handover triggering
    pub handover: HandoverConfig,
    /// UE aggregate maximum bit rate sent in handover requests, downlink
    pub ue_ambr_dl_bps: u64,
    /// UE aggregate maximum bit rate sent in handover requests, uplink
    pub ue_ambr_ul_bps: u64,
}

impl Default for RrcConfig {
    fn default() -> Self {
        Self {
            timers: RrcTimerConfig::default(),
            rlc_mode_policy: RlcModePolicy::default(),
            admit_connection_request: true,
            admit_handover_request: true,
            max_connected_ues: None,
            core_network_enabled: false,
            sdt_enabled: false,
            srs_periodicity: 320,
            protocol: RrcProtocolMode::default(),
            reject_wait_time_s: 3,
            handover: HandoverConfig::default(),
            ue_ambr_dl_bps: 200_000,
            ue_ambr_ul_bps: 100_000,
        }
    }
}

/// SRS periodicities with a configuration-index window.
pub const SRS_PERIODICITIES: [u16; 8] = [2, 5, 10, 20, 40, 80, 160, 320];
