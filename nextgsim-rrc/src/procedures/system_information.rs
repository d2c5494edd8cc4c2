//! System Information
//!
//! MIB and SystemInformation (SIB1, optionally SIB2) broadcast on BCCH.
//!
//! MIB carries what a UE needs to read the rest: system frame number,
//! bandwidth and subcarrier spacing. SIB1 carries cell access information
//! (PLMN, TAC, cell identity, barring) and SIB2 the common radio resource
//! configuration used for random access.

use nextgsim_common::Plmn;
use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::MAX_ARFCN;
use crate::message::BcchMessage;
use crate::per_enumerated;

/// Errors that can occur during System Information procedures
#[derive(Debug, Error)]
pub enum SystemInformationError {
    /// Encoding failed
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding failed
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid message type received
    #[error("Invalid message type: expected {expected}, got {actual}")]
    InvalidMessageType { expected: String, actual: String },
}

/// Highest number of resource blocks in a carrier.
pub const MAX_BANDWIDTH_PRBS: u16 = 275;

/// Default SDT data volume threshold advertised in SIB1, in bytes.
pub const DEFAULT_SDT_DATA_VOLUME_THRESHOLD: u16 = 1000;

// ============================================================================
// MIB (Master Information Block)
// ============================================================================

per_enumerated! {
    /// Subcarrier spacing for common control channels
    pub enum SubCarrierSpacingCommon {
        /// 15 kHz or 60 kHz (FR1 or FR2)
        Scs15Or60,
        /// 30 kHz or 120 kHz (FR1 or FR2)
        Scs30Or120,
    }
}

/// Master Information Block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterInformationBlock {
    /// System Frame Number (0-1023)
    pub system_frame_number: u16,
    /// Downlink bandwidth in resource blocks (1-275)
    pub dl_bandwidth_prbs: u16,
    pub sub_carrier_spacing_common: SubCarrierSpacingCommon,
}

impl PerCodec for MasterInformationBlock {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.bitstring(self.system_frame_number as u64, 10)?;
        enc.integer(self.dl_bandwidth_prbs as i64, 1, MAX_BANDWIDTH_PRBS as i64)?;
        self.sub_carrier_spacing_common.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            system_frame_number: dec.bitstring(10)? as u16,
            dl_bandwidth_prbs: dec.integer(1, MAX_BANDWIDTH_PRBS as i64)? as u16,
            sub_carrier_spacing_common: SubCarrierSpacingCommon::decode(dec)?,
        })
    }
}

// ============================================================================
// SIB1 (System Information Block Type 1)
// ============================================================================

/// Cell selection information for SIB1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSelectionInfo {
    /// Minimum required RX level in 2 dB steps (-70..-22)
    pub q_rx_lev_min: i8,
}

impl PerCodec for CellSelectionInfo {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.q_rx_lev_min as i64, -70, -22)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            q_rx_lev_min: dec.integer(-70, -22)? as i8,
        })
    }
}

/// System Information Block Type 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sib1 {
    pub plmn: Plmn,
    /// Tracking Area Code (24 bits)
    pub tracking_area_code: u32,
    /// Cell Identity (36 bits)
    pub cell_identity: u64,
    /// True while the cell admits no new connections
    pub cell_barred: bool,
    pub cell_selection_info: Option<CellSelectionInfo>,
    /// Largest uplink payload eligible for small data transfer, in bytes
    pub sdt_data_volume_threshold: Option<u16>,
}

impl PerCodec for Sib1 {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(
            true,
            [
                self.cell_selection_info.is_some(),
                self.sdt_data_volume_threshold.is_some(),
            ],
        );
        self.plmn.encode(enc)?;
        enc.bitstring(self.tracking_area_code as u64, 24)?;
        enc.bitstring(self.cell_identity, 36)?;
        enc.boolean(self.cell_barred);
        enc.optional(&self.cell_selection_info)?;
        if let Some(threshold) = self.sdt_data_volume_threshold {
            enc.integer(threshold as i64, 0, u16::MAX as i64)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_selection, has_sdt] = dec.sequence(true)?;
        let plmn = Plmn::decode(dec)?;
        let tracking_area_code = dec.bitstring(24)? as u32;
        let cell_identity = dec.bitstring(36)?;
        let cell_barred = dec.boolean()?;
        let cell_selection_info = dec.optional(has_selection)?;
        let sdt_data_volume_threshold = if has_sdt {
            Some(dec.integer(0, u16::MAX as i64)? as u16)
        } else {
            None
        };
        Ok(Self {
            plmn,
            tracking_area_code,
            cell_identity,
            cell_barred,
            cell_selection_info,
            sdt_data_volume_threshold,
        })
    }
}

// ============================================================================
// SIB2 (radio resource configuration common)
// ============================================================================

per_enumerated! {
    /// Maximum number of preamble transmissions
    pub enum PreambleTransMax {
        N3,
        N4,
        N5,
        N6,
        N7,
        N8,
        N10,
        N20,
        N50,
        N100,
        N200,
    }
}

/// Common random access configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RachConfigCommon {
    /// Contention-based preambles (1-64)
    pub number_of_ra_preambles: u8,
    pub preamble_trans_max: PreambleTransMax,
    /// RA response window in subframes (2-10)
    pub ra_response_window_size: u8,
    /// Connection establishment failure count (1-4)
    pub conn_est_fail_count: u8,
}

impl Default for RachConfigCommon {
    fn default() -> Self {
        Self {
            number_of_ra_preambles: 52,
            preamble_trans_max: PreambleTransMax::N50,
            ra_response_window_size: 3,
            conn_est_fail_count: 1,
        }
    }
}

impl PerCodec for RachConfigCommon {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.number_of_ra_preambles as i64, 1, 64)?;
        self.preamble_trans_max.encode(enc)?;
        enc.integer(self.ra_response_window_size as i64, 2, 10)?;
        enc.integer(self.conn_est_fail_count as i64, 1, 4)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            number_of_ra_preambles: dec.integer(1, 64)? as u8,
            preamble_trans_max: PreambleTransMax::decode(dec)?,
            ra_response_window_size: dec.integer(2, 10)? as u8,
            conn_est_fail_count: dec.integer(1, 4)? as u8,
        })
    }
}

/// System Information Block Type 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib2 {
    pub rach_config_common: RachConfigCommon,
    /// Uplink carrier ARFCN
    pub ul_carrier_freq: u32,
    /// Uplink bandwidth in resource blocks (1-275)
    pub ul_bandwidth_prbs: u16,
}

impl PerCodec for Sib2 {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        self.rach_config_common.encode(enc)?;
        enc.integer(self.ul_carrier_freq as i64, 0, MAX_ARFCN as i64)?;
        enc.integer(self.ul_bandwidth_prbs as i64, 1, MAX_BANDWIDTH_PRBS as i64)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rach_config_common: RachConfigCommon::decode(dec)?,
            ul_carrier_freq: dec.integer(0, MAX_ARFCN as i64)? as u32,
            ul_bandwidth_prbs: dec.integer(1, MAX_BANDWIDTH_PRBS as i64)? as u16,
        })
    }
}

/// System Information message: SIB1 plus optional SIB2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInformation {
    pub sib1: Sib1,
    pub sib2: Option<Sib2>,
}

impl PerCodec for SystemInformation {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(false, [self.sib2.is_some()]);
        self.sib1.encode(enc)?;
        enc.optional(&self.sib2)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_sib2] = dec.sequence(false)?;
        Ok(Self {
            sib1: Sib1::decode(dec)?,
            sib2: dec.optional(has_sib2)?,
        })
    }
}

/// Encode a MIB as a BCCH message
pub fn encode_mib(mib: &MasterInformationBlock) -> Result<Vec<u8>, SystemInformationError> {
    Ok(encode_rrc(&BcchMessage::Mib(*mib))?)
}

/// Encode System Information as a BCCH message
pub fn encode_system_information(si: &SystemInformation) -> Result<Vec<u8>, SystemInformationError> {
    Ok(encode_rrc(&BcchMessage::SystemInformation(si.clone()))?)
}

/// Decode a BCCH message expected to be System Information
pub fn decode_system_information(bytes: &[u8]) -> Result<SystemInformation, SystemInformationError> {
    match decode_rrc::<BcchMessage>(bytes)? {
        BcchMessage::SystemInformation(si) => Ok(si),
        other => Err(SystemInformationError::InvalidMessageType {
            expected: "SystemInformation".to_string(),
            actual: other.name().to_string(),
        }),
    }
}
