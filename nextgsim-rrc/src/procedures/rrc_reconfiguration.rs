//! RRC Reconfiguration Procedure
//!
//! Modifies an established RRC connection: adds or releases data radio
//! bearers, configures measurements and, with mobility control information
//! present, commands a handover.
//!
//! 1. `RRCReconfiguration` - gNB → UE on DL-DCCH
//! 2. `RRCReconfigurationComplete` - UE → gNB on UL-DCCH

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{
    decode_transaction_id, encode_transaction_id, PhysicalConfigDedicated, RadioBearerConfig, MAX_ARFCN, MAX_PCI,
};
use crate::message::{DlDcchMessage, UlDcchMessage};
use crate::per_enumerated;

/// Errors that can occur during RRC Reconfiguration procedures
#[derive(Debug, Error)]
pub enum RrcReconfigurationError {
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

/// Maximum number of measurement objects, report configs and meas ids.
pub const MAX_MEAS_ENTRIES: usize = 8;

// ============================================================================
// Measurement configuration
// ============================================================================

per_enumerated! {
    /// Time a measurement event condition must hold before reporting
    pub enum TimeToTrigger {
        Ms0,
        Ms40,
        Ms64,
        Ms80,
        Ms100,
        Ms128,
        Ms160,
        Ms256,
        Ms320,
        Ms480,
        Ms512,
        Ms640,
        Ms1024,
        Ms1280,
        Ms2560,
        Ms5120,
    }
}

const TIME_TO_TRIGGER_MS: [u64; 16] = [
    0, 40, 64, 80, 100, 128, 160, 256, 320, 480, 512, 640, 1024, 1280, 2560, 5120,
];

impl TimeToTrigger {
    /// Smallest value that is at least `ms`, saturating at 5120 ms.
    pub fn from_millis(ms: u64) -> Self {
        let index = TIME_TO_TRIGGER_MS
            .iter()
            .position(|&v| v >= ms)
            .unwrap_or(TIME_TO_TRIGGER_MS.len() - 1);
        Self::VARIANTS[index]
    }

    /// Value in milliseconds.
    pub fn millis(self) -> u64 {
        TIME_TO_TRIGGER_MS[self as usize]
    }
}

/// Carrier to measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasObject {
    /// Measurement object identity (1-32)
    pub meas_object_id: u8,
    /// Carrier ARFCN
    pub carrier_freq: u32,
}

impl PerCodec for MeasObject {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.meas_object_id as i64, 1, 32)?;
        enc.integer(self.carrier_freq as i64, 0, MAX_ARFCN as i64)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            meas_object_id: dec.integer(1, 32)? as u8,
            carrier_freq: dec.integer(0, MAX_ARFCN as i64)? as u32,
        })
    }
}

/// Event A3 report configuration: neighbour becomes offset better than
/// serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    /// Report configuration identity (1-32)
    pub report_config_id: u8,
    /// A3 offset in dB (-30..30)
    pub a3_offset: i8,
    /// Hysteresis in dB (0-30)
    pub hysteresis: u8,
    /// Time to trigger
    pub time_to_trigger: TimeToTrigger,
}

impl PerCodec for ReportConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.report_config_id as i64, 1, 32)?;
        enc.integer(self.a3_offset as i64, -30, 30)?;
        enc.integer(self.hysteresis as i64, 0, 30)?;
        self.time_to_trigger.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            report_config_id: dec.integer(1, 32)? as u8,
            a3_offset: dec.integer(-30, 30)? as i8,
            hysteresis: dec.integer(0, 30)? as u8,
            time_to_trigger: TimeToTrigger::decode(dec)?,
        })
    }
}

/// Links a measurement object to a report configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasIdToAddMod {
    /// Measurement identity (1-32)
    pub meas_id: u8,
    /// Measurement object identity
    pub meas_object_id: u8,
    /// Report configuration identity
    pub report_config_id: u8,
}

impl PerCodec for MeasIdToAddMod {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.meas_id as i64, 1, 32)?;
        enc.integer(self.meas_object_id as i64, 1, 32)?;
        enc.integer(self.report_config_id as i64, 1, 32)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            meas_id: dec.integer(1, 32)? as u8,
            meas_object_id: dec.integer(1, 32)? as u8,
            report_config_id: dec.integer(1, 32)? as u8,
        })
    }
}

/// Measurement configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasConfig {
    pub meas_objects: Vec<MeasObject>,
    pub report_configs: Vec<ReportConfig>,
    pub meas_ids: Vec<MeasIdToAddMod>,
}

impl PerCodec for MeasConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, []);
        enc.list(&self.meas_objects, 0, MAX_MEAS_ENTRIES)?;
        enc.list(&self.report_configs, 0, MAX_MEAS_ENTRIES)?;
        enc.list(&self.meas_ids, 0, MAX_MEAS_ENTRIES)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [] = dec.sequence(true)?;
        Ok(Self {
            meas_objects: dec.list(0, MAX_MEAS_ENTRIES)?,
            report_configs: dec.list(0, MAX_MEAS_ENTRIES)?,
            meas_ids: dec.list(0, MAX_MEAS_ENTRIES)?,
        })
    }
}

// ============================================================================
// Mobility control
// ============================================================================

per_enumerated! {
    /// Handover supervision timer at the UE
    pub enum T304 {
        Ms50,
        Ms100,
        Ms150,
        Ms200,
        Ms500,
        Ms1000,
        Ms2000,
        Ms10000,
    }
}

/// Contention-free random access resources for the target cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RachConfigDedicated {
    /// Dedicated preamble (0-63)
    pub preamble_index: u8,
    /// PRACH mask index (0-15)
    pub prach_mask_index: u8,
}

impl PerCodec for RachConfigDedicated {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.preamble_index as i64, 0, 63)?;
        enc.integer(self.prach_mask_index as i64, 0, 15)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            preamble_index: dec.integer(0, 63)? as u8,
            prach_mask_index: dec.integer(0, 15)? as u8,
        })
    }
}

/// Handover command contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobilityControlInfo {
    /// Physical cell id of the target (0-1007)
    pub target_physical_cell_id: u16,
    /// Target carrier ARFCN, when it differs from the source
    pub carrier_freq: Option<u32>,
    /// RNTI allocated by the target (16 bits)
    pub new_ue_identity: u16,
    /// Handover supervision timer
    pub t304: T304,
    /// Dedicated random access resources
    pub rach_config_dedicated: Option<RachConfigDedicated>,
}

impl PerCodec for MobilityControlInfo {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(
            true,
            [self.carrier_freq.is_some(), self.rach_config_dedicated.is_some()],
        );
        enc.integer(self.target_physical_cell_id as i64, 0, MAX_PCI as i64)?;
        if let Some(freq) = self.carrier_freq {
            enc.integer(freq as i64, 0, MAX_ARFCN as i64)?;
        }
        enc.bitstring(self.new_ue_identity as u64, 16)?;
        self.t304.encode(enc)?;
        enc.optional(&self.rach_config_dedicated)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_freq, has_rach] = dec.sequence(true)?;
        let target_physical_cell_id = dec.integer(0, MAX_PCI as i64)? as u16;
        let carrier_freq = if has_freq {
            Some(dec.integer(0, MAX_ARFCN as i64)? as u32)
        } else {
            None
        };
        Ok(Self {
            target_physical_cell_id,
            carrier_freq,
            new_ue_identity: dec.bitstring(16)? as u16,
            t304: T304::decode(dec)?,
            rach_config_dedicated: dec.optional(has_rach)?,
        })
    }
}

// ============================================================================
// RRC Reconfiguration
// ============================================================================

/// RRC Reconfiguration (DL-DCCH)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RrcReconfiguration {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    pub meas_config: Option<MeasConfig>,
    /// Present in a handover command
    pub mobility_control_info: Option<MobilityControlInfo>,
    pub radio_bearer_config: Option<RadioBearerConfig>,
    pub physical_config_dedicated: Option<PhysicalConfigDedicated>,
}

impl RrcReconfiguration {
    /// Returns true if this reconfiguration commands a handover.
    pub fn is_handover_command(&self) -> bool {
        self.mobility_control_info.is_some()
    }
}

impl PerCodec for RrcReconfiguration {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(
            false,
            [
                self.meas_config.is_some(),
                self.mobility_control_info.is_some(),
                self.radio_bearer_config.is_some(),
                self.physical_config_dedicated.is_some(),
            ],
        );
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        enc.optional(&self.meas_config)?;
        enc.optional(&self.mobility_control_info)?;
        enc.optional(&self.radio_bearer_config)?;
        enc.optional(&self.physical_config_dedicated)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_meas, has_mobility, has_rb, has_phy] = dec.sequence(false)?;
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
            meas_config: dec.optional(has_meas)?,
            mobility_control_info: dec.optional(has_mobility)?,
            radio_bearer_config: dec.optional(has_rb)?,
            physical_config_dedicated: dec.optional(has_phy)?,
        })
    }
}

/// Encode an RRC Reconfiguration as a DL-DCCH message
pub fn encode_rrc_reconfiguration(msg: &RrcReconfiguration) -> Result<Vec<u8>, RrcReconfigurationError> {
    Ok(encode_rrc(&DlDcchMessage::RrcReconfiguration(msg.clone()))?)
}

/// Decode a DL-DCCH message expected to be an RRC Reconfiguration
pub fn decode_rrc_reconfiguration(bytes: &[u8]) -> Result<RrcReconfiguration, RrcReconfigurationError> {
    match decode_rrc::<DlDcchMessage>(bytes)? {
        DlDcchMessage::RrcReconfiguration(msg) => Ok(msg),
        other => Err(RrcReconfigurationError::InvalidMessageType {
            expected: "RRCReconfiguration".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Reconfiguration Complete
// ============================================================================

/// RRC Reconfiguration Complete (UL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcReconfigurationComplete {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
}

impl PerCodec for RrcReconfigurationComplete {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        encode_transaction_id(enc, self.rrc_transaction_id)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
        })
    }
}

/// Encode an RRC Reconfiguration Complete as a UL-DCCH message
pub fn encode_rrc_reconfiguration_complete(
    msg: &RrcReconfigurationComplete,
) -> Result<Vec<u8>, RrcReconfigurationError> {
    Ok(encode_rrc(&UlDcchMessage::RrcReconfigurationComplete(*msg))?)
}
