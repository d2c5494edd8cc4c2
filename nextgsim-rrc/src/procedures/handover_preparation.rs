//! Handover Preparation containers
//!
//! RRC contents carried transparently inside inter-gNB handover messages:
//! - `HandoverPreparationInformation` - source → target in the Handover
//!   Request: the UE's current bearers and the source cell's broadcast
//!   essentials
//! - `HandoverCommand` - target → source in the Handover Request Ack: the
//!   RRC Reconfiguration with mobility control information that the source
//!   forwards to the UE

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{RadioBearerConfig, MAX_ARFCN};
use crate::message::DlDcchMessage;
use crate::procedures::rrc_reconfiguration::RrcReconfiguration;
use crate::procedures::system_information::{MasterInformationBlock, Sib1};

/// Errors that can occur while building or reading handover containers
#[derive(Debug, Error)]
pub enum HandoverPreparationError {
    /// Encoding failed
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding failed
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid message type received
    #[error("Invalid message type: expected {expected}, got {actual}")]
    InvalidMessageType { expected: String, actual: String },

    /// Handover command without mobility control information
    #[error("Missing mandatory field: {0}")]
    MissingMandatoryField(String),
}

/// Handover Preparation Information (source → target)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverPreparationInfo {
    /// RNTI of the UE at the source (16 bits)
    pub source_ue_identity: u16,
    /// Bearers configured at the source
    pub source_radio_bearer_config: RadioBearerConfig,
    pub source_mib: MasterInformationBlock,
    pub source_sib1: Sib1,
    /// Source downlink carrier ARFCN
    pub source_dl_carrier_freq: u32,
}

impl PerCodec for HandoverPreparationInfo {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, []);
        enc.bitstring(self.source_ue_identity as u64, 16)?;
        self.source_radio_bearer_config.encode(enc)?;
        self.source_mib.encode(enc)?;
        self.source_sib1.encode(enc)?;
        enc.integer(self.source_dl_carrier_freq as i64, 0, MAX_ARFCN as i64)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [] = dec.sequence(true)?;
        Ok(Self {
            source_ue_identity: dec.bitstring(16)? as u16,
            source_radio_bearer_config: RadioBearerConfig::decode(dec)?,
            source_mib: MasterInformationBlock::decode(dec)?,
            source_sib1: Sib1::decode(dec)?,
            source_dl_carrier_freq: dec.integer(0, MAX_ARFCN as i64)? as u32,
        })
    }
}

/// Encode Handover Preparation Information
pub fn encode_handover_preparation_info(
    info: &HandoverPreparationInfo,
) -> Result<Vec<u8>, HandoverPreparationError> {
    Ok(encode_rrc(info)?)
}

/// Decode Handover Preparation Information
pub fn decode_handover_preparation_info(bytes: &[u8]) -> Result<HandoverPreparationInfo, HandoverPreparationError> {
    Ok(decode_rrc(bytes)?)
}

/// Encode a handover command as the DL-DCCH message the UE will receive
pub fn encode_handover_command(command: &RrcReconfiguration) -> Result<Vec<u8>, HandoverPreparationError> {
    if !command.is_handover_command() {
        return Err(HandoverPreparationError::MissingMandatoryField(
            "mobilityControlInfo".to_string(),
        ));
    }
    Ok(encode_rrc(&DlDcchMessage::RrcReconfiguration(command.clone()))?)
}

/// Decode a handover command
pub fn decode_handover_command(bytes: &[u8]) -> Result<RrcReconfiguration, HandoverPreparationError> {
    match decode_rrc::<DlDcchMessage>(bytes)? {
        DlDcchMessage::RrcReconfiguration(msg) if msg.is_handover_command() => Ok(msg),
        DlDcchMessage::RrcReconfiguration(_) => Err(HandoverPreparationError::MissingMandatoryField(
            "mobilityControlInfo".to_string(),
        )),
        other => Err(HandoverPreparationError::InvalidMessageType {
            expected: "RRCReconfiguration".to_string(),
            actual: other.name().to_string(),
        }),
    }
}
