//! RRC Reestablishment Procedure
//!
//! Re-establishes the connection after radio link or handover failure:
//! 1. `RRCReestablishmentRequest` - UE → gNB on UL-CCCH naming the old C-RNTI
//! 2. `RRCReestablishment` - gNB → UE on DL-CCCH, or `RRCReestablishmentReject`
//! 3. `RRCReestablishmentComplete` - UE → gNB on UL-DCCH

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{decode_transaction_id, encode_transaction_id, RadioBearerConfig, MAX_PCI};
use crate::message::{DlCcchMessage, UlCcchMessage};
use crate::per_enumerated;

/// Errors that can occur during RRC Reestablishment procedures
#[derive(Debug, Error)]
pub enum RrcReestablishmentError {
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

per_enumerated! {
    /// Reestablishment cause
    pub enum ReestablishmentCause {
        ReconfigurationFailure,
        HandoverFailure,
        OtherFailure,
        Spare,
    }
}

// ============================================================================
// RRC Reestablishment Request
// ============================================================================

/// RRC Reestablishment Request (UL-CCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcReestablishmentRequest {
    /// C-RNTI the UE had in the cell it lost
    pub c_rnti: u16,
    /// Physical cell id of that cell (0-1007)
    pub physical_cell_id: u16,
    /// Short MAC-I (16 bits)
    pub short_mac_i: u16,
    pub reestablishment_cause: ReestablishmentCause,
}

impl PerCodec for RrcReestablishmentRequest {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.bitstring(self.c_rnti as u64, 16)?;
        enc.integer(self.physical_cell_id as i64, 0, MAX_PCI as i64)?;
        enc.bitstring(self.short_mac_i as u64, 16)?;
        self.reestablishment_cause.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            c_rnti: dec.bitstring(16)? as u16,
            physical_cell_id: dec.integer(0, MAX_PCI as i64)? as u16,
            short_mac_i: dec.bitstring(16)? as u16,
            reestablishment_cause: ReestablishmentCause::decode(dec)?,
        })
    }
}

/// Encode an RRC Reestablishment Request as a UL-CCCH message
pub fn encode_rrc_reestablishment_request(
    msg: &RrcReestablishmentRequest,
) -> Result<Vec<u8>, RrcReestablishmentError> {
    Ok(encode_rrc(&UlCcchMessage::RrcReestablishmentRequest(*msg))?)
}

// ============================================================================
// RRC Reestablishment
// ============================================================================

/// RRC Reestablishment (DL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReestablishment {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    /// Bearers the context still holds
    pub radio_bearer_config: RadioBearerConfig,
}

impl PerCodec for RrcReestablishment {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        self.radio_bearer_config.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
            radio_bearer_config: RadioBearerConfig::decode(dec)?,
        })
    }
}

/// Decode a DL-CCCH message expected to be an RRC Reestablishment
pub fn decode_rrc_reestablishment(bytes: &[u8]) -> Result<RrcReestablishment, RrcReestablishmentError> {
    match decode_rrc::<DlCcchMessage>(bytes)? {
        DlCcchMessage::RrcReestablishment(msg) => Ok(msg),
        other => Err(RrcReestablishmentError::InvalidMessageType {
            expected: "RRCReestablishment".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Reestablishment Complete / Reject
// ============================================================================

/// RRC Reestablishment Complete (UL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcReestablishmentComplete {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
}

impl PerCodec for RrcReestablishmentComplete {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        encode_transaction_id(enc, self.rrc_transaction_id)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
        })
    }
}

/// RRC Reestablishment Reject (DL-CCCH), no contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RrcReestablishmentReject;

impl PerCodec for RrcReestablishmentReject {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.null();
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        dec.null();
        Ok(Self)
    }
}
