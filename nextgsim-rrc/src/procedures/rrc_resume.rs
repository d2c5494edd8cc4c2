//! RRC Resume Procedure
//!
//! Resumes a suspended RRC connection from RRC_INACTIVE:
//! 1. `RRCResumeRequest` - UE → gNB on UL-CCCH, optionally carrying small
//!    data payloads
//! 2. `RRCResume` - gNB → UE on DL-DCCH, or `RRCRelease` with a fresh
//!    suspend configuration after a small data transfer
//! 3. `RRCResumeComplete` - UE → gNB on UL-DCCH

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{decode_transaction_id, encode_transaction_id, RadioBearerConfig};
use crate::message::{DlDcchMessage, UlCcchMessage};
use crate::per_enumerated;

/// Errors that can occur during RRC Resume procedures
#[derive(Debug, Error)]
pub enum RrcResumeError {
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

/// Maximum number of small data payloads in one resume request.
pub const MAX_SDT_PAYLOADS: usize = 8;

/// Maximum size of one small data payload in octets.
pub const MAX_SDT_PAYLOAD_SIZE: usize = 1000;

per_enumerated! {
    /// Resume cause
    pub enum ResumeCause {
        Emergency,
        HighPriorityAccess,
        MtAccess,
        MoSignalling,
        MoData,
        MoVoiceCall,
        MoVideoCall,
        MoSms,
        RnaUpdate,
        MpsPriorityAccess,
        McsPriorityAccess,
    }
}

// ============================================================================
// RRC Resume Request
// ============================================================================

/// RRC Resume Request (UL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcResumeRequest {
    /// Short inactive RNTI received in the suspend configuration (24 bits)
    pub resume_identity: u32,
    pub resume_cause: ResumeCause,
    /// Small data carried with the request
    pub sdt_payload: Vec<Vec<u8>>,
}

impl RrcResumeRequest {
    /// Returns true if the request carries small data.
    pub fn has_sdt_payload(&self) -> bool {
        !self.sdt_payload.is_empty()
    }
}

impl PerCodec for RrcResumeRequest {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.bitstring(self.resume_identity as u64, 24)?;
        self.resume_cause.encode(enc)?;
        // spare
        enc.boolean(false);
        enc.sequence_of(self.sdt_payload.len(), 0, MAX_SDT_PAYLOADS)?;
        for payload in &self.sdt_payload {
            enc.octets(payload, 0, MAX_SDT_PAYLOAD_SIZE)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let resume_identity = dec.bitstring(24)? as u32;
        let resume_cause = ResumeCause::decode(dec)?;
        let _spare = dec.boolean()?;
        let count = dec.sequence_of(0, MAX_SDT_PAYLOADS)?;
        let mut sdt_payload = Vec::with_capacity(count);
        for _ in 0..count {
            sdt_payload.push(dec.octets(0, MAX_SDT_PAYLOAD_SIZE)?);
        }
        Ok(Self {
            resume_identity,
            resume_cause,
            sdt_payload,
        })
    }
}

/// Encode an RRC Resume Request as a UL-CCCH message
pub fn encode_rrc_resume_request(msg: &RrcResumeRequest) -> Result<Vec<u8>, RrcResumeError> {
    Ok(encode_rrc(&UlCcchMessage::RrcResumeRequest(msg.clone()))?)
}

/// Decode a UL-CCCH message expected to be an RRC Resume Request
pub fn decode_rrc_resume_request(bytes: &[u8]) -> Result<RrcResumeRequest, RrcResumeError> {
    match decode_rrc::<UlCcchMessage>(bytes)? {
        UlCcchMessage::RrcResumeRequest(msg) => Ok(msg),
        other => Err(RrcResumeError::InvalidMessageType {
            expected: "RRCResumeRequest".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Resume
// ============================================================================

/// RRC Resume (DL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcResume {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    pub radio_bearer_config: Option<RadioBearerConfig>,
}

impl PerCodec for RrcResume {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(false, [self.radio_bearer_config.is_some()]);
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        enc.optional(&self.radio_bearer_config)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_rb] = dec.sequence(false)?;
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
            radio_bearer_config: dec.optional(has_rb)?,
        })
    }
}

/// Decode a DL-DCCH message expected to be an RRC Resume
pub fn decode_rrc_resume(bytes: &[u8]) -> Result<RrcResume, RrcResumeError> {
    match decode_rrc::<DlDcchMessage>(bytes)? {
        DlDcchMessage::RrcResume(msg) => Ok(msg),
        other => Err(RrcResumeError::InvalidMessageType {
            expected: "RRCResume".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Resume Complete
// ============================================================================

/// RRC Resume Complete (UL-DCCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrcResumeComplete {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
}

impl PerCodec for RrcResumeComplete {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        encode_transaction_id(enc, self.rrc_transaction_id)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
        })
    }
}
