//! RRC Release Procedure
//!
//! Releases the RRC connection. With a suspend configuration the UE keeps
//! its context and moves to RRC_INACTIVE; without one it moves to RRC_IDLE.

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{decode_transaction_id, encode_transaction_id, MAX_DRB_ID};
use crate::message::DlDcchMessage;
use crate::per_enumerated;

/// Errors that can occur during RRC Release procedures
#[derive(Debug, Error)]
pub enum RrcReleaseError {
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
    /// RAN paging cycle in radio frames
    pub enum PagingCycle {
        Rf32,
        Rf64,
        Rf128,
        Rf256,
    }
}

per_enumerated! {
    /// Periodic RAN notification area update timer (T380)
    pub enum PeriodicRnaUpdateTimer {
        Min5,
        Min10,
        Min20,
        Min30,
        Min60,
        Min120,
        Min360,
        Min720,
    }
}

per_enumerated! {
    /// Extended RAN paging cycle in radio frames
    pub enum ExtendedPagingCycle {
        Rf256,
        Rf512,
        Rf1024,
        Spare1,
    }
}

/// Small data transfer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdtConfig {
    /// DRBs usable for small data transfer
    pub sdt_drb_list: Vec<u8>,
}

impl PerCodec for SdtConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence_of(self.sdt_drb_list.len(), 0, MAX_DRB_ID as usize)?;
        for drb in &self.sdt_drb_list {
            enc.integer(*drb as i64, 1, MAX_DRB_ID as i64)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let len = dec.sequence_of(0, MAX_DRB_ID as usize)?;
        let mut sdt_drb_list = Vec::with_capacity(len);
        for _ in 0..len {
            sdt_drb_list.push(dec.integer(1, MAX_DRB_ID as i64)? as u8);
        }
        Ok(Self { sdt_drb_list })
    }
}

/// Parameters the UE keeps while suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendConfig {
    /// Full inactive RNTI (40 bits)
    pub full_i_rnti: u64,
    /// Short inactive RNTI (24 bits)
    pub short_i_rnti: u32,
    pub ran_paging_cycle: PagingCycle,
    pub t380: PeriodicRnaUpdateTimer,
    pub ran_extended_paging_cycle: Option<ExtendedPagingCycle>,
    pub sdt_config: Option<SdtConfig>,
}

impl PerCodec for SuspendConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(
            true,
            [self.ran_extended_paging_cycle.is_some(), self.sdt_config.is_some()],
        );
        enc.bitstring(self.full_i_rnti, 40)?;
        enc.bitstring(self.short_i_rnti as u64, 24)?;
        self.ran_paging_cycle.encode(enc)?;
        self.t380.encode(enc)?;
        enc.optional(&self.ran_extended_paging_cycle)?;
        enc.optional(&self.sdt_config)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_extended, has_sdt] = dec.sequence(true)?;
        Ok(Self {
            full_i_rnti: dec.bitstring(40)?,
            short_i_rnti: dec.bitstring(24)? as u32,
            ran_paging_cycle: PagingCycle::decode(dec)?,
            t380: PeriodicRnaUpdateTimer::decode(dec)?,
            ran_extended_paging_cycle: dec.optional(has_extended)?,
            sdt_config: dec.optional(has_sdt)?,
        })
    }
}

/// RRC Release (DL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcRelease {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    /// Present when the UE is sent to RRC_INACTIVE
    pub suspend_config: Option<SuspendConfig>,
}

impl PerCodec for RrcRelease {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(false, [self.suspend_config.is_some()]);
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        enc.optional(&self.suspend_config)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_suspend] = dec.sequence(false)?;
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
            suspend_config: dec.optional(has_suspend)?,
        })
    }
}

/// Encode an RRC Release as a DL-DCCH message
pub fn encode_rrc_release(msg: &RrcRelease) -> Result<Vec<u8>, RrcReleaseError> {
    Ok(encode_rrc(&DlDcchMessage::RrcRelease(msg.clone()))?)
}

/// Decode a DL-DCCH message expected to be an RRC Release
pub fn decode_rrc_release(bytes: &[u8]) -> Result<RrcRelease, RrcReleaseError> {
    match decode_rrc::<DlDcchMessage>(bytes)? {
        DlDcchMessage::RrcRelease(msg) => Ok(msg),
        other => Err(RrcReleaseError::InvalidMessageType {
            expected: "RRCRelease".to_string(),
            actual: other.name().to_string(),
        }),
    }
}
