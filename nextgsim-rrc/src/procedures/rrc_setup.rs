//! RRC Connection Setup Procedure
//!
//! Establishes an RRC connection between the UE and the gNB:
//! 1. `RRCConnectionRequest` - UE → gNB on UL-CCCH
//! 2. `RRCSetup` - gNB → UE on DL-CCCH with SRB1, DRBs and the dedicated
//!    physical configuration, or `RRCReject` with a back-off time
//! 3. `RRCSetupComplete` - UE → gNB on UL-DCCH with the initial NAS message

use thiserror::Error;

use crate::codec::{decode_rrc, encode_rrc, DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::{decode_transaction_id, encode_transaction_id, PhysicalConfigDedicated, RadioBearerConfig};
use crate::message::{DlCcchMessage, UlCcchMessage, UlDcchMessage};
use crate::per_enumerated;

/// Errors that can occur during RRC Setup procedures
#[derive(Debug, Error)]
pub enum RrcSetupError {
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

/// Maximum size of a dedicated NAS message in octets.
pub const MAX_NAS_MESSAGE_SIZE: usize = 2048;

// ============================================================================
// RRC Connection Request
// ============================================================================

per_enumerated! {
    /// Establishment cause for an RRC connection request
    pub enum EstablishmentCause {
        Emergency,
        HighPriorityAccess,
        MtAccess,
        MoSignalling,
        MoData,
        DelayTolerantAccess,
        MoVoiceCall,
        Spare1,
    }
}

/// Initial UE identity: MME code and M-TMSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InitialUeIdentity {
    /// MME code (8 bits)
    pub mmec: u8,
    /// M-TMSI (32 bits)
    pub m_tmsi: u32,
}

impl InitialUeIdentity {
    /// Builds the identity the gNB reports upward as the subscriber key.
    pub fn to_imsi(self) -> u64 {
        ((self.mmec as u64) << 32) | self.m_tmsi as u64
    }
}

/// RRC Connection Request (UL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcConnectionRequest {
    /// UE identity
    pub ue_identity: InitialUeIdentity,
    /// Establishment cause
    pub establishment_cause: EstablishmentCause,
    /// Reduced-capability (RedCap) device
    pub reduced_capability: bool,
}

impl PerCodec for RrcConnectionRequest {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.bitstring(self.ue_identity.mmec as u64, 8)?;
        enc.bitstring(self.ue_identity.m_tmsi as u64, 32)?;
        self.establishment_cause.encode(enc)?;
        // spare
        enc.boolean(false);
        enc.boolean(self.reduced_capability);
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let mmec = dec.bitstring(8)? as u8;
        let m_tmsi = dec.bitstring(32)? as u32;
        let establishment_cause = EstablishmentCause::decode(dec)?;
        let _spare = dec.boolean()?;
        let reduced_capability = dec.boolean()?;
        Ok(Self {
            ue_identity: InitialUeIdentity { mmec, m_tmsi },
            establishment_cause,
            reduced_capability,
        })
    }
}

/// Encode an RRC Connection Request as a UL-CCCH message
pub fn encode_rrc_connection_request(msg: &RrcConnectionRequest) -> Result<Vec<u8>, RrcSetupError> {
    Ok(encode_rrc(&UlCcchMessage::RrcConnectionRequest(msg.clone()))?)
}

/// Decode a UL-CCCH message expected to be an RRC Connection Request
pub fn decode_rrc_connection_request(bytes: &[u8]) -> Result<RrcConnectionRequest, RrcSetupError> {
    match decode_rrc::<UlCcchMessage>(bytes)? {
        UlCcchMessage::RrcConnectionRequest(msg) => Ok(msg),
        other => Err(RrcSetupError::InvalidMessageType {
            expected: "RRCConnectionRequest".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Setup
// ============================================================================

/// RRC Setup (DL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetup {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    /// SRB1 and the initial DRBs
    pub radio_bearer_config: RadioBearerConfig,
    /// Dedicated physical configuration
    pub physical_config_dedicated: PhysicalConfigDedicated,
}

impl PerCodec for RrcSetup {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        self.radio_bearer_config.encode(enc)?;
        self.physical_config_dedicated.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            rrc_transaction_id: decode_transaction_id(dec)?,
            radio_bearer_config: RadioBearerConfig::decode(dec)?,
            physical_config_dedicated: PhysicalConfigDedicated::decode(dec)?,
        })
    }
}

/// Encode an RRC Setup as a DL-CCCH message
pub fn encode_rrc_setup(msg: &RrcSetup) -> Result<Vec<u8>, RrcSetupError> {
    Ok(encode_rrc(&DlCcchMessage::RrcSetup(msg.clone()))?)
}

/// Decode a DL-CCCH message expected to be an RRC Setup
pub fn decode_rrc_setup(bytes: &[u8]) -> Result<RrcSetup, RrcSetupError> {
    match decode_rrc::<DlCcchMessage>(bytes)? {
        DlCcchMessage::RrcSetup(msg) => Ok(msg),
        other => Err(RrcSetupError::InvalidMessageType {
            expected: "RRCSetup".to_string(),
            actual: other.name().to_string(),
        }),
    }
}

// ============================================================================
// RRC Reject
// ============================================================================

/// RRC Reject (DL-CCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReject {
    /// Back-off before the UE may retry, in seconds (1-16)
    pub wait_time: u8,
}

impl PerCodec for RrcReject {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.wait_time as i64, 1, 16)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            wait_time: dec.integer(1, 16)? as u8,
        })
    }
}

// ============================================================================
// RRC Setup Complete
// ============================================================================

/// RRC Setup Complete (UL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcSetupComplete {
    /// RRC Transaction Identifier (0-3)
    pub rrc_transaction_id: u8,
    /// Index of the selected PLMN in SIB1 (1-6)
    pub selected_plmn_identity: u8,
    /// Initial NAS message
    pub dedicated_nas_message: Option<Vec<u8>>,
}

impl PerCodec for RrcSetupComplete {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(false, [self.dedicated_nas_message.is_some()]);
        encode_transaction_id(enc, self.rrc_transaction_id)?;
        enc.integer(self.selected_plmn_identity as i64, 1, 6)?;
        if let Some(nas) = &self.dedicated_nas_message {
            enc.octets(nas, 1, MAX_NAS_MESSAGE_SIZE)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_nas] = dec.sequence(false)?;
        let rrc_transaction_id = decode_transaction_id(dec)?;
        let selected_plmn_identity = dec.integer(1, 6)? as u8;
        let dedicated_nas_message = if has_nas {
            Some(dec.octets(1, MAX_NAS_MESSAGE_SIZE)?)
        } else {
            None
        };
        Ok(Self {
            rrc_transaction_id,
            selected_plmn_identity,
            dedicated_nas_message,
        })
    }
}

/// Encode an RRC Setup Complete as a UL-DCCH message
pub fn encode_rrc_setup_complete(msg: &RrcSetupComplete) -> Result<Vec<u8>, RrcSetupError> {
    Ok(encode_rrc(&UlDcchMessage::RrcSetupComplete(msg.clone()))?)
}
