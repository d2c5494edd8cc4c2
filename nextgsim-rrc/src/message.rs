//! Logical channel messages
//!
//! Every RRC message travels inside the message type of its logical
//! channel: a choice index selecting the message, then the message body.

use std::fmt;

use crate::codec::{DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::procedures::measurement_report::MeasurementReport;
use crate::procedures::rrc_reconfiguration::{RrcReconfiguration, RrcReconfigurationComplete};
use crate::procedures::rrc_reestablishment::{
    RrcReestablishment, RrcReestablishmentComplete, RrcReestablishmentReject, RrcReestablishmentRequest,
};
use crate::procedures::rrc_release::RrcRelease;
use crate::procedures::rrc_resume::{RrcResume, RrcResumeComplete, RrcResumeRequest};
use crate::procedures::rrc_setup::{RrcConnectionRequest, RrcReject, RrcSetup, RrcSetupComplete};
use crate::procedures::system_information::{MasterInformationBlock, SystemInformation};

/// RRC logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RrcChannel {
    /// Broadcast control channel
    Bcch,
    /// Uplink common control channel (SRB0)
    UlCcch,
    /// Downlink common control channel (SRB0)
    DlCcch,
    /// Uplink dedicated control channel (SRB1)
    UlDcch,
    /// Downlink dedicated control channel (SRB1)
    DlDcch,
}

impl RrcChannel {
    /// Returns true for channels the gNB receives on.
    pub fn is_uplink(self) -> bool {
        matches!(self, Self::UlCcch | Self::UlDcch)
    }
}

impl fmt::Display for RrcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bcch => "BCCH",
            Self::UlCcch => "UL-CCCH",
            Self::DlCcch => "DL-CCCH",
            Self::UlDcch => "UL-DCCH",
            Self::DlDcch => "DL-DCCH",
        };
        f.write_str(s)
    }
}

// ============================================================================
// UL-CCCH
// ============================================================================

/// UL-CCCH message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlCcchMessage {
    RrcConnectionRequest(RrcConnectionRequest),
    RrcResumeRequest(RrcResumeRequest),
    RrcReestablishmentRequest(RrcReestablishmentRequest),
}

impl UlCcchMessage {
    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RrcConnectionRequest(_) => "RRCConnectionRequest",
            Self::RrcResumeRequest(_) => "RRCResumeRequest",
            Self::RrcReestablishmentRequest(_) => "RRCReestablishmentRequest",
        }
    }
}

impl PerCodec for UlCcchMessage {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        match self {
            Self::RrcConnectionRequest(msg) => {
                enc.choice(0, 3, false)?;
                msg.encode(enc)
            }
            Self::RrcResumeRequest(msg) => {
                enc.choice(1, 3, false)?;
                msg.encode(enc)
            }
            Self::RrcReestablishmentRequest(msg) => {
                enc.choice(2, 3, false)?;
                msg.encode(enc)
            }
        }
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        match dec.choice(3, false)? {
            0 => Ok(Self::RrcConnectionRequest(PerCodec::decode(dec)?)),
            1 => Ok(Self::RrcResumeRequest(PerCodec::decode(dec)?)),
            _ => Ok(Self::RrcReestablishmentRequest(PerCodec::decode(dec)?)),
        }
    }
}

// ============================================================================
// DL-CCCH
// ============================================================================

/// DL-CCCH message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlCcchMessage {
    RrcSetup(RrcSetup),
    RrcReject(RrcReject),
    RrcReestablishment(RrcReestablishment),
    RrcReestablishmentReject(RrcReestablishmentReject),
}

impl DlCcchMessage {
    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RrcSetup(_) => "RRCSetup",
            Self::RrcReject(_) => "RRCReject",
            Self::RrcReestablishment(_) => "RRCReestablishment",
            Self::RrcReestablishmentReject(_) => "RRCReestablishmentReject",
        }
    }
}

impl PerCodec for DlCcchMessage {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        match self {
            Self::RrcSetup(msg) => {
                enc.choice(0, 4, false)?;
                msg.encode(enc)
            }
            Self::RrcReject(msg) => {
                enc.choice(1, 4, false)?;
                msg.encode(enc)
            }
            Self::RrcReestablishment(msg) => {
                enc.choice(2, 4, false)?;
                msg.encode(enc)
            }
            Self::RrcReestablishmentReject(msg) => {
                enc.choice(3, 4, false)?;
                msg.encode(enc)
            }
        }
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        match dec.choice(4, false)? {
            0 => Ok(Self::RrcSetup(PerCodec::decode(dec)?)),
            1 => Ok(Self::RrcReject(PerCodec::decode(dec)?)),
            2 => Ok(Self::RrcReestablishment(PerCodec::decode(dec)?)),
            _ => Ok(Self::RrcReestablishmentReject(PerCodec::decode(dec)?)),
        }
    }
}

// ============================================================================
// UL-DCCH
// ============================================================================

/// UL-DCCH message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlDcchMessage {
    RrcSetupComplete(RrcSetupComplete),
    RrcReconfigurationComplete(RrcReconfigurationComplete),
    RrcResumeComplete(RrcResumeComplete),
    RrcReestablishmentComplete(RrcReestablishmentComplete),
    MeasurementReport(MeasurementReport),
}

impl UlDcchMessage {
    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RrcSetupComplete(_) => "RRCSetupComplete",
            Self::RrcReconfigurationComplete(_) => "RRCReconfigurationComplete",
            Self::RrcResumeComplete(_) => "RRCResumeComplete",
            Self::RrcReestablishmentComplete(_) => "RRCReestablishmentComplete",
            Self::MeasurementReport(_) => "MeasurementReport",
        }
    }
}

impl PerCodec for UlDcchMessage {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        match self {
            Self::RrcSetupComplete(msg) => {
                enc.choice(0, 5, false)?;
                msg.encode(enc)
            }
            Self::RrcReconfigurationComplete(msg) => {
                enc.choice(1, 5, false)?;
                msg.encode(enc)
            }
            Self::RrcResumeComplete(msg) => {
                enc.choice(2, 5, false)?;
                msg.encode(enc)
            }
            Self::RrcReestablishmentComplete(msg) => {
                enc.choice(3, 5, false)?;
                msg.encode(enc)
            }
            Self::MeasurementReport(msg) => {
                enc.choice(4, 5, false)?;
                msg.encode(enc)
            }
        }
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        match dec.choice(5, false)? {
            0 => Ok(Self::RrcSetupComplete(PerCodec::decode(dec)?)),
            1 => Ok(Self::RrcReconfigurationComplete(PerCodec::decode(dec)?)),
            2 => Ok(Self::RrcResumeComplete(PerCodec::decode(dec)?)),
            3 => Ok(Self::RrcReestablishmentComplete(PerCodec::decode(dec)?)),
            _ => Ok(Self::MeasurementReport(PerCodec::decode(dec)?)),
        }
    }
}

// ============================================================================
// DL-DCCH
// ============================================================================

/// DL-DCCH message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlDcchMessage {
    RrcReconfiguration(RrcReconfiguration),
    RrcRelease(RrcRelease),
    RrcResume(RrcResume),
}

impl DlDcchMessage {
    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RrcReconfiguration(_) => "RRCReconfiguration",
            Self::RrcRelease(_) => "RRCRelease",
            Self::RrcResume(_) => "RRCResume",
        }
    }
}

impl PerCodec for DlDcchMessage {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        match self {
            Self::RrcReconfiguration(msg) => {
                enc.choice(0, 3, false)?;
                msg.encode(enc)
            }
            Self::RrcRelease(msg) => {
                enc.choice(1, 3, false)?;
                msg.encode(enc)
            }
            Self::RrcResume(msg) => {
                enc.choice(2, 3, false)?;
                msg.encode(enc)
            }
        }
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        match dec.choice(3, false)? {
            0 => Ok(Self::RrcReconfiguration(PerCodec::decode(dec)?)),
            1 => Ok(Self::RrcRelease(PerCodec::decode(dec)?)),
            _ => Ok(Self::RrcResume(PerCodec::decode(dec)?)),
        }
    }
}

// ============================================================================
// BCCH
// ============================================================================

/// BCCH message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BcchMessage {
    Mib(MasterInformationBlock),
    SystemInformation(SystemInformation),
}

impl BcchMessage {
    /// Message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mib(_) => "MIB",
            Self::SystemInformation(_) => "SystemInformation",
        }
    }
}

impl PerCodec for BcchMessage {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        match self {
            Self::Mib(msg) => {
                enc.choice(0, 2, false)?;
                msg.encode(enc)
            }
            Self::SystemInformation(msg) => {
                enc.choice(1, 2, false)?;
                msg.encode(enc)
            }
        }
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        match dec.choice(2, false)? {
            0 => Ok(Self::Mib(PerCodec::decode(dec)?)),
            _ => Ok(Self::SystemInformation(PerCodec::decode(dec)?)),
        }
    }
}
