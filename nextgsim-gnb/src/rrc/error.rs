//! RRC session manager errors

use std::fmt;

use nextgsim_common::{CellId, Rnti};
use nextgsim_rrc::procedures::HandoverPreparationError;
use nextgsim_rrc::{DecodeError, EncodeError, RrcChannel};
use thiserror::Error;

use super::state::RrcState;
use super::timer::TimerKind;

/// A resource whose pool can run dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// RNTI space of the registry
    SessionIdentifier,
    /// DRB identifier space of one context
    DataBearer,
    /// SRS configuration indices of one cell
    MeasurementResource,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::SessionIdentifier => write!(f, "session identifier"),
            Resource::DataBearer => write!(f, "data radio bearer"),
            Resource::MeasurementResource => write!(f, "SRS configuration index"),
        }
    }
}

/// Errors surfaced by the RRC registry and UE contexts.
///
/// None of these take the registry down. A protocol violation leaves the
/// context as it was; the other errors are terminal at most for the one
/// context involved.
#[derive(Debug, Error)]
pub enum RrcError {
    /// Message or trigger not accepted in the context's current state
    #[error("UE[{rnti}] {event} not accepted in state {state}")]
    ProtocolViolation {
        rnti: Rnti,
        state: RrcState,
        event: &'static str,
    },

    /// A resource pool is exhausted
    #[error("No free {0}")]
    ResourceExhausted(Resource),

    /// Admission control refused the procedure
    #[error("UE[{rnti}] {procedure} denied by admission control")]
    AdmissionDenied { rnti: Rnti, procedure: &'static str },

    /// A procedure timer expired
    #[error("UE[{rnti}] {timer} timer expired")]
    Timeout { rnti: Rnti, timer: TimerKind },

    /// Malformed inbound message
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// No context with this RNTI
    #[error("Unknown UE context {0}")]
    UnknownContext(Rnti),

    /// Cell not served by this gNB nor known as a neighbour
    #[error("Unknown cell {0}")]
    UnknownCell(CellId),

    /// No data radio bearer with this identity
    #[error("UE[{rnti}] has no DRB {drb_id}")]
    UnknownBearer { rnti: Rnti, drb_id: u8 },

    /// Inbound path was handed a downlink channel
    #[error("Unexpected channel {0} on the uplink path")]
    UnexpectedChannel(RrcChannel),

    /// Container token already redeemed or issued elsewhere, or container
    /// contents of the wrong kind
    #[error("Invalid RRC container")]
    InvalidContainer,
}

impl From<HandoverPreparationError> for RrcError {
    fn from(err: HandoverPreparationError) -> Self {
        match err {
            HandoverPreparationError::Encode(e) => RrcError::Encode(e),
            HandoverPreparationError::Decode(e) => RrcError::Decode(e),
            HandoverPreparationError::InvalidMessageType { .. }
            | HandoverPreparationError::MissingMandatoryField(_) => RrcError::InvalidContainer,
        }
    }
}

impl RrcError {
    /// Returns true for the report-and-ignore class of errors.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, RrcError::ProtocolViolation { .. })
    }
}
