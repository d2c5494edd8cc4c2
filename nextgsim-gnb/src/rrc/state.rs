//! RRC connection states of a UE context
//!
//! A context is created in one of two states ([`InitialState`]) and only
//! moves along the edges of [`RrcState::can_transition_to`]. Destruction is
//! a registry action, not a state.

use std::fmt;

/// RRC connection state of one UE context
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RrcState {
    /// Random access detected, waiting for a connection request
    InitialRandomAccess,
    /// Released without suspend, about to be destroyed
    Idle,
    /// RRC Setup sent, waiting for setup complete
    ConnectionSetup,
    /// RRC Reject sent, context kept until the reject timer fires
    ConnectionRejected,
    /// Waiting for the core network to set up the UE context
    AttachRequest,
    /// Connected with no procedure in progress
    ConnectedNormally,
    /// RRC Reconfiguration sent, waiting for completion
    ConnectionReconfiguration,
    /// RRC Reestablishment sent, waiting for completion
    ConnectionReestablishment,
    /// Handover request sent to a peer gNB, waiting for its answer
    HandoverPreparation,
    /// Target side of a handover, waiting for the UE to arrive
    HandoverJoining,
    /// UE arrived at the target, waiting for the path switch
    HandoverPathSwitch,
    /// Source side of a handover, waiting to be released
    HandoverLeaving,
    /// Suspended with a stored context (RRC_INACTIVE)
    Inactive,
    /// Paged or resuming from RRC_INACTIVE
    InactiveConnecting,
    /// Small data transfer in progress from RRC_INACTIVE
    SmallDataTransfer,
}

impl fmt::Display for RrcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RrcState::InitialRandomAccess => "InitialRandomAccess",
            RrcState::Idle => "Idle",
            RrcState::ConnectionSetup => "ConnectionSetup",
            RrcState::ConnectionRejected => "ConnectionRejected",
            RrcState::AttachRequest => "AttachRequest",
            RrcState::ConnectedNormally => "ConnectedNormally",
            RrcState::ConnectionReconfiguration => "ConnectionReconfiguration",
            RrcState::ConnectionReestablishment => "ConnectionReestablishment",
            RrcState::HandoverPreparation => "HandoverPreparation",
            RrcState::HandoverJoining => "HandoverJoining",
            RrcState::HandoverPathSwitch => "HandoverPathSwitch",
            RrcState::HandoverLeaving => "HandoverLeaving",
            RrcState::Inactive => "Inactive",
            RrcState::InactiveConnecting => "InactiveConnecting",
            RrcState::SmallDataTransfer => "SmallDataTransfer",
        };
        f.write_str(name)
    }
}

impl RrcState {
    /// Every state, in declaration order.
    pub const ALL: [RrcState; 15] = [
        RrcState::InitialRandomAccess,
        RrcState::Idle,
        RrcState::ConnectionSetup,
        RrcState::ConnectionRejected,
        RrcState::AttachRequest,
        RrcState::ConnectedNormally,
        RrcState::ConnectionReconfiguration,
        RrcState::ConnectionReestablishment,
        RrcState::HandoverPreparation,
        RrcState::HandoverJoining,
        RrcState::HandoverPathSwitch,
        RrcState::HandoverLeaving,
        RrcState::Inactive,
        RrcState::InactiveConnecting,
        RrcState::SmallDataTransfer,
    ];

    /// Returns true if a reconfiguration requested in this state must be
    /// deferred until the context is back in `ConnectedNormally`.
    pub fn defers_reconfiguration(self) -> bool {
        matches!(
            self,
            RrcState::InitialRandomAccess
                | RrcState::ConnectionSetup
                | RrcState::AttachRequest
                | RrcState::ConnectionReconfiguration
                | RrcState::ConnectionReestablishment
                | RrcState::HandoverPreparation
                | RrcState::HandoverJoining
                | RrcState::HandoverLeaving
        )
    }

    /// Returns true if downlink data arriving in this state is queued
    /// instead of forwarded.
    pub fn buffers_data(self) -> bool {
        matches!(
            self,
            RrcState::InitialRandomAccess
                | RrcState::ConnectionSetup
                | RrcState::HandoverJoining
                | RrcState::Inactive
                | RrcState::InactiveConnecting
                | RrcState::SmallDataTransfer
        )
    }

    /// Returns true if downlink data arriving in this state goes straight to
    /// the bearer's data path.
    pub fn forwards_data(self) -> bool {
        matches!(
            self,
            RrcState::AttachRequest
                | RrcState::ConnectedNormally
                | RrcState::ConnectionReconfiguration
                | RrcState::ConnectionReestablishment
                | RrcState::HandoverPreparation
                | RrcState::HandoverPathSwitch
        )
    }

    /// Returns true for the states the release procedure may start from.
    pub fn is_active(self) -> bool {
        self.forwards_data() || self == RrcState::HandoverLeaving
    }

    /// Returns true once random access is complete and the UE holds a
    /// dedicated connection.
    pub fn is_random_access_completed(self) -> bool {
        matches!(
            self,
            RrcState::ConnectedNormally | RrcState::ConnectionReconfiguration
        )
    }

    /// Legal transition table.
    pub fn can_transition_to(self, next: RrcState) -> bool {
        use RrcState::*;

        match self {
            InitialRandomAccess => matches!(next, ConnectionSetup | ConnectionRejected),
            ConnectionSetup => matches!(next, AttachRequest | ConnectedNormally),
            AttachRequest => matches!(next, ConnectedNormally | Idle | Inactive),
            ConnectedNormally => matches!(
                next,
                ConnectionReconfiguration
                    | ConnectionReestablishment
                    | HandoverPreparation
                    | HandoverLeaving
                    | Idle
                    | Inactive
            ),
            ConnectionReconfiguration => matches!(next, ConnectedNormally | Idle | Inactive),
            ConnectionReestablishment => matches!(next, ConnectedNormally | Idle | Inactive),
            HandoverPreparation => {
                matches!(next, ConnectedNormally | HandoverLeaving | Idle | Inactive)
            }
            HandoverJoining => matches!(next, HandoverPathSwitch),
            HandoverPathSwitch => matches!(next, ConnectedNormally | Idle | Inactive),
            HandoverLeaving => matches!(next, ConnectionReestablishment | Idle),
            Inactive => matches!(next, InactiveConnecting),
            InactiveConnecting => matches!(
                next,
                ConnectedNormally | SmallDataTransfer | ConnectionRejected
            ),
            SmallDataTransfer => matches!(next, Inactive),
            ConnectionRejected | Idle => false,
        }
    }
}

/// The two states a context can be created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialState {
    /// A UE detected by random access
    RandomAccess,
    /// The target side of a handover
    HandoverJoining,
}

impl From<InitialState> for RrcState {
    fn from(state: InitialState) -> Self {
        match state {
            InitialState::RandomAccess => RrcState::InitialRandomAccess,
            InitialState::HandoverJoining => RrcState::HandoverJoining,
        }
    }
}
