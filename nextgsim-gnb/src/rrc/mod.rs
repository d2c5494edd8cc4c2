//! RRC (Radio Resource Control) Module for gNB
//!
//! This module implements the RRC control plane of the gNB:
//! - UE context registry keyed by RNTI, with RNTI and SRS allocation
//! - Per-UE RRC state machine (setup, attach, reconfiguration, release,
//!   suspend/resume, small data transfer, reestablishment)
//! - Data radio bearer management and RedCap limits
//! - Intra-gNB and X2-based inter-gNB handover, manual or A3-triggered
//! - Periodic MIB/SIB broadcast
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Registry                              │
//! │  ┌─────────────────┐  ┌─────────────────────────────────┐   │
//! │  │  UE Contexts    │  │  Handover Coordinator           │   │
//! │  │  - RRC State    │  │  - Intra-gNB                    │   │
//! │  │  - Bearers      │  │  - X2 source / target           │   │
//! │  │  - Timers       │  │  - A3 time-to-trigger           │   │
//! │  └─────────────────┘  └─────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!      │            │            │            │            │
//!      ▼            ▼            ▼            ▼            ▼
//!  Admission    Data path      Radio     Core network     X2
//! ```
//!
//! Everything outside the registry is reached through the traits in
//! [`sap`]; every wait is a timer on a [`Scheduler`](nextgsim_common::Scheduler).
//!
//! # RRC State Machine
//!
//! ```text
//!  InitialRandomAccess ──> ConnectionSetup ──> AttachRequest ──┐
//!          │                     │                             ▼
//!          ▼                     └──────────────────> ConnectedNormally
//!  ConnectionRejected                                   │   ▲    │
//!                                Reconfiguration <──────┤   │    ├──> HandoverPreparation
//!                                Reestablishment <──────┘   │    └──> HandoverLeaving
//!                                                           │
//!  HandoverJoining ──> HandoverPathSwitch ──────────────────┤
//!                                                           │
//!  Inactive ──> InactiveConnecting ─────────────────────────┘
//!     ▲               │
//!     └── SmallDataTransfer
//! ```
//!
//! # Message Flow
//!
//! ## RRC Setup Procedure
//! ```text
//! UE                    gNB (RRC)                 Core
//!  │                        │                       │
//!  │──RRCConnectionRequest─>│                       │
//!  │<─────────RRCSetup──────│                       │
//!  │──RRCSetupComplete─────>│                       │
//!  │                        │──InitialUeMessage────>│
//!  │                        │<─InitialContextSetup──│
//!  │<──RRCReconfiguration───│                       │
//! ```

pub mod bearer;
pub mod connection;
pub mod container;
pub mod error;
pub mod handover;
pub mod redcap;
pub mod registry;
pub mod sap;
pub mod srs;
pub mod state;
pub mod task;
pub mod timer;
pub mod ue_context;
pub mod x2;

// Re-export main types
pub use bearer::{BearerId, BearerManager, BearerQos, BearerRecord, PdcpStatus, QosClass};
pub use connection::{RrcAdmission, TransactionCounter};
pub use container::{relay_container, ContainerArena, ContainerPayload, ContainerToken, RrcContainer};
pub use error::{Resource, RrcError};
pub use handover::{a3_target, deliver_x2};
pub use registry::{Registry, RegistryStats};
pub use sap::{
    AdmissionControl, AdmissionRequest, BearerDataPath, Collaborators, CoreNetwork,
    CoreNetworkEvent, CoreNetworkMessage, PathSwitchBearer, RadioAccess, ReleaseCause, RrcEnv,
    X2Transport,
};
pub use srs::SrsAllocator;
pub use state::{InitialState, RrcState};
pub use task::{channel_collaborators, ChannelCollaborator, RrcTask};
pub use timer::{RrcTimer, TimerKind, TimerSet};
pub use ue_context::{HandoverPeer, Step, UeContext};
pub use x2::{
    CellLoad, HandoverCancel, HandoverPreparationFailure, HandoverRequest, HandoverRequestAck,
    LoadInformation, SnStatusItem, SnStatusTransfer, UeContextRelease, UeDataForward,
    X2AdmittedBearer, X2BearerToSetup, X2Cause, X2Message,
};
