//! Service access points of the RRC layer
//!
//! The registry talks to everything outside the RRC layer through the traits
//! in this module: admission control, the user plane (PDCP/RLC data path),
//! the radio (MAC/PHY and the UE side of the air interface), the core
//! network and the inter-gNB (X2) transport. Scheduling goes through
//! [`Scheduler`] from `nextgsim-common`.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use nextgsim_common::{CellId, GnbConfig, Rnti, Scheduler, Teid};
use nextgsim_rrc::RrcChannel;

use super::bearer::{BearerQos, BearerRecord, PdcpStatus};
use super::timer::{RrcTimer, TimerKind};
use super::x2::X2Message;

// ============================================================================
// Admission control
// ============================================================================

/// What admission control gets to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// RNTI of the UE asking, at this gNB
    pub rnti: Rnti,
    /// Cell the UE is asking in
    pub cell_id: CellId,
    /// The UE declared itself RedCap
    pub reduced_capability: bool,
    /// Contexts currently holding a connection (attach, connected or
    /// handover states)
    pub connected_ues: usize,
}

/// Admission policy.
pub trait AdmissionControl: Send {
    /// Admit a connection request or a resume request.
    fn admit_connection(&mut self, request: &AdmissionRequest) -> bool;

    /// Admit an incoming handover.
    fn admit_handover(&mut self, request: &AdmissionRequest) -> bool;
}

// ============================================================================
// User plane
// ============================================================================

/// PDCP/RLC side of the radio bearers.
pub trait BearerDataPath: Send {
    /// Creates the PDCP/RLC entities of a bearer. The record carries the
    /// tunnel id and peer address.
    fn attach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord);

    /// Starts a DRB once the UE has confirmed its configuration.
    fn start_bearer(&mut self, rnti: Rnti, drb_id: u8);

    /// Tears down the entities of a bearer.
    fn detach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord);

    /// Sends a downlink PDU over the air.
    fn send_pdu(&mut self, rnti: Rnti, drb_id: u8, data: Bytes);

    /// Delivers uplink data towards the core network.
    fn forward_up(&mut self, rnti: Rnti, drb_id: u8, data: Bytes);

    /// Current PDCP SN state of an AM bearer.
    fn pdcp_status(&self, rnti: Rnti, drb_id: u8) -> PdcpStatus;

    /// Installs the PDCP SN state received from a handover source.
    fn set_pdcp_status(&mut self, rnti: Rnti, drb_id: u8, status: PdcpStatus);
}

// ============================================================================
// Radio
// ============================================================================

/// MAC/PHY and the air interface.
pub trait RadioAccess: Send {
    /// Registers a UE with the MAC of a cell.
    fn add_ue(&mut self, rnti: Rnti, cell_id: CellId);

    /// Removes a UE from the MAC.
    fn remove_ue(&mut self, rnti: Rnti);

    /// Sends an encoded RRC message to one UE.
    fn send_rrc(&mut self, rnti: Rnti, channel: RrcChannel, data: Bytes);

    /// Broadcasts an encoded BCCH message in a cell.
    fn broadcast(&mut self, cell_id: CellId, data: Bytes);

    /// Pages an RRC_INACTIVE UE.
    fn page(&mut self, rnti: Rnti);
}

// ============================================================================
// Core network
// ============================================================================

/// Why a UE context was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCause {
    /// RRC Release without suspend
    Normal,
    /// A procedure timer expired
    Timeout(TimerKind),
    /// The UE answered a reject with a setup complete
    Desynchronized,
    /// The UE moved to another context
    HandoverCompleted,
    /// The handover target side was cancelled
    HandoverCancelled,
    /// A handover in leaving state failed
    HandoverFailed,
    /// The UE reestablishment named no usable context
    ReestablishmentRejected,
    /// Temporary context of a UE that resumed or reestablished a stored
    /// context
    Superseded,
}

impl fmt::Display for ReleaseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseCause::Normal => write!(f, "normal release"),
            ReleaseCause::Timeout(kind) => write!(f, "{} timeout", kind),
            ReleaseCause::Desynchronized => write!(f, "desynchronized"),
            ReleaseCause::HandoverCompleted => write!(f, "handover completed"),
            ReleaseCause::HandoverCancelled => write!(f, "handover cancelled"),
            ReleaseCause::HandoverFailed => write!(f, "handover failed"),
            ReleaseCause::ReestablishmentRejected => write!(f, "reestablishment rejected"),
            ReleaseCause::Superseded => write!(f, "superseded"),
        }
    }
}

/// Bearer listed in a path switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSwitchBearer {
    pub bearer_id: u8,
    pub teid: Option<Teid>,
}

/// RRC → core network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreNetworkEvent {
    /// A UE completed RRC setup
    InitialUeMessage {
        rnti: Rnti,
        cell_id: CellId,
        imsi: u64,
        nas_pdu: Option<Vec<u8>>,
    },
    /// A UE arrived at a handover target
    PathSwitchRequest {
        rnti: Rnti,
        cell_id: CellId,
        imsi: Option<u64>,
        bearers: Vec<PathSwitchBearer>,
    },
    /// A UE context was removed
    UeContextRelease {
        rnti: Rnti,
        imsi: Option<u64>,
        cause: ReleaseCause,
    },
}

impl CoreNetworkEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CoreNetworkEvent::InitialUeMessage { .. } => "InitialUeMessage",
            CoreNetworkEvent::PathSwitchRequest { .. } => "PathSwitchRequest",
            CoreNetworkEvent::UeContextRelease { .. } => "UeContextRelease",
        }
    }
}

/// Core network → RRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreNetworkMessage {
    /// The core accepted the UE
    InitialContextSetupRequest { rnti: Rnti },
    /// Set up a data radio bearer for a new tunnel
    DataRadioBearerSetupRequest {
        rnti: Rnti,
        qos: BearerQos,
        bearer_id: u8,
        teid: Teid,
        transport_address: IpAddr,
    },
    /// The downlink path now ends at the handover target
    PathSwitchRequestAck { rnti: Rnti },
    /// Release the UE
    UeContextReleaseCommand { rnti: Rnti },
}

impl CoreNetworkMessage {
    pub fn name(&self) -> &'static str {
        match self {
            CoreNetworkMessage::InitialContextSetupRequest { .. } => "InitialContextSetupRequest",
            CoreNetworkMessage::DataRadioBearerSetupRequest { .. } => "DataRadioBearerSetupRequest",
            CoreNetworkMessage::PathSwitchRequestAck { .. } => "PathSwitchRequestAck",
            CoreNetworkMessage::UeContextReleaseCommand { .. } => "UeContextReleaseCommand",
        }
    }

    pub fn rnti(&self) -> Rnti {
        match self {
            CoreNetworkMessage::InitialContextSetupRequest { rnti }
            | CoreNetworkMessage::DataRadioBearerSetupRequest { rnti, .. }
            | CoreNetworkMessage::PathSwitchRequestAck { rnti }
            | CoreNetworkMessage::UeContextReleaseCommand { rnti } => *rnti,
        }
    }
}

/// Control-plane interface towards the core network.
pub trait CoreNetwork: Send {
    fn notify(&mut self, event: CoreNetworkEvent);
}

// ============================================================================
// X2
// ============================================================================

/// Inter-gNB transport.
pub trait X2Transport: Send {
    fn send(&mut self, message: X2Message);
}

// ============================================================================
// Bundles
// ============================================================================

/// The collaborators a registry owns.
pub struct Collaborators {
    pub admission: Box<dyn AdmissionControl>,
    pub data_path: Box<dyn BearerDataPath>,
    pub radio: Box<dyn RadioAccess>,
    /// `None` runs the gNB without a core network
    pub core: Option<Box<dyn CoreNetwork>>,
    pub x2: Box<dyn X2Transport>,
}

impl Collaborators {
    /// Borrows the collaborators for one event.
    pub fn env<'a>(
        &'a mut self,
        config: &'a GnbConfig,
        scheduler: &'a mut dyn Scheduler<RrcTimer>,
        connected_ues: usize,
    ) -> RrcEnv<'a> {
        RrcEnv {
            config,
            scheduler,
            admission: self.admission.as_mut(),
            data_path: self.data_path.as_mut(),
            radio: self.radio.as_mut(),
            core: self.core.as_mut().map(|core| core.as_mut() as &mut dyn CoreNetwork),
            x2: self.x2.as_mut(),
            connected_ues,
        }
    }
}

/// Borrowed view of the registry's configuration, scheduler and
/// collaborators, handed to UE context handlers for one event.
pub struct RrcEnv<'a> {
    pub config: &'a GnbConfig,
    pub scheduler: &'a mut dyn Scheduler<RrcTimer>,
    pub admission: &'a mut dyn AdmissionControl,
    pub data_path: &'a mut dyn BearerDataPath,
    pub radio: &'a mut dyn RadioAccess,
    pub core: Option<&'a mut dyn CoreNetwork>,
    pub x2: &'a mut dyn X2Transport,
    /// Contexts holding a connection when the event arrived
    pub connected_ues: usize,
}

impl RrcEnv<'_> {
    /// Notifies the core network, if there is one.
    pub fn notify_core(&mut self, event: CoreNetworkEvent) {
        if let Some(core) = self.core.as_deref_mut() {
            core.notify(event);
        }
    }

    pub fn has_core(&self) -> bool {
        self.core.is_some()
    }
}
