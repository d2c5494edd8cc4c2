//! Inter-gNB (X2) messages used by handover
//!
//! These are plain values handed to the [`X2Transport`](super::sap::X2Transport)
//! collaborator; RRC contents travel in an [`RrcContainer`]. RNTIs are always
//! qualified by the side that allocated them: `old_rnti` belongs to the
//! handover source, `new_rnti` to the target.

use std::net::IpAddr;

use bytes::Bytes;
use nextgsim_common::{CellId, Rnti, Teid};

use super::bearer::{BearerQos, PdcpStatus};
use super::container::RrcContainer;

/// Cause carried by handover messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X2Cause {
    /// Radio conditions call for a handover
    HandoverDesirableForRadioReasons,
    /// Admission control refused the handover
    NoRadioResourcesAvailable,
    /// The target cell is not served by the receiving gNB
    CellNotAvailable,
    /// The UE never arrived at the target (joining timer)
    TRelocPrepExpiry,
    /// The source was never released (leaving timer)
    TX2RelocOverallExpiry,
    /// The RRC container could not be read
    AbstractSyntaxError,
    /// The source released the UE before the handover finished
    ReleaseDueToGnbGeneratedReason,
}

/// Bearer the source asks the target to set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X2BearerToSetup {
    pub drb_id: u8,
    pub qos: BearerQos,
    /// Core-side uplink tunnel
    pub teid: Option<Teid>,
    pub transport_address: Option<IpAddr>,
}

/// Bearer the target admitted, with its forwarding tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X2AdmittedBearer {
    pub drb_id: u8,
    /// Tunnel the source forwards downlink data into
    pub dl_forwarding_teid: Teid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverRequest {
    pub old_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub cause: X2Cause,
    pub imsi: Option<u64>,
    /// The UE is RedCap
    pub reduced_capability: bool,
    pub ue_ambr_dl_bps: u64,
    pub ue_ambr_ul_bps: u64,
    pub bearers: Vec<X2BearerToSetup>,
    /// Handover preparation information
    pub rrc_context: RrcContainer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverRequestAck {
    pub old_rnti: Rnti,
    pub new_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub admitted_bearers: Vec<X2AdmittedBearer>,
    /// Handover command for the UE
    pub rrc_context: RrcContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverPreparationFailure {
    pub old_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub cause: X2Cause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverCancel {
    pub old_rnti: Rnti,
    pub new_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub cause: X2Cause,
}

/// PDCP SN state of one AM bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnStatusItem {
    pub drb_id: u8,
    pub status: PdcpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnStatusTransfer {
    pub old_rnti: Rnti,
    pub new_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub bearers: Vec<SnStatusItem>,
}

/// Target → source once the path switch is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeContextRelease {
    pub old_rnti: Rnti,
    pub new_rnti: Rnti,
    pub source_cell: CellId,
    pub target_cell: CellId,
}

/// Radio resource usage of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLoad {
    pub cell_id: CellId,
    /// Downlink PRB usage, percent
    pub dl_prb_usage: u8,
    /// Uplink PRB usage, percent
    pub ul_prb_usage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadInformation {
    pub source_cell: CellId,
    pub target_cell: CellId,
    pub cells: Vec<CellLoad>,
}

/// Downlink user data forwarded from the source during handover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeDataForward {
    pub source_cell: CellId,
    pub target_cell: CellId,
    /// Forwarding tunnel allocated by the target
    pub teid: Teid,
    pub data: Bytes,
}

/// X2AP messages exchanged between gNBs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum X2Message {
    HandoverRequest(HandoverRequest),
    HandoverRequestAck(HandoverRequestAck),
    HandoverPreparationFailure(HandoverPreparationFailure),
    HandoverCancel(HandoverCancel),
    SnStatusTransfer(SnStatusTransfer),
    UeContextRelease(UeContextRelease),
    LoadInformation(LoadInformation),
    UeDataForward(UeDataForward),
}

impl X2Message {
    pub fn name(&self) -> &'static str {
        match self {
            X2Message::HandoverRequest(_) => "HandoverRequest",
            X2Message::HandoverRequestAck(_) => "HandoverRequestAck",
            X2Message::HandoverPreparationFailure(_) => "HandoverPreparationFailure",
            X2Message::HandoverCancel(_) => "HandoverCancel",
            X2Message::SnStatusTransfer(_) => "SnStatusTransfer",
            X2Message::UeContextRelease(_) => "UeContextRelease",
            X2Message::LoadInformation(_) => "LoadInformation",
            X2Message::UeDataForward(_) => "UeDataForward",
        }
    }

    /// Handover source and target cells (sender and receiver for load
    /// information).
    pub fn cells(&self) -> (CellId, CellId) {
        match self {
            X2Message::HandoverRequest(m) => (m.source_cell, m.target_cell),
            X2Message::HandoverRequestAck(m) => (m.source_cell, m.target_cell),
            X2Message::HandoverPreparationFailure(m) => (m.source_cell, m.target_cell),
            X2Message::HandoverCancel(m) => (m.source_cell, m.target_cell),
            X2Message::SnStatusTransfer(m) => (m.source_cell, m.target_cell),
            X2Message::UeContextRelease(m) => (m.source_cell, m.target_cell),
            X2Message::LoadInformation(m) => (m.source_cell, m.target_cell),
            X2Message::UeDataForward(m) => (m.source_cell, m.target_cell),
        }
    }

    /// Cell whose gNB must receive the message.
    pub fn destination_cell(&self) -> CellId {
        let (source, target) = self.cells();
        match self {
            X2Message::HandoverRequestAck(_)
            | X2Message::HandoverPreparationFailure(_)
            | X2Message::UeContextRelease(_) => source,
            X2Message::HandoverRequest(_)
            | X2Message::HandoverCancel(_)
            | X2Message::SnStatusTransfer(_)
            | X2Message::LoadInformation(_)
            | X2Message::UeDataForward(_) => target,
        }
    }

    /// Mutable access to the RRC container, if the message has one.
    pub fn container_mut(&mut self) -> Option<&mut RrcContainer> {
        match self {
            X2Message::HandoverRequest(m) => Some(&mut m.rrc_context),
            X2Message::HandoverRequestAck(m) => Some(&mut m.rrc_context),
            _ => None,
        }
    }
}
