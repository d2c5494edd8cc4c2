//! Minimal UE side of the RRC procedures
//!
//! Builds the uplink messages a UE would send and feeds them into a
//! [`Registry`], so tests read as a sequence of UE actions.

use nextgsim_common::{CellId, Rnti};
use nextgsim_gnb::rrc::CoreNetworkMessage;
use nextgsim_gnb::{Registry, RrcError, RrcState};
use nextgsim_rrc::procedures::{
    EstablishmentCause, InitialUeIdentity, MeasurementReport, NeighbourMeasResult,
    PCellMeasResult, ReestablishmentCause, ResumeCause, RrcConnectionRequest,
    RrcReconfigurationComplete, RrcReestablishmentComplete, RrcReestablishmentRequest,
    RrcResumeComplete, RrcResumeRequest, RrcSetupComplete,
};
use nextgsim_rrc::{encode_rrc, PerCodec, RrcChannel, UlCcchMessage, UlDcchMessage};

fn encode<T: PerCodec>(msg: &T) -> Vec<u8> {
    encode_rrc(msg).expect("uplink message must encode")
}

pub fn connection_request(m_tmsi: u32, reduced_capability: bool) -> Vec<u8> {
    encode(&UlCcchMessage::RrcConnectionRequest(RrcConnectionRequest {
        ue_identity: InitialUeIdentity { mmec: 1, m_tmsi },
        establishment_cause: EstablishmentCause::MoSignalling,
        reduced_capability,
    }))
}

pub fn setup_complete(rrc_transaction_id: u8, nas: Option<Vec<u8>>) -> Vec<u8> {
    encode(&UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
        rrc_transaction_id,
        selected_plmn_identity: 1,
        dedicated_nas_message: nas,
    }))
}

pub fn reconfiguration_complete(rrc_transaction_id: u8) -> Vec<u8> {
    encode(&UlDcchMessage::RrcReconfigurationComplete(
        RrcReconfigurationComplete { rrc_transaction_id },
    ))
}

pub fn resume_request(resume_identity: u32, sdt_payload: Vec<Vec<u8>>) -> Vec<u8> {
    encode(&UlCcchMessage::RrcResumeRequest(RrcResumeRequest {
        resume_identity,
        resume_cause: ResumeCause::MoData,
        sdt_payload,
    }))
}

pub fn resume_complete(rrc_transaction_id: u8) -> Vec<u8> {
    encode(&UlDcchMessage::RrcResumeComplete(RrcResumeComplete {
        rrc_transaction_id,
    }))
}

pub fn reestablishment_request(c_rnti: u16, physical_cell_id: u16) -> Vec<u8> {
    encode(&UlCcchMessage::RrcReestablishmentRequest(
        RrcReestablishmentRequest {
            c_rnti,
            physical_cell_id,
            short_mac_i: 0x1234,
            reestablishment_cause: ReestablishmentCause::OtherFailure,
        },
    ))
}

pub fn reestablishment_complete(rrc_transaction_id: u8) -> Vec<u8> {
    encode(&UlDcchMessage::RrcReestablishmentComplete(
        RrcReestablishmentComplete { rrc_transaction_id },
    ))
}

/// Measurement report with one neighbour.
pub fn measurement_report(serving_rsrp: u8, neighbour_pci: u16, neighbour_rsrp: u8) -> Vec<u8> {
    encode(&UlDcchMessage::MeasurementReport(MeasurementReport {
        meas_id: 1,
        pcell: PCellMeasResult {
            rsrp: serving_rsrp,
            rsrq: 20,
        },
        neighbours: vec![NeighbourMeasResult {
            physical_cell_id: neighbour_pci,
            rsrp: Some(neighbour_rsrp),
            rsrq: None,
        }],
    }))
}

/// One emulated UE, known to the gNB by `rnti`.
#[derive(Debug, Clone, Copy)]
pub struct Ue {
    pub rnti: Rnti,
    pub m_tmsi: u32,
    pub reduced_capability: bool,
}

impl Ue {
    /// Random access followed by an RRC connection request.
    pub fn request_connection(
        reg: &mut Registry,
        cell_id: CellId,
        m_tmsi: u32,
        reduced_capability: bool,
    ) -> Result<Self, RrcError> {
        let rnti = reg.on_radio_attempt(cell_id)?;
        let ue = Self {
            rnti,
            m_tmsi,
            reduced_capability,
        };
        reg.on_inbound_message(
            rnti,
            RrcChannel::UlCcch,
            &connection_request(m_tmsi, reduced_capability),
        )?;
        Ok(ue)
    }

    /// Subscriber key the gNB derives from the initial identity.
    pub fn imsi(&self) -> u64 {
        InitialUeIdentity {
            mmec: 1,
            m_tmsi: self.m_tmsi,
        }
        .to_imsi()
    }

    fn transaction_id(&self, reg: &Registry) -> u8 {
        reg.context(self.rnti)
            .map_or(0, |ctx| ctx.last_transaction_id())
    }

    pub fn state(&self, reg: &Registry) -> Option<RrcState> {
        reg.context(self.rnti).map(|ctx| ctx.state())
    }

    pub fn complete_setup(&self, reg: &mut Registry) -> Result<(), RrcError> {
        let tid = self.transaction_id(reg);
        reg.on_inbound_message(self.rnti, RrcChannel::UlDcch, &setup_complete(tid, Some(vec![0x7e, 0x00])))
    }

    pub fn complete_reconfiguration(&self, reg: &mut Registry) -> Result<(), RrcError> {
        let tid = self.transaction_id(reg);
        reg.on_inbound_message(self.rnti, RrcChannel::UlDcch, &reconfiguration_complete(tid))
    }

    /// Completes reconfigurations until the UE rests in `ConnectedNormally`.
    pub fn settle(&self, reg: &mut Registry) -> Result<(), RrcError> {
        while self.state(reg) == Some(RrcState::ConnectionReconfiguration) {
            self.complete_reconfiguration(reg)?;
        }
        Ok(())
    }

    /// Connects a UE all the way to `ConnectedNormally`, answering for the
    /// core network when the registry has one.
    pub fn connect(
        reg: &mut Registry,
        cell_id: CellId,
        m_tmsi: u32,
        reduced_capability: bool,
    ) -> Result<Self, RrcError> {
        let ue = Self::request_connection(reg, cell_id, m_tmsi, reduced_capability)?;
        ue.complete_setup(reg)?;
        if ue.state(reg) == Some(RrcState::AttachRequest) {
            reg.on_core_network(CoreNetworkMessage::InitialContextSetupRequest { rnti: ue.rnti })?;
        }
        ue.settle(reg)?;
        Ok(ue)
    }
}
