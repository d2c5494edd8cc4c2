//! RedCap (Reduced Capability) UE handling (Rel-17)
//!
//! RedCap UEs announce themselves in the RRC connection request. The gNB
//! then:
//! - limits them to 8 data radio bearers instead of 32
//! - configures a single-layer antenna transmission mode
//! - suspends them to RRC_INACTIVE on release instead of releasing to idle,
//!   with a suspend configuration that keeps the first DRB usable for small
//!   data transfer
//!
//! # 3GPP Reference
//!
//! - TS 38.306: UE Radio Access Capabilities
//! - TS 38.331 (RRC): SuspendConfig, SDT-Config

use nextgsim_common::Rnti;
use nextgsim_rrc::ies::{AntennaTransmissionMode, MAX_DRB_ID};
use nextgsim_rrc::procedures::{
    ExtendedPagingCycle, PagingCycle, PeriodicRnaUpdateTimer, SdtConfig, SuspendConfig,
};

use super::state::RrcState;

/// DRB identities available to a RedCap UE
pub const REDCAP_MAX_DRBS: u8 = 8;

/// DRB identities available to any other UE
pub const MAX_DRBS: u8 = MAX_DRB_ID;

/// Highest DRB identity for the UE's capability class.
pub fn max_data_bearers(reduced_capability: bool) -> u8 {
    if reduced_capability {
        REDCAP_MAX_DRBS
    } else {
        MAX_DRBS
    }
}

/// Antenna transmission mode configured in the dedicated physical config.
pub fn antenna_transmission_mode(reduced_capability: bool) -> AntennaTransmissionMode {
    if reduced_capability {
        AntennaTransmissionMode::Tm1
    } else {
        AntennaTransmissionMode::Tm2
    }
}

/// State a released UE ends up in.
pub fn release_state(reduced_capability: bool) -> RrcState {
    if reduced_capability {
        RrcState::Inactive
    } else {
        RrcState::Idle
    }
}

/// Suspend configuration sent with the release of a RedCap UE.
///
/// The inactive RNTIs are the UE's RNTI so a later resume request can be
/// routed back to the stored context.
pub fn build_suspend_config(rnti: Rnti, sdt_drb: Option<u8>) -> SuspendConfig {
    SuspendConfig {
        full_i_rnti: u64::from(rnti.value()),
        short_i_rnti: u32::from(rnti.value()),
        ran_paging_cycle: PagingCycle::Rf32,
        t380: PeriodicRnaUpdateTimer::Min5,
        ran_extended_paging_cycle: Some(ExtendedPagingCycle::Rf256),
        sdt_config: sdt_drb.map(|drb| SdtConfig {
            sdt_drb_list: vec![drb],
        }),
    }
}

/// RNTI a resume identity refers to, if it names one.
pub fn rnti_from_resume_identity(resume_identity: u32) -> Option<Rnti> {
    u16::try_from(resume_identity).ok().and_then(Rnti::new)
}
