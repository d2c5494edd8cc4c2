//! Radio bearer bookkeeping for one UE context
//!
//! Every context owns SRB0 (LCID 0, RLC TM) and SRB1 (LCID 1, RLC AM) from
//! creation on. Data radio bearers are allocated on demand:
//!
//! - DRB identities run 1..=32, or 1..=8 for reduced-capability UEs; 0 is
//!   never used
//! - allocation tries the identity after the last allocated one first and
//!   wraps around
//! - the logical channel identity of DRB `n` is `n + 2`
//! - the RLC mode comes from the configured [`RlcModePolicy`]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

use nextgsim_common::{RlcModePolicy, Teid};
use nextgsim_rrc::ies::{
    BucketSizeDuration, DrbToAddMod, LogicalChannelConfig, PrioritisedBitRate, RadioBearerConfig,
    RlcMode, SrbToAddMod,
};

use super::error::{Resource, RrcError};
use super::redcap::max_data_bearers;

/// QoS class identifiers (standardised QCI characteristics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QosClass {
    /// QCI 1
    ConversationalVoice,
    /// QCI 2
    ConversationalVideo,
    /// QCI 3
    RealTimeGaming,
    /// QCI 4
    NonConversationalVideo,
    /// QCI 5
    ImsSignalling,
    /// QCI 6
    VideoTcpOperator,
    /// QCI 7
    VoiceVideoGaming,
    /// QCI 8
    VideoTcpPremium,
    /// QCI 9
    VideoTcpDefault,
}

impl QosClass {
    pub fn qci(self) -> u8 {
        match self {
            QosClass::ConversationalVoice => 1,
            QosClass::ConversationalVideo => 2,
            QosClass::RealTimeGaming => 3,
            QosClass::NonConversationalVideo => 4,
            QosClass::ImsSignalling => 5,
            QosClass::VideoTcpOperator => 6,
            QosClass::VoiceVideoGaming => 7,
            QosClass::VideoTcpPremium => 8,
            QosClass::VideoTcpDefault => 9,
        }
    }

    /// Looks a class up by QCI.
    pub fn from_qci(qci: u8) -> Option<Self> {
        Some(match qci {
            1 => QosClass::ConversationalVoice,
            2 => QosClass::ConversationalVideo,
            3 => QosClass::RealTimeGaming,
            4 => QosClass::NonConversationalVideo,
            5 => QosClass::ImsSignalling,
            6 => QosClass::VideoTcpOperator,
            7 => QosClass::VoiceVideoGaming,
            8 => QosClass::VideoTcpPremium,
            9 => QosClass::VideoTcpDefault,
            _ => return None,
        })
    }

    /// Guaranteed bit rate class
    pub fn is_gbr(self) -> bool {
        matches!(
            self,
            QosClass::ConversationalVoice
                | QosClass::ConversationalVideo
                | QosClass::RealTimeGaming
                | QosClass::NonConversationalVideo
        )
    }

    /// Scheduling priority, 1 is highest
    pub fn priority(self) -> u8 {
        match self {
            QosClass::ImsSignalling => 1,
            QosClass::ConversationalVoice => 2,
            QosClass::RealTimeGaming => 3,
            QosClass::ConversationalVideo => 4,
            QosClass::NonConversationalVideo => 5,
            QosClass::VideoTcpOperator => 6,
            QosClass::VoiceVideoGaming => 7,
            QosClass::VideoTcpPremium => 8,
            QosClass::VideoTcpDefault => 9,
        }
    }

    /// Packet error loss rate the class tolerates
    pub fn packet_error_loss_rate(self) -> f64 {
        match self {
            QosClass::ConversationalVoice => 1e-2,
            QosClass::ConversationalVideo
            | QosClass::RealTimeGaming
            | QosClass::VoiceVideoGaming => 1e-3,
            QosClass::NonConversationalVideo
            | QosClass::ImsSignalling
            | QosClass::VideoTcpOperator
            | QosClass::VideoTcpPremium
            | QosClass::VideoTcpDefault => 1e-6,
        }
    }
}

/// QoS of one data bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerQos {
    pub class: QosClass,
    /// Guaranteed uplink bit rate (bit/s), GBR classes only
    pub gbr_ul_bps: u64,
    /// Guaranteed downlink bit rate (bit/s), GBR classes only
    pub gbr_dl_bps: u64,
}

impl BearerQos {
    /// Non-GBR bearer of the given class.
    pub fn new(class: QosClass) -> Self {
        Self {
            class,
            gbr_ul_bps: 0,
            gbr_dl_bps: 0,
        }
    }

    /// GBR bearer of the given class.
    pub fn gbr(class: QosClass, gbr_ul_bps: u64, gbr_dl_bps: u64) -> Self {
        Self {
            class,
            gbr_ul_bps,
            gbr_dl_bps,
        }
    }

    /// Prioritised bit rate in kbit/s: the guaranteed uplink rate for GBR
    /// classes, zero otherwise.
    pub fn prioritised_bit_rate_kbps(&self) -> u64 {
        if self.class.is_gbr() {
            self.gbr_ul_bps / 1000
        } else {
            0
        }
    }
}

/// PDCP sequence number state of an AM bearer, as carried in SN status
/// transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdcpStatus {
    /// Next downlink SN to assign
    pub dl_sn: u32,
    /// Next uplink SN expected
    pub ul_sn: u32,
}

/// Signalling or data radio bearer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BearerId {
    Srb(u8),
    Drb(u8),
}

impl fmt::Display for BearerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BearerId::Srb(id) => write!(f, "SRB{}", id),
            BearerId::Drb(id) => write!(f, "DRB{}", id),
        }
    }
}

/// One radio bearer of a UE context.
#[derive(Debug, Clone, PartialEq)]
pub struct BearerRecord {
    pub id: BearerId,
    /// Logical channel identity
    pub lcid: u8,
    pub rlc_mode: RlcMode,
    pub logical_channel_config: LogicalChannelConfig,
    /// QoS, data bearers only
    pub qos: Option<BearerQos>,
    /// GTP tunnel of the bearer on the core side
    pub teid: Option<Teid>,
    /// Transport address of the tunnel peer
    pub transport_address: Option<IpAddr>,
    /// PDCP SNs received in an SN status transfer
    pub pdcp_status: Option<PdcpStatus>,
}

impl BearerRecord {
    fn srb0() -> Self {
        Self {
            id: BearerId::Srb(0),
            lcid: 0,
            rlc_mode: RlcMode::Tm,
            logical_channel_config: LogicalChannelConfig {
                priority: 1,
                prioritised_bit_rate: PrioritisedBitRate::Infinity,
                bucket_size_duration: BucketSizeDuration::Ms50,
                logical_channel_group: None,
            },
            qos: None,
            teid: None,
            transport_address: None,
            pdcp_status: None,
        }
    }

    fn srb1() -> Self {
        Self {
            id: BearerId::Srb(1),
            lcid: 1,
            rlc_mode: RlcMode::Am,
            logical_channel_config: LogicalChannelConfig {
                priority: 1,
                // no 100 kbps step in the enumeration, rounds up to 128 kbps
                prioritised_bit_rate: PrioritisedBitRate::from_kbps(100),
                bucket_size_duration: BucketSizeDuration::Ms100,
                logical_channel_group: Some(0),
            },
            qos: None,
            teid: None,
            transport_address: None,
            pdcp_status: None,
        }
    }

    /// DRB identity, `None` for signalling bearers
    pub fn drb_id(&self) -> Option<u8> {
        match self.id {
            BearerId::Drb(id) => Some(id),
            BearerId::Srb(_) => None,
        }
    }

    fn to_srb_to_add_mod(&self) -> Option<SrbToAddMod> {
        match self.id {
            BearerId::Srb(id) if id > 0 => Some(SrbToAddMod {
                srb_identity: id,
                rlc_mode: self.rlc_mode,
                logical_channel_config: self.logical_channel_config.clone(),
            }),
            _ => None,
        }
    }

    fn to_drb_to_add_mod(&self) -> Option<DrbToAddMod> {
        self.drb_id().map(|id| DrbToAddMod {
            drb_identity: id,
            bearer_identity: Some(id),
            logical_channel_identity: self.lcid,
            rlc_mode: self.rlc_mode,
            logical_channel_config: self.logical_channel_config.clone(),
        })
    }
}

/// RLC mode of a new data bearer under `policy`.
pub fn select_rlc_mode(policy: RlcModePolicy, class: QosClass) -> RlcMode {
    match policy {
        RlcModePolicy::AlwaysTm => RlcMode::Tm,
        RlcModePolicy::AlwaysUm => RlcMode::Um,
        RlcModePolicy::AlwaysAm => RlcMode::Am,
        RlcModePolicy::PerBased => {
            if class.packet_error_loss_rate() <= 1.0e-5 {
                RlcMode::Am
            } else {
                RlcMode::Um
            }
        }
    }
}

/// Bearer table of one UE context.
#[derive(Debug, Clone)]
pub struct BearerManager {
    srb0: BearerRecord,
    srb1: BearerRecord,
    drbs: BTreeMap<u8, BearerRecord>,
    last_allocated_drb: u8,
    max_drbs: u8,
    rlc_mode_policy: RlcModePolicy,
    to_be_started: BTreeSet<u8>,
    released: Vec<u8>,
}

impl BearerManager {
    pub fn new(rlc_mode_policy: RlcModePolicy, reduced_capability: bool) -> Self {
        Self {
            srb0: BearerRecord::srb0(),
            srb1: BearerRecord::srb1(),
            drbs: BTreeMap::new(),
            last_allocated_drb: 0,
            max_drbs: max_data_bearers(reduced_capability),
            rlc_mode_policy,
            to_be_started: BTreeSet::new(),
            released: Vec::new(),
        }
    }

    /// Applies the UE's capability class once it is known. Bearers already
    /// allocated are kept.
    pub fn set_reduced_capability(&mut self, reduced_capability: bool) {
        self.max_drbs = max_data_bearers(reduced_capability);
    }

    /// Highest DRB identity this UE may use
    pub fn max_drbs(&self) -> u8 {
        self.max_drbs
    }

    pub fn srb0(&self) -> &BearerRecord {
        &self.srb0
    }

    pub fn srb1(&self) -> &BearerRecord {
        &self.srb1
    }

    /// Allocates a DRB.
    pub fn add_data_bearer(
        &mut self,
        qos: BearerQos,
        teid: Option<Teid>,
        transport_address: Option<IpAddr>,
    ) -> Result<u8, RrcError> {
        let max = self.max_drbs;
        let drb_id = (0..max)
            .map(|i| (self.last_allocated_drb + i) % max + 1)
            .find(|id| !self.drbs.contains_key(id))
            .ok_or(RrcError::ResourceExhausted(Resource::DataBearer))?;
        self.insert(drb_id, qos, teid, transport_address);
        Ok(drb_id)
    }

    /// Allocates a specific DRB identity, used when a bearer table is
    /// replicated at a handover target.
    pub fn add_data_bearer_with_id(
        &mut self,
        drb_id: u8,
        qos: BearerQos,
        teid: Option<Teid>,
        transport_address: Option<IpAddr>,
    ) -> Result<u8, RrcError> {
        if drb_id == 0 || drb_id > self.max_drbs || self.drbs.contains_key(&drb_id) {
            return Err(RrcError::ResourceExhausted(Resource::DataBearer));
        }
        self.insert(drb_id, qos, teid, transport_address);
        Ok(drb_id)
    }

    fn insert(&mut self, drb_id: u8, qos: BearerQos, teid: Option<Teid>, transport_address: Option<IpAddr>) {
        let rlc_mode = select_rlc_mode(self.rlc_mode_policy, qos.class);
        let record = BearerRecord {
            id: BearerId::Drb(drb_id),
            lcid: drb_id + 2,
            rlc_mode,
            logical_channel_config: LogicalChannelConfig {
                priority: qos.class.priority(),
                prioritised_bit_rate: PrioritisedBitRate::from_kbps(qos.prioritised_bit_rate_kbps()),
                bucket_size_duration: BucketSizeDuration::Ms1000,
                logical_channel_group: Some(if qos.class.is_gbr() { 1 } else { 2 }),
            },
            qos: Some(qos),
            teid,
            transport_address,
            pdcp_status: None,
        };
        self.drbs.insert(drb_id, record);
        self.to_be_started.insert(drb_id);
        self.released.retain(|id| *id != drb_id);
        self.last_allocated_drb = drb_id;
    }

    /// Removes a DRB together with its tunnel mapping.
    pub fn release_data_bearer(&mut self, drb_id: u8) -> Option<BearerRecord> {
        let record = self.drbs.remove(&drb_id)?;
        self.to_be_started.remove(&drb_id);
        self.released.push(drb_id);
        Some(record)
    }

    pub fn drb(&self, drb_id: u8) -> Option<&BearerRecord> {
        self.drbs.get(&drb_id)
    }

    pub fn drb_mut(&mut self, drb_id: u8) -> Option<&mut BearerRecord> {
        self.drbs.get_mut(&drb_id)
    }

    /// Data bearers in identity order
    pub fn drbs(&self) -> impl Iterator<Item = &BearerRecord> {
        self.drbs.values()
    }

    /// Signalling bearers followed by data bearers
    pub fn all(&self) -> impl Iterator<Item = &BearerRecord> {
        [&self.srb0, &self.srb1].into_iter().chain(self.drbs.values())
    }

    /// Data bearers running RLC AM
    pub fn am_drbs(&self) -> impl Iterator<Item = &BearerRecord> {
        self.drbs.values().filter(|b| b.rlc_mode == RlcMode::Am)
    }

    /// Lowest live DRB identity
    pub fn first_drb(&self) -> Option<u8> {
        self.drbs.keys().next().copied()
    }

    pub fn drb_count(&self) -> usize {
        self.drbs.len()
    }

    pub fn has_drb(&self, drb_id: u8) -> bool {
        self.drbs.contains_key(&drb_id)
    }

    /// DRBs added since the last completed reconfiguration.
    pub fn pending_start(&self) -> impl Iterator<Item = u8> + '_ {
        self.to_be_started.iter().copied()
    }

    /// Drains the DRBs waiting to be started.
    pub fn take_to_be_started(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.to_be_started).into_iter().collect()
    }

    /// Full bearer configuration: optionally SRB1, and every DRB.
    pub fn radio_bearer_config(&self, include_srb1: bool) -> RadioBearerConfig {
        RadioBearerConfig {
            srb_to_add_mod_list: if include_srb1 {
                self.srb1.to_srb_to_add_mod().into_iter().collect()
            } else {
                Vec::new()
            },
            drb_to_add_mod_list: self.drbs.values().filter_map(|b| b.to_drb_to_add_mod()).collect(),
            drb_to_release_list: Vec::new(),
        }
    }

    /// Bearer configuration for an RRC Reconfiguration: every DRB plus the
    /// DRBs released since the previous one.
    pub fn reconfiguration_bearer_config(&mut self) -> RadioBearerConfig {
        let mut config = self.radio_bearer_config(false);
        config.drb_to_release_list = std::mem::take(&mut self.released);
        config
    }
}
