//! RRC UE Context
//!
//! One `UeContext` exists per UE known to the registry. It owns the UE's
//! bearer table, its procedure timers and its transaction counter, and it
//! runs the per-UE side of every RRC procedure: connection setup, attach,
//! reconfiguration, release and suspend, resume and small data transfer,
//! reestablishment, and both ends of a handover.
//!
//! Handlers borrow everything outside the context through [`RrcEnv`] and
//! return a [`Step`] telling the registry what has to happen next at
//! registry level (remove the context, run a path switch, ...). A message
//! the current state does not accept yields
//! [`RrcError::ProtocolViolation`] and leaves the context untouched.

use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;

use bytes::Bytes;
use tracing::{debug, info, warn};

use nextgsim_common::{
    log_rrc_message, log_x2_message, CellConfig, CellId, Direction, GnbConfig, RrcConfig, Rnti,
    SimTime, Teid, TimerHandle,
};
use nextgsim_rrc::ies::PhysicalConfigDedicated;
use nextgsim_rrc::procedures::{
    MeasConfig, MeasIdToAddMod, MeasObject, MobilityControlInfo, ReportConfig,
    RrcConnectionRequest, RrcReconfiguration, RrcReconfigurationComplete, RrcReestablishment,
    RrcReestablishmentComplete, RrcReestablishmentReject, RrcReestablishmentRequest, RrcReject,
    RrcRelease, RrcResume, RrcResumeComplete, RrcResumeRequest, RrcSetup, RrcSetupComplete,
    SuspendConfig, TimeToTrigger, T304,
};
use nextgsim_rrc::{encode_rrc, DlCcchMessage, DlDcchMessage, RrcChannel};

use super::bearer::{BearerManager, BearerQos, PdcpStatus};
use super::connection::TransactionCounter;
use super::error::RrcError;
use super::redcap::{antenna_transmission_mode, build_suspend_config, release_state};
use super::sap::{AdmissionRequest, CoreNetworkEvent, ReleaseCause, RrcEnv};
use super::state::{InitialState, RrcState};
use super::timer::{TimerKind, TimerSet};
use super::x2::{UeDataForward, X2Message};

/// What the registry has to do once a context handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing beyond the context
    Continue,
    /// Destroy the context
    Remove(ReleaseCause),
    /// The UE arrived at a handover target; switch the downlink path
    PathSwitch,
    /// The UE never arrived at this handover target
    HandoverJoiningTimeout,
    /// The handover source was never released
    HandoverLeavingTimeout,
    /// Hand downlink data to a handover target context of the same registry
    ForwardLocal {
        target_rnti: Rnti,
        drb_id: u8,
        data: Bytes,
    },
}

/// The other end of a handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverPeer {
    pub cell_id: CellId,
    /// RNTI at the peer, once known
    pub rnti: Option<Rnti>,
}

/// RRC context of one UE.
#[derive(Debug)]
pub struct UeContext {
    rnti: Rnti,
    cell_id: CellId,
    /// Subscriber key reported to the core network
    imsi: Option<u64>,
    state: RrcState,
    transactions: TransactionCounter,
    bearers: BearerManager,
    timers: TimerSet,
    /// A reconfiguration was requested while busy
    pending_reconfiguration: bool,
    /// DRBs configured by the reconfiguration in flight
    starting: Vec<u8>,
    /// Downlink data held until the bearers are usable
    pending_data: VecDeque<(u8, Bytes)>,
    reduced_capability: bool,
    srs_config_index: u16,
    /// Suspend configuration while RRC_INACTIVE
    suspend_config: Option<SuspendConfig>,
    handover_source: Option<HandoverPeer>,
    handover_target: Option<HandoverPeer>,
    /// Forwarding tunnels granted by a remote handover target, per DRB
    forwarding_teids: BTreeMap<u8, Teid>,
    /// The core network knows this UE
    core_registered: bool,
    /// Neighbour fulfilling the A3 condition, and since when
    a3_candidate: Option<(CellId, SimTime)>,
}

impl UeContext {
    /// Creates a context in one of the two creation states.
    pub fn new(
        rnti: Rnti,
        cell_id: CellId,
        initial: InitialState,
        srs_config_index: u16,
        config: &RrcConfig,
    ) -> Self {
        Self {
            rnti,
            cell_id,
            imsi: None,
            state: initial.into(),
            transactions: TransactionCounter::new(),
            bearers: BearerManager::new(config.rlc_mode_policy, false),
            timers: TimerSet::new(),
            pending_reconfiguration: false,
            starting: Vec::new(),
            pending_data: VecDeque::new(),
            reduced_capability: false,
            srs_config_index,
            suspend_config: None,
            handover_source: None,
            handover_target: None,
            forwarding_teids: BTreeMap::new(),
            core_registered: false,
            a3_candidate: None,
        }
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn cell_id(&self) -> CellId {
        self.cell_id
    }

    pub fn imsi(&self) -> Option<u64> {
        self.imsi
    }

    pub fn state(&self) -> RrcState {
        self.state
    }

    pub fn bearers(&self) -> &BearerManager {
        &self.bearers
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn pending_reconfiguration(&self) -> bool {
        self.pending_reconfiguration
    }

    /// Downlink PDUs waiting for the bearers
    pub fn pending_data_len(&self) -> usize {
        self.pending_data.len()
    }

    pub fn reduced_capability(&self) -> bool {
        self.reduced_capability
    }

    pub fn srs_config_index(&self) -> u16 {
        self.srs_config_index
    }

    pub fn suspend_config(&self) -> Option<&SuspendConfig> {
        self.suspend_config.as_ref()
    }

    pub fn handover_source(&self) -> Option<HandoverPeer> {
        self.handover_source
    }

    pub fn handover_target(&self) -> Option<HandoverPeer> {
        self.handover_target
    }

    pub fn core_registered(&self) -> bool {
        self.core_registered
    }

    pub fn is_random_access_completed(&self) -> bool {
        self.state.is_random_access_completed()
    }

    /// Last transaction identifier issued
    pub fn last_transaction_id(&self) -> u8 {
        self.transactions.last()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn violation(&self, event: &'static str) -> RrcError {
        RrcError::ProtocolViolation {
            rnti: self.rnti,
            state: self.state,
            event,
        }
    }

    fn expect_state(&self, accepted: &[RrcState], event: &'static str) -> Result<(), RrcError> {
        if accepted.contains(&self.state) {
            Ok(())
        } else {
            Err(self.violation(event))
        }
    }

    fn switch_state(&mut self, next: RrcState) -> Result<(), RrcError> {
        if next == self.state {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(self.violation("StateTransition"));
        }
        info!("UE[{}] {} -> {}", self.rnti, self.state, next);
        self.state = next;
        Ok(())
    }

    fn arm(&mut self, env: &mut RrcEnv<'_>, kind: TimerKind) {
        let delay = kind.duration(&env.config.rrc.timers);
        self.timers.arm(env.scheduler, self.rnti, kind, delay);
    }

    fn check_transaction(&self, event: &str, transaction_id: u8) {
        if transaction_id != self.transactions.last() {
            warn!(
                "UE[{}] {} carries transaction id {}, expected {}",
                self.rnti,
                event,
                transaction_id,
                self.transactions.last()
            );
        }
    }

    fn send_encoded(&self, env: &mut RrcEnv<'_>, channel: RrcChannel, name: &str, bytes: Vec<u8>) {
        log_rrc_message(Direction::Tx, self.rnti.value(), &channel.to_string(), name, &bytes);
        env.radio.send_rrc(self.rnti, channel, Bytes::from(bytes));
    }

    fn send_ccch(&self, env: &mut RrcEnv<'_>, msg: DlCcchMessage) -> Result<(), RrcError> {
        let bytes = encode_rrc(&msg)?;
        self.send_encoded(env, RrcChannel::DlCcch, msg.name(), bytes);
        Ok(())
    }

    fn send_dcch(&self, env: &mut RrcEnv<'_>, msg: DlDcchMessage) -> Result<(), RrcError> {
        let bytes = encode_rrc(&msg)?;
        self.send_encoded(env, RrcChannel::DlDcch, msg.name(), bytes);
        Ok(())
    }

    fn physical_config(&self) -> PhysicalConfigDedicated {
        PhysicalConfigDedicated {
            srs_config_index: self.srs_config_index,
            antenna_transmission_mode: antenna_transmission_mode(self.reduced_capability),
        }
    }

    /// Event A3 measurement setup, present while automatic handover is on.
    fn meas_config(&self, config: &GnbConfig) -> Option<MeasConfig> {
        let handover = &config.rrc.handover;
        if !handover.automatic {
            return None;
        }
        let cell = config.cell(self.cell_id)?;
        Some(MeasConfig {
            meas_objects: vec![MeasObject {
                meas_object_id: 1,
                carrier_freq: cell.arfcn,
            }],
            report_configs: vec![ReportConfig {
                report_config_id: 1,
                a3_offset: handover.a3_offset_db.clamp(-30, 30) as i8,
                hysteresis: handover.hysteresis_db.clamp(0, 30) as u8,
                time_to_trigger: TimeToTrigger::from_millis(handover.time_to_trigger_ms),
            }],
            meas_ids: vec![MeasIdToAddMod {
                meas_id: 1,
                meas_object_id: 1,
                report_config_id: 1,
            }],
        })
    }

    fn admission_request(&self, env: &RrcEnv<'_>) -> AdmissionRequest {
        AdmissionRequest {
            rnti: self.rnti,
            cell_id: self.cell_id,
            reduced_capability: self.reduced_capability,
            connected_ues: env.connected_ues,
        }
    }

    fn flush_pending_data(&mut self, env: &mut RrcEnv<'_>) {
        if !self.pending_data.is_empty() {
            debug!("UE[{}] flushing {} buffered PDUs", self.rnti, self.pending_data.len());
        }
        while let Some((drb_id, data)) = self.pending_data.pop_front() {
            if self.bearers.has_drb(drb_id) {
                env.data_path.send_pdu(self.rnti, drb_id, data);
            } else {
                warn!("UE[{}] DRB {} gone, buffered PDU dropped", self.rnti, drb_id);
            }
        }
    }

    fn start_bearers(&mut self, env: &mut RrcEnv<'_>) {
        for drb_id in std::mem::take(&mut self.starting) {
            if self.bearers.has_drb(drb_id) {
                debug!("UE[{}] starting DRB {}", self.rnti, drb_id);
                env.data_path.start_bearer(self.rnti, drb_id);
            }
        }
    }

    fn page(&mut self, env: &mut RrcEnv<'_>) -> Result<(), RrcError> {
        debug!("UE[{}] paging", self.rnti);
        env.radio.page(self.rnti);
        self.switch_state(RrcState::InactiveConnecting)
    }

    /// Moves to `ConnectedNormally`: flushes buffered data, arms the
    /// inactivity timer and sends a deferred reconfiguration.
    fn enter_connected(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.switch_state(RrcState::ConnectedNormally)?;
        self.flush_pending_data(env);
        self.arm(env, TimerKind::DataInactivity);
        if self.pending_reconfiguration {
            self.send_reconfiguration(env)?;
        }
        Ok(Step::Continue)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Attaches the signalling bearers and arms the creation-state timer.
    pub fn start(&mut self, env: &mut RrcEnv<'_>) {
        env.data_path.attach_bearer(self.rnti, self.bearers.srb0());
        env.data_path.attach_bearer(self.rnti, self.bearers.srb1());
        let kind = if self.state == RrcState::HandoverJoining {
            TimerKind::HandoverJoining
        } else {
            TimerKind::ConnectionRequest
        };
        self.arm(env, kind);
    }

    // ------------------------------------------------------------------
    // Connection establishment
    // ------------------------------------------------------------------

    pub fn on_connection_request(
        &mut self,
        env: &mut RrcEnv<'_>,
        request: &RrcConnectionRequest,
    ) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::InitialRandomAccess], "RRCConnectionRequest")?;

        self.imsi = Some(request.ue_identity.to_imsi());
        if request.reduced_capability {
            debug!("UE[{}] is RedCap", self.rnti);
        }
        self.reduced_capability = request.reduced_capability;
        self.bearers.set_reduced_capability(request.reduced_capability);
        self.timers.cancel(env.scheduler, TimerKind::ConnectionRequest);

        let admission = self.admission_request(env);
        if !env.admission.admit_connection(&admission) {
            self.send_reject(env)?;
            return Err(RrcError::AdmissionDenied {
                rnti: self.rnti,
                procedure: "RRCConnectionRequest",
            });
        }

        let setup = RrcSetup {
            rrc_transaction_id: self.transactions.next_tid(),
            radio_bearer_config: self.bearers.radio_bearer_config(true),
            physical_config_dedicated: self.physical_config(),
        };
        self.send_ccch(env, DlCcchMessage::RrcSetup(setup))?;
        self.arm(env, TimerKind::ConnectionSetup);
        self.switch_state(RrcState::ConnectionSetup)?;
        Ok(Step::Continue)
    }

    /// Sends RRC Reject and waits out the rejected timer.
    pub fn send_reject(&mut self, env: &mut RrcEnv<'_>) -> Result<(), RrcError> {
        let reject = RrcReject {
            wait_time: env.config.rrc.reject_wait_time_s,
        };
        self.send_ccch(env, DlCcchMessage::RrcReject(reject))?;
        self.timers.cancel_all(env.scheduler);
        self.arm(env, TimerKind::ConnectionRejected);
        self.switch_state(RrcState::ConnectionRejected)
    }

    pub fn on_setup_complete(
        &mut self,
        env: &mut RrcEnv<'_>,
        msg: &RrcSetupComplete,
    ) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::ConnectionSetup], "RRCSetupComplete")?;
        self.check_transaction("RRCSetupComplete", msg.rrc_transaction_id);
        self.timers.cancel(env.scheduler, TimerKind::ConnectionSetup);

        if env.has_core() {
            env.notify_core(CoreNetworkEvent::InitialUeMessage {
                rnti: self.rnti,
                cell_id: self.cell_id,
                imsi: self.imsi.unwrap_or_default(),
                nas_pdu: msg.dedicated_nas_message.clone(),
            });
            self.core_registered = true;
            self.switch_state(RrcState::AttachRequest)?;
            Ok(Step::Continue)
        } else {
            self.enter_connected(env)
        }
    }

    /// The core network accepted the UE.
    pub fn on_initial_context_setup(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::AttachRequest], "InitialContextSetupRequest")?;
        self.enter_connected(env)
    }

    // ------------------------------------------------------------------
    // Reconfiguration
    // ------------------------------------------------------------------

    /// Adds a DRB and asks for the reconfiguration that configures it.
    pub fn add_data_bearer(
        &mut self,
        env: &mut RrcEnv<'_>,
        qos: BearerQos,
        teid: Option<Teid>,
        transport_address: Option<IpAddr>,
    ) -> Result<u8, RrcError> {
        if !(self.state.defers_reconfiguration() || self.state == RrcState::ConnectedNormally) {
            return Err(self.violation("DataRadioBearerSetup"));
        }
        let drb_id = self.bearers.add_data_bearer(qos, teid, transport_address)?;
        if let Some(record) = self.bearers.drb(drb_id) {
            env.data_path.attach_bearer(self.rnti, record);
        }
        info!("UE[{}] DRB {} added ({:?})", self.rnti, drb_id, qos.class);
        self.request_reconfiguration(env)?;
        Ok(drb_id)
    }

    /// Releases a DRB and asks for the reconfiguration that removes it.
    pub fn release_data_bearer(&mut self, env: &mut RrcEnv<'_>, drb_id: u8) -> Result<Step, RrcError> {
        let record = self
            .bearers
            .release_data_bearer(drb_id)
            .ok_or(RrcError::UnknownBearer { rnti: self.rnti, drb_id })?;
        env.data_path.detach_bearer(self.rnti, &record);
        self.pending_data.retain(|(id, _)| *id != drb_id);
        info!("UE[{}] DRB {} released", self.rnti, drb_id);
        self.request_reconfiguration(env)
    }

    /// Sends a reconfiguration now, or defers it while a procedure is
    /// running.
    pub fn request_reconfiguration(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        match self.state {
            state if state.defers_reconfiguration() => {
                debug!("UE[{}] reconfiguration deferred in {}", self.rnti, state);
                self.pending_reconfiguration = true;
                Ok(Step::Continue)
            }
            RrcState::ConnectedNormally => {
                self.send_reconfiguration(env)?;
                Ok(Step::Continue)
            }
            _ => Err(self.violation("ReconfigurationRequest")),
        }
    }

    fn send_reconfiguration(&mut self, env: &mut RrcEnv<'_>) -> Result<(), RrcError> {
        let msg = RrcReconfiguration {
            rrc_transaction_id: self.transactions.next_tid(),
            meas_config: self.meas_config(env.config),
            mobility_control_info: None,
            radio_bearer_config: Some(self.bearers.reconfiguration_bearer_config()),
            physical_config_dedicated: Some(self.physical_config()),
        };
        self.send_dcch(env, DlDcchMessage::RrcReconfiguration(msg))?;
        self.starting.extend(self.bearers.take_to_be_started());
        self.pending_reconfiguration = false;
        self.switch_state(RrcState::ConnectionReconfiguration)
    }

    pub fn on_reconfiguration_complete(
        &mut self,
        env: &mut RrcEnv<'_>,
        msg: &RrcReconfigurationComplete,
    ) -> Result<Step, RrcError> {
        match self.state {
            RrcState::ConnectionReconfiguration => {
                self.check_transaction("RRCReconfigurationComplete", msg.rrc_transaction_id);
                self.start_bearers(env);
                self.enter_connected(env)
            }
            RrcState::HandoverJoining => {
                self.check_transaction("RRCReconfigurationComplete", msg.rrc_transaction_id);
                self.timers.cancel(env.scheduler, TimerKind::HandoverJoining);
                self.start_bearers(env);
                self.switch_state(RrcState::HandoverPathSwitch)?;
                Ok(Step::PathSwitch)
            }
            _ => Err(self.violation("RRCReconfigurationComplete")),
        }
    }

    // ------------------------------------------------------------------
    // Release, suspend and resume
    // ------------------------------------------------------------------

    /// Release procedure. RedCap UEs are suspended to `Inactive` with the
    /// context kept; every other UE goes to `Idle` and the context is
    /// destroyed.
    pub fn release(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        if !self.state.is_active() {
            return Err(self.violation("RRCRelease"));
        }
        self.timers.cancel_all(env.scheduler);
        self.pending_reconfiguration = false;
        self.a3_candidate = None;
        self.handover_target = None;

        let next = if self.state.can_transition_to(RrcState::Inactive) {
            release_state(self.reduced_capability)
        } else {
            RrcState::Idle
        };
        let suspend_config = (next == RrcState::Inactive)
            .then(|| build_suspend_config(self.rnti, self.bearers.first_drb()));
        let release = RrcRelease {
            rrc_transaction_id: self.transactions.next_tid(),
            suspend_config: suspend_config.clone(),
        };
        self.send_dcch(env, DlDcchMessage::RrcRelease(release))?;
        self.switch_state(next)?;

        if suspend_config.is_some() {
            self.suspend_config = suspend_config;
            Ok(Step::Continue)
        } else {
            Ok(Step::Remove(ReleaseCause::Normal))
        }
    }

    pub fn on_resume_request(
        &mut self,
        env: &mut RrcEnv<'_>,
        request: &RrcResumeRequest,
    ) -> Result<Step, RrcError> {
        self.expect_state(
            &[RrcState::Inactive, RrcState::InactiveConnecting],
            "RRCResumeRequest",
        )?;
        debug!("UE[{}] resume requested ({:?})", self.rnti, request.resume_cause);
        self.switch_state(RrcState::InactiveConnecting)?;

        if env.config.rrc.sdt_enabled && request.has_sdt_payload() {
            return self.small_data_transfer(env, request);
        }

        let admission = self.admission_request(env);
        if !env.admission.admit_connection(&admission) {
            self.send_reject(env)?;
            return Err(RrcError::AdmissionDenied {
                rnti: self.rnti,
                procedure: "RRCResumeRequest",
            });
        }

        let resume = RrcResume {
            rrc_transaction_id: self.transactions.next_tid(),
            radio_bearer_config: Some(self.bearers.radio_bearer_config(true)),
        };
        self.send_dcch(env, DlDcchMessage::RrcResume(resume))?;
        Ok(Step::Continue)
    }

    fn small_data_transfer(
        &mut self,
        env: &mut RrcEnv<'_>,
        request: &RrcResumeRequest,
    ) -> Result<Step, RrcError> {
        self.switch_state(RrcState::SmallDataTransfer)?;

        let sdt_drb = self
            .suspend_config
            .as_ref()
            .and_then(|config| config.sdt_config.as_ref())
            .and_then(|sdt| sdt.sdt_drb_list.first().copied())
            .filter(|drb_id| self.bearers.has_drb(*drb_id))
            .or_else(|| self.bearers.first_drb());
        match sdt_drb {
            Some(drb_id) => {
                for payload in &request.sdt_payload {
                    env.data_path.forward_up(self.rnti, drb_id, Bytes::copy_from_slice(payload));
                }
                debug!(
                    "UE[{}] {} small data payloads on DRB {}",
                    self.rnti,
                    request.sdt_payload.len(),
                    drb_id
                );
            }
            None => warn!(
                "UE[{}] small data without a data bearer, {} payloads dropped",
                self.rnti,
                request.sdt_payload.len()
            ),
        }

        let suspend_config = self
            .suspend_config
            .clone()
            .unwrap_or_else(|| build_suspend_config(self.rnti, self.bearers.first_drb()));
        let release = RrcRelease {
            rrc_transaction_id: self.transactions.next_tid(),
            suspend_config: Some(suspend_config.clone()),
        };
        self.send_dcch(env, DlDcchMessage::RrcRelease(release))?;
        self.suspend_config = Some(suspend_config);
        self.switch_state(RrcState::Inactive)?;

        if !self.pending_data.is_empty() {
            self.page(env)?;
        }
        Ok(Step::Continue)
    }

    pub fn on_resume_complete(
        &mut self,
        env: &mut RrcEnv<'_>,
        msg: &RrcResumeComplete,
    ) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::InactiveConnecting], "RRCResumeComplete")?;
        self.check_transaction("RRCResumeComplete", msg.rrc_transaction_id);
        self.suspend_config = None;
        self.enter_connected(env)
    }

    // ------------------------------------------------------------------
    // Reestablishment
    // ------------------------------------------------------------------

    pub fn on_reestablishment_request(
        &mut self,
        env: &mut RrcEnv<'_>,
        request: &RrcReestablishmentRequest,
    ) -> Result<Step, RrcError> {
        match self.state {
            RrcState::ConnectedNormally => {}
            RrcState::HandoverLeaving => {
                self.timers.cancel(env.scheduler, TimerKind::HandoverLeaving);
                self.handover_target = None;
                self.forwarding_teids.clear();
            }
            _ => return Err(self.violation("RRCReestablishmentRequest")),
        }
        debug!(
            "UE[{}] reestablishment requested ({:?})",
            self.rnti, request.reestablishment_cause
        );

        let reestablishment = RrcReestablishment {
            rrc_transaction_id: self.transactions.next_tid(),
            radio_bearer_config: self.bearers.radio_bearer_config(true),
        };
        self.send_ccch(env, DlCcchMessage::RrcReestablishment(reestablishment))?;
        self.switch_state(RrcState::ConnectionReestablishment)?;
        Ok(Step::Continue)
    }

    /// Answers a reestablishment request that names no usable context.
    pub fn reject_reestablishment(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.send_ccch(
            env,
            DlCcchMessage::RrcReestablishmentReject(RrcReestablishmentReject),
        )?;
        Ok(Step::Remove(ReleaseCause::ReestablishmentRejected))
    }

    pub fn on_reestablishment_complete(
        &mut self,
        env: &mut RrcEnv<'_>,
        msg: &RrcReestablishmentComplete,
    ) -> Result<Step, RrcError> {
        self.expect_state(
            &[RrcState::ConnectionReestablishment],
            "RRCReestablishmentComplete",
        )?;
        self.check_transaction("RRCReestablishmentComplete", msg.rrc_transaction_id);
        self.enter_connected(env)
    }

    // ------------------------------------------------------------------
    // Data and timers
    // ------------------------------------------------------------------

    /// Downlink data for one of the UE's DRBs.
    pub fn on_data_arrival(
        &mut self,
        env: &mut RrcEnv<'_>,
        drb_id: u8,
        data: Bytes,
    ) -> Result<Step, RrcError> {
        if !self.bearers.has_drb(drb_id) {
            return Err(RrcError::UnknownBearer { rnti: self.rnti, drb_id });
        }
        match self.state {
            RrcState::HandoverLeaving => Ok(self.forward_to_target(env, drb_id, data)),
            RrcState::Inactive => {
                self.pending_data.push_back((drb_id, data));
                self.page(env)?;
                Ok(Step::Continue)
            }
            state if state.buffers_data() => {
                self.pending_data.push_back((drb_id, data));
                Ok(Step::Continue)
            }
            state if state.forwards_data() => {
                env.data_path.send_pdu(self.rnti, drb_id, data);
                if self.timers.is_armed(TimerKind::DataInactivity) {
                    self.arm(env, TimerKind::DataInactivity);
                }
                Ok(Step::Continue)
            }
            _ => Err(self.violation("DataArrival")),
        }
    }

    fn forward_to_target(&mut self, env: &mut RrcEnv<'_>, drb_id: u8, data: Bytes) -> Step {
        let Some(target) = self.handover_target else {
            warn!("UE[{}] leaving without a target, PDU dropped", self.rnti);
            return Step::Continue;
        };
        if env.config.has_cell(target.cell_id) {
            if let Some(target_rnti) = target.rnti {
                return Step::ForwardLocal {
                    target_rnti,
                    drb_id,
                    data,
                };
            }
        }
        match self.forwarding_teids.get(&drb_id) {
            Some(&teid) => {
                log_x2_message(Direction::Tx, self.cell_id, target.cell_id, "UeDataForward");
                env.x2.send(X2Message::UeDataForward(UeDataForward {
                    source_cell: self.cell_id,
                    target_cell: target.cell_id,
                    teid,
                    data,
                }));
            }
            None => debug!("UE[{}] no forwarding tunnel for DRB {}, PDU dropped", self.rnti, drb_id),
        }
        Step::Continue
    }

    /// A timer of this context fired. Firings of handles that were since
    /// cancelled or re-armed are dropped.
    pub fn on_timer(
        &mut self,
        env: &mut RrcEnv<'_>,
        kind: TimerKind,
        handle: TimerHandle,
    ) -> Result<Step, RrcError> {
        if !self.timers.take_fired(kind, handle) {
            debug!("UE[{}] stale {} timer {} dropped", self.rnti, kind, handle);
            return Ok(Step::Continue);
        }
        match kind {
            TimerKind::ConnectionRequest | TimerKind::ConnectionSetup | TimerKind::ConnectionRejected => {
                warn!("UE[{}] {} timer expired in {}", self.rnti, kind, self.state);
                Ok(Step::Remove(ReleaseCause::Timeout(kind)))
            }
            TimerKind::HandoverJoining => Ok(Step::HandoverJoiningTimeout),
            TimerKind::HandoverLeaving => Ok(Step::HandoverLeavingTimeout),
            TimerKind::DataInactivity => {
                if self.state == RrcState::ConnectedNormally {
                    info!("UE[{}] data inactivity, releasing", self.rnti);
                    self.release(env)
                } else {
                    debug!("UE[{}] inactivity timer in {}, re-armed", self.rnti, self.state);
                    self.arm(env, TimerKind::DataInactivity);
                    Ok(Step::Continue)
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Handover, source side
    // ------------------------------------------------------------------

    /// Inter-gNB handover: waits for the target's answer.
    pub fn begin_handover_preparation(&mut self, target_cell: CellId) -> Result<(), RrcError> {
        self.expect_state(&[RrcState::ConnectedNormally], "HandoverRequest")?;
        self.switch_state(RrcState::HandoverPreparation)?;
        self.handover_target = Some(HandoverPeer {
            cell_id: target_cell,
            rnti: None,
        });
        Ok(())
    }

    /// Sends the target's handover command to the UE and starts leaving.
    pub fn send_handover_command(
        &mut self,
        env: &mut RrcEnv<'_>,
        target: HandoverPeer,
        command: Vec<u8>,
    ) -> Result<(), RrcError> {
        self.expect_state(
            &[RrcState::ConnectedNormally, RrcState::HandoverPreparation],
            "HandoverCommand",
        )?;
        self.send_encoded(env, RrcChannel::DlDcch, "RRCReconfiguration", command);
        self.timers.cancel(env.scheduler, TimerKind::DataInactivity);
        self.arm(env, TimerKind::HandoverLeaving);
        self.handover_target = Some(target);
        self.a3_candidate = None;
        self.switch_state(RrcState::HandoverLeaving)
    }

    /// Records the forwarding tunnels a remote target admitted.
    pub fn set_forwarding_teids(&mut self, teids: impl IntoIterator<Item = (u8, Teid)>) {
        self.forwarding_teids = teids.into_iter().collect();
    }

    pub fn forwarding_teid(&self, drb_id: u8) -> Option<Teid> {
        self.forwarding_teids.get(&drb_id).copied()
    }

    /// The target could not take the UE.
    pub fn on_preparation_failure(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        match self.state {
            RrcState::HandoverPreparation => {
                self.handover_target = None;
                self.switch_state(RrcState::ConnectedNormally)?;
                if self.pending_reconfiguration {
                    self.send_reconfiguration(env)?;
                }
                Ok(Step::Continue)
            }
            RrcState::HandoverLeaving => {
                self.timers.cancel_all(env.scheduler);
                let release = RrcRelease {
                    rrc_transaction_id: self.transactions.next_tid(),
                    suspend_config: None,
                };
                self.send_dcch(env, DlDcchMessage::RrcRelease(release))?;
                self.switch_state(RrcState::Idle)?;
                Ok(Step::Remove(ReleaseCause::HandoverFailed))
            }
            _ => Err(self.violation("HandoverPreparationFailure")),
        }
    }

    /// The target finished the path switch and releases this side.
    pub fn on_ue_context_release(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::HandoverLeaving], "UeContextRelease")?;
        self.timers.cancel_all(env.scheduler);
        Ok(Step::Remove(ReleaseCause::HandoverCompleted))
    }

    /// PDCP SN state of the AM DRBs, for an SN status transfer.
    pub fn pdcp_statuses(&self, env: &RrcEnv<'_>) -> Vec<(u8, PdcpStatus)> {
        self.bearers
            .am_drbs()
            .filter_map(|record| record.drb_id())
            .map(|drb_id| (drb_id, env.data_path.pdcp_status(self.rnti, drb_id)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Handover, target side
    // ------------------------------------------------------------------

    /// Records where the UE comes from and what the source knew about it.
    pub fn set_handover_source(
        &mut self,
        source: HandoverPeer,
        imsi: Option<u64>,
        reduced_capability: bool,
    ) {
        self.handover_source = Some(source);
        self.imsi = imsi;
        self.reduced_capability = reduced_capability;
        self.bearers.set_reduced_capability(reduced_capability);
    }

    /// Sets up a DRB with the identity it had at the source.
    pub fn replicate_bearer(
        &mut self,
        env: &mut RrcEnv<'_>,
        drb_id: u8,
        qos: BearerQos,
        teid: Option<Teid>,
        transport_address: Option<IpAddr>,
    ) -> Result<(), RrcError> {
        self.expect_state(&[RrcState::HandoverJoining], "HandoverRequest")?;
        self.bearers
            .add_data_bearer_with_id(drb_id, qos, teid, transport_address)?;
        if let Some(record) = self.bearers.drb(drb_id) {
            env.data_path.attach_bearer(self.rnti, record);
        }
        Ok(())
    }

    /// Builds the handover command the UE must receive at the source.
    pub fn build_handover_command(&mut self, cell: &CellConfig) -> RrcReconfiguration {
        self.starting.extend(self.bearers.take_to_be_started());
        RrcReconfiguration {
            rrc_transaction_id: self.transactions.next_tid(),
            meas_config: None,
            mobility_control_info: Some(MobilityControlInfo {
                target_physical_cell_id: cell.pci,
                carrier_freq: Some(cell.arfcn),
                new_ue_identity: self.rnti.value(),
                t304: T304::Ms1000,
                rach_config_dedicated: None,
            }),
            radio_bearer_config: Some(self.bearers.radio_bearer_config(true)),
            physical_config_dedicated: Some(self.physical_config()),
        }
    }

    /// Installs the PDCP SNs received from the source.
    pub fn apply_pdcp_status(
        &mut self,
        env: &mut RrcEnv<'_>,
        drb_id: u8,
        status: PdcpStatus,
    ) -> Result<(), RrcError> {
        let record = self
            .bearers
            .drb_mut(drb_id)
            .ok_or(RrcError::UnknownBearer { rnti: self.rnti, drb_id })?;
        record.pdcp_status = Some(status);
        env.data_path.set_pdcp_status(self.rnti, drb_id, status);
        Ok(())
    }

    /// The core acknowledged the new downlink path, or there is no core.
    pub fn on_path_switch_complete(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::HandoverPathSwitch], "PathSwitchRequestAck")?;
        self.handover_source = None;
        self.enter_connected(env)
    }

    pub fn mark_core_registered(&mut self) {
        self.core_registered = true;
    }

    /// The source gave up on this handover.
    pub fn on_handover_cancel(&mut self, env: &mut RrcEnv<'_>) -> Result<Step, RrcError> {
        self.expect_state(&[RrcState::HandoverJoining], "HandoverCancel")?;
        self.timers.cancel_all(env.scheduler);
        Ok(Step::Remove(ReleaseCause::HandoverCancelled))
    }

    // ------------------------------------------------------------------
    // Measurement-triggered handover
    // ------------------------------------------------------------------

    pub fn a3_candidate(&self) -> Option<(CellId, SimTime)> {
        self.a3_candidate
    }

    pub fn set_a3_candidate(&mut self, candidate: Option<(CellId, SimTime)>) {
        self.a3_candidate = candidate;
    }

    /// Cancels all timers, for removal.
    pub fn cancel_timers(&mut self, env: &mut RrcEnv<'_>) {
        self.timers.cancel_all(env.scheduler);
    }
}
