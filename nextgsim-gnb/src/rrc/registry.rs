//! RRC Registry
//!
//! The registry owns every UE context of one gNB, keyed by RNTI. It
//! allocates RNTIs and SRS indices, routes inbound RRC, core network and X2
//! messages to the right context, dispatches scheduler firings, and runs
//! the periodic system information broadcast.
//!
//! Every public entry point runs one event to completion. Handlers that fail
//! with [`RrcError::ProtocolViolation`] are logged and leave the context as
//! it was; other errors are terminal at most for the context involved.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use nextgsim_common::{
    log_rrc_message, CellId, Direction, GnbConfig, Rnti, Scheduler, SimTime, Teid, TimerHandle,
    VirtualScheduler,
};
use nextgsim_rrc::procedures::{
    CellSelectionInfo, MasterInformationBlock, RachConfigCommon, Sib1, Sib2,
    SubCarrierSpacingCommon, SystemInformation, DEFAULT_SDT_DATA_VOLUME_THRESHOLD,
};
use nextgsim_rrc::{
    decode_rrc, encode_rrc, BcchMessage, PerCodec, RrcChannel, UlCcchMessage, UlDcchMessage,
};

use super::bearer::BearerQos;
use super::container::{ContainerArena, ContainerPayload, ContainerToken};
use super::error::{Resource, RrcError};
use super::handover;
use super::redcap::rnti_from_resume_identity;
use super::sap::{Collaborators, CoreNetworkEvent, CoreNetworkMessage, ReleaseCause, RrcEnv};
use super::srs::SrsAllocator;
use super::state::{InitialState, RrcState};
use super::timer::RrcTimer;
use super::ue_context::{Step, UeContext};
use super::x2::{CellLoad, LoadInformation, X2Message};

/// Snapshot of the registry, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Live contexts
    pub live: usize,
    /// Live contexts per state
    pub per_state: BTreeMap<RrcState, usize>,
    /// Contexts created since start
    pub created: u64,
    /// Contexts removed since start
    pub removed: u64,
    /// Handovers this gNB started as source
    pub handovers_started: u64,
    /// Handovers whose source context was released after the path switch
    pub handovers_completed: u64,
    /// Handovers that failed or were cancelled at the source
    pub handovers_failed: u64,
}

#[derive(Debug, Default)]
pub(super) struct Counters {
    pub created: u64,
    pub removed: u64,
    pub handovers_started: u64,
    pub handovers_completed: u64,
    pub handovers_failed: u64,
}

/// UE context registry of one gNB.
pub struct Registry<S: Scheduler<RrcTimer> = VirtualScheduler<RrcTimer>> {
    config: GnbConfig,
    scheduler: S,
    collab: Collaborators,
    contexts: BTreeMap<Rnti, UeContext>,
    last_rnti: Option<Rnti>,
    /// SRS index pools, per cell
    srs: HashMap<CellId, SrsAllocator>,
    pub(super) containers: ContainerArena,
    /// X2 forwarding tunnels into handover targets: TEID -> (UE, DRB)
    pub(super) forwarding: HashMap<Teid, (Rnti, u8)>,
    next_teid: Teid,
    /// Last load reported by each neighbour cell
    neighbour_load: BTreeMap<CellId, CellLoad>,
    pub(super) counters: Counters,
    si_timer: Option<TimerHandle>,
    system_frame_number: u16,
}

impl Registry<VirtualScheduler<RrcTimer>> {
    /// Creates a registry driven by a virtual-time scheduler.
    pub fn new(config: GnbConfig, collab: Collaborators) -> Self {
        Self::with_scheduler(config, VirtualScheduler::new(), collab)
    }

    /// Fires every timer due up to `until`, in time order, then moves the
    /// clock to `until`. Returns the errors raised by the firings.
    pub fn run_until(&mut self, until: SimTime) -> Vec<RrcError> {
        let mut errors = Vec::new();
        while let Some(fired) = self.scheduler.pop_due(until) {
            if let Err(err) = self.on_timer(fired.handle, fired.event) {
                errors.push(err);
            }
        }
        self.scheduler.advance_to(until);
        errors
    }

    /// Runs the clock forward by `delay`.
    pub fn advance(&mut self, delay: Duration) -> Vec<RrcError> {
        let until = self.scheduler.now().saturating_add(delay);
        self.run_until(until)
    }

    /// Due time of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<SimTime> {
        self.scheduler.next_deadline()
    }
}

impl<S: Scheduler<RrcTimer>> Registry<S> {
    pub fn with_scheduler(config: GnbConfig, scheduler: S, collab: Collaborators) -> Self {
        let containers = ContainerArena::new(config.gnb_id);
        Self {
            config,
            scheduler,
            collab,
            contexts: BTreeMap::new(),
            last_rnti: None,
            srs: HashMap::new(),
            containers,
            forwarding: HashMap::new(),
            next_teid: 1,
            neighbour_load: BTreeMap::new(),
            counters: Counters::default(),
            si_timer: None,
            system_frame_number: 0,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &GnbConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn context(&self, rnti: Rnti) -> Option<&UeContext> {
        self.contexts.get(&rnti)
    }

    /// Live contexts in RNTI order
    pub fn contexts(&self) -> impl Iterator<Item = &UeContext> {
        self.contexts.values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Returns true once the UE holds a dedicated connection.
    pub fn is_random_access_completed(&self, rnti: Rnti) -> bool {
        self.context(rnti)
            .is_some_and(|ctx| ctx.is_random_access_completed())
    }

    /// Last load reported for a neighbour cell.
    pub fn neighbour_load(&self, cell_id: CellId) -> Option<&CellLoad> {
        self.neighbour_load.get(&cell_id)
    }

    /// Container arena of this registry, for relaying ideal-mode tokens
    /// between registries.
    pub fn containers_mut(&mut self) -> &mut ContainerArena {
        &mut self.containers
    }

    /// Parks a container payload, returning its single-use token.
    pub fn store_container(&mut self, payload: ContainerPayload) -> ContainerToken {
        self.containers.store(payload)
    }

    /// Redeems a token issued by this registry.
    pub fn take_container(&mut self, token: ContainerToken) -> Result<ContainerPayload, RrcError> {
        self.containers.take(token)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut per_state = BTreeMap::new();
        for ctx in self.contexts.values() {
            *per_state.entry(ctx.state()).or_insert(0) += 1;
        }
        RegistryStats {
            live: self.contexts.len(),
            per_state,
            created: self.counters.created,
            removed: self.counters.removed,
            handovers_started: self.counters.handovers_started,
            handovers_completed: self.counters.handovers_completed,
            handovers_failed: self.counters.handovers_failed,
        }
    }

    // ------------------------------------------------------------------
    // Event plumbing
    // ------------------------------------------------------------------

    /// Contexts holding a connection, as seen by admission control.
    fn connected_ues(&self) -> usize {
        self.contexts
            .values()
            .filter(|ctx| ctx.state().is_active() || ctx.state() == RrcState::HandoverJoining)
            .count()
    }

    /// Runs `f` on one context with the collaborators borrowed for the
    /// event.
    pub(super) fn with_context<R>(
        &mut self,
        rnti: Rnti,
        f: impl FnOnce(&mut UeContext, &mut RrcEnv<'_>) -> Result<R, RrcError>,
    ) -> Result<R, RrcError> {
        let connected_ues = self.connected_ues();
        let ctx = self
            .contexts
            .get_mut(&rnti)
            .ok_or(RrcError::UnknownContext(rnti))?;
        let mut env = self.collab.env(&self.config, &mut self.scheduler, connected_ues);
        f(ctx, &mut env)
    }

    /// Runs `f` with the collaborators only.
    pub(super) fn with_env<R>(&mut self, f: impl FnOnce(&mut RrcEnv<'_>) -> R) -> R {
        let connected_ues = self.connected_ues();
        let mut env = self.collab.env(&self.config, &mut self.scheduler, connected_ues);
        f(&mut env)
    }

    /// Applies a handler result: logs violations and carries out the step
    /// the context asked for.
    pub(super) fn finish(&mut self, rnti: Rnti, result: Result<Step, RrcError>) -> Result<(), RrcError> {
        match result {
            Ok(step) => self.apply(rnti, step),
            Err(err) => {
                if err.is_protocol_violation() {
                    warn!("{}", err);
                } else {
                    debug!("UE[{}] {}", rnti, err);
                }
                Err(err)
            }
        }
    }

    fn apply(&mut self, rnti: Rnti, step: Step) -> Result<(), RrcError> {
        match step {
            Step::Continue => Ok(()),
            Step::Remove(cause) => {
                self.remove_context(rnti, cause);
                match cause {
                    ReleaseCause::Timeout(timer) => Err(RrcError::Timeout { rnti, timer }),
                    _ => Ok(()),
                }
            }
            Step::PathSwitch => handover::on_path_switch(self, rnti),
            Step::HandoverJoiningTimeout => handover::on_joining_timeout(self, rnti),
            Step::HandoverLeavingTimeout => handover::on_leaving_timeout(self, rnti),
            Step::ForwardLocal {
                target_rnti,
                drb_id,
                data,
            } => {
                debug!("UE[{}] forwarding DRB {} data to UE[{}]", rnti, drb_id, target_rnti);
                self.on_data_arrival(target_rnti, drb_id, data)
            }
        }
    }

    // ------------------------------------------------------------------
    // Context lifecycle
    // ------------------------------------------------------------------

    fn allocate_rnti(&self) -> Result<Rnti, RrcError> {
        let start = match self.last_rnti {
            Some(last) => last.next(),
            None => Rnti::new(Rnti::MIN).ok_or(RrcError::ResourceExhausted(Resource::SessionIdentifier))?,
        };
        let space = usize::from(Rnti::MAX - Rnti::MIN) + 1;
        std::iter::successors(Some(start), |rnti| Some(rnti.next()))
            .take(space)
            .find(|rnti| !self.contexts.contains_key(rnti))
            .ok_or(RrcError::ResourceExhausted(Resource::SessionIdentifier))
    }

    /// Creates a context in one of the creation states.
    ///
    /// The RNTI is chosen before the cell's SRS index, and neither is
    /// committed unless both are available. A free RNTI with no SRS index
    /// left fails with `MeasurementResource`; `SessionIdentifier` is only
    /// reported when every RNTI names a live context.
    pub(super) fn create_context(&mut self, cell_id: CellId, initial: InitialState) -> Result<Rnti, RrcError> {
        if !self.config.has_cell(cell_id) {
            return Err(RrcError::UnknownCell(cell_id));
        }
        let rnti = self.allocate_rnti()?;
        let periodicity = self.config.rrc.srs_periodicity;
        let srs_config_index = self
            .srs
            .entry(cell_id)
            .or_insert_with(|| SrsAllocator::new(periodicity))
            .allocate()?;

        let mut ctx = UeContext::new(rnti, cell_id, initial, srs_config_index, &self.config.rrc);
        self.with_env(|env| {
            ctx.start(env);
            env.radio.add_ue(rnti, cell_id);
        });
        info!(
            "UE[{}] context created in cell {} ({}, SRS index {})",
            rnti,
            cell_id,
            ctx.state(),
            srs_config_index
        );
        self.contexts.insert(rnti, ctx);
        self.last_rnti = Some(rnti);
        self.counters.created += 1;
        Ok(rnti)
    }

    /// Destroys a context: cancels its timers, tears down its bearers,
    /// returns its SRS index and tells the core network and the radio.
    pub(super) fn remove_context(&mut self, rnti: Rnti, cause: ReleaseCause) {
        let Some(mut ctx) = self.contexts.remove(&rnti) else {
            return;
        };
        let mut env = self.collab.env(&self.config, &mut self.scheduler, 0);
        ctx.cancel_timers(&mut env);
        for record in ctx.bearers().all() {
            env.data_path.detach_bearer(rnti, record);
        }
        if ctx.core_registered() && cause != ReleaseCause::HandoverCompleted {
            env.notify_core(CoreNetworkEvent::UeContextRelease {
                rnti,
                imsi: ctx.imsi(),
                cause,
            });
        }
        env.radio.remove_ue(rnti);

        self.forwarding.retain(|_, (owner, _)| *owner != rnti);
        if let Some(srs) = self.srs.get_mut(&ctx.cell_id()) {
            srs.release(ctx.srs_config_index());
        }
        self.counters.removed += 1;
        if cause == ReleaseCause::HandoverCompleted {
            self.counters.handovers_completed += 1;
        }
        info!("UE[{}] context removed in {} ({})", rnti, ctx.state(), cause);
    }

    /// Allocates an X2 forwarding tunnel delivering into `(rnti, drb_id)`.
    pub(super) fn allocate_forwarding_teid(&mut self, rnti: Rnti, drb_id: u8) -> Teid {
        let mut teid = self.next_teid;
        while teid == 0 || self.forwarding.contains_key(&teid) {
            teid = teid.wrapping_add(1);
        }
        self.next_teid = teid.wrapping_add(1);
        self.forwarding.insert(teid, (rnti, drb_id));
        teid
    }

    // ------------------------------------------------------------------
    // Radio side
    // ------------------------------------------------------------------

    /// Random access detected in `cell_id`.
    pub fn on_radio_attempt(&mut self, cell_id: CellId) -> Result<Rnti, RrcError> {
        self.create_context(cell_id, InitialState::RandomAccess)
    }

    fn decode<T: PerCodec>(rnti: Rnti, channel: RrcChannel, bytes: &[u8]) -> Result<T, RrcError> {
        decode_rrc::<T>(bytes).map_err(|err| {
            warn!("UE[{}] malformed {} message dropped: {}", rnti, channel, err);
            RrcError::from(err)
        })
    }

    /// An uplink RRC message from the UE behind `rnti`.
    pub fn on_inbound_message(&mut self, rnti: Rnti, channel: RrcChannel, bytes: &[u8]) -> Result<(), RrcError> {
        if !self.contexts.contains_key(&rnti) {
            warn!("UE[{}] {} message for unknown context", rnti, channel);
            return Err(RrcError::UnknownContext(rnti));
        }
        match channel {
            RrcChannel::UlCcch => {
                let msg: UlCcchMessage = Self::decode(rnti, channel, bytes)?;
                log_rrc_message(Direction::Rx, rnti.value(), &channel.to_string(), msg.name(), bytes);
                self.on_ul_ccch(rnti, msg)
            }
            RrcChannel::UlDcch => {
                let msg: UlDcchMessage = Self::decode(rnti, channel, bytes)?;
                log_rrc_message(Direction::Rx, rnti.value(), &channel.to_string(), msg.name(), bytes);
                self.on_ul_dcch(rnti, msg)
            }
            RrcChannel::Bcch | RrcChannel::DlCcch | RrcChannel::DlDcch => {
                warn!("UE[{}] downlink channel {} on the uplink path", rnti, channel);
                Err(RrcError::UnexpectedChannel(channel))
            }
        }
    }

    fn on_ul_ccch(&mut self, rnti: Rnti, msg: UlCcchMessage) -> Result<(), RrcError> {
        match msg {
            UlCcchMessage::RrcConnectionRequest(request) => {
                let result = self.with_context(rnti, |ctx, env| ctx.on_connection_request(env, &request));
                self.finish(rnti, result)
            }
            UlCcchMessage::RrcResumeRequest(request) => {
                let target = self.resume_target(rnti, request.resume_identity);
                match target {
                    Some(stored) => {
                        if stored != rnti {
                            debug!("UE[{}] resumes stored context UE[{}]", rnti, stored);
                            self.remove_context(rnti, ReleaseCause::Superseded);
                        }
                        let result = self.with_context(stored, |ctx, env| ctx.on_resume_request(env, &request));
                        self.finish(stored, result)
                    }
                    None => {
                        warn!(
                            "UE[{}] resume identity {} names no suspended context",
                            rnti, request.resume_identity
                        );
                        self.with_context(rnti, |ctx, env| ctx.send_reject(env))
                    }
                }
            }
            UlCcchMessage::RrcReestablishmentRequest(request) => {
                let stored = Rnti::new(request.c_rnti).filter(|stored| {
                    *stored != rnti
                        && self.contexts.get(stored).is_some_and(|ctx| {
                            matches!(
                                ctx.state(),
                                RrcState::ConnectedNormally | RrcState::HandoverLeaving
                            )
                        })
                });
                match stored {
                    Some(stored) => {
                        debug!("UE[{}] reestablishes context UE[{}]", rnti, stored);
                        self.remove_context(rnti, ReleaseCause::Superseded);
                        let result =
                            self.with_context(stored, |ctx, env| ctx.on_reestablishment_request(env, &request));
                        self.finish(stored, result)
                    }
                    None => {
                        warn!("UE[{}] reestablishment for unknown C-RNTI {}", rnti, request.c_rnti);
                        let result = self.with_context(rnti, |ctx, env| ctx.reject_reestablishment(env));
                        self.finish(rnti, result)
                    }
                }
            }
        }
    }

    /// Context a resume request is aimed at: the requesting context itself
    /// if it is suspended, otherwise the suspended context named by the
    /// resume identity.
    fn resume_target(&self, rnti: Rnti, resume_identity: u32) -> Option<Rnti> {
        let suspended = |rnti: &Rnti| {
            self.contexts.get(rnti).is_some_and(|ctx| {
                matches!(ctx.state(), RrcState::Inactive | RrcState::InactiveConnecting)
            })
        };
        if suspended(&rnti) {
            return Some(rnti);
        }
        rnti_from_resume_identity(resume_identity).filter(suspended)
    }

    fn on_ul_dcch(&mut self, rnti: Rnti, msg: UlDcchMessage) -> Result<(), RrcError> {
        let result = match msg {
            UlDcchMessage::RrcSetupComplete(complete) => {
                let state = self.context(rnti).map(UeContext::state);
                if state == Some(RrcState::ConnectionRejected) {
                    warn!("UE[{}] setup complete after reject, peer is desynchronized", rnti);
                    self.remove_context(rnti, ReleaseCause::Desynchronized);
                    return Err(RrcError::ProtocolViolation {
                        rnti,
                        state: RrcState::ConnectionRejected,
                        event: "RRCSetupComplete",
                    });
                }
                self.with_context(rnti, |ctx, env| ctx.on_setup_complete(env, &complete))
            }
            UlDcchMessage::RrcReconfigurationComplete(complete) => {
                self.with_context(rnti, |ctx, env| ctx.on_reconfiguration_complete(env, &complete))
            }
            UlDcchMessage::RrcResumeComplete(complete) => {
                self.with_context(rnti, |ctx, env| ctx.on_resume_complete(env, &complete))
            }
            UlDcchMessage::RrcReestablishmentComplete(complete) => {
                self.with_context(rnti, |ctx, env| ctx.on_reestablishment_complete(env, &complete))
            }
            UlDcchMessage::MeasurementReport(report) => {
                return handover::on_measurement_report(self, rnti, &report);
            }
        };
        self.finish(rnti, result)
    }

    /// Downlink user data for one of a UE's DRBs.
    pub fn on_data_arrival(&mut self, rnti: Rnti, drb_id: u8, data: Bytes) -> Result<(), RrcError> {
        let result = self.with_context(rnti, |ctx, env| ctx.on_data_arrival(env, drb_id, data));
        self.finish(rnti, result)
    }

    /// A scheduler firing.
    pub fn on_timer(&mut self, handle: TimerHandle, timer: RrcTimer) -> Result<(), RrcError> {
        match timer {
            RrcTimer::SystemInformation => {
                if self.si_timer == Some(handle) {
                    self.si_timer = None;
                    self.broadcast_system_information()
                } else {
                    debug!("stale system information timer {} dropped", handle);
                    Ok(())
                }
            }
            RrcTimer::Ue { rnti, kind } => {
                if !self.contexts.contains_key(&rnti) {
                    debug!("UE[{}] {} timer fired after removal", rnti, kind);
                    return Ok(());
                }
                let result = self.with_context(rnti, |ctx, env| ctx.on_timer(env, kind, handle));
                self.finish(rnti, result)
            }
        }
    }

    // ------------------------------------------------------------------
    // Triggers and core network
    // ------------------------------------------------------------------

    /// Adds a DRB to a UE and reconfigures it, now or once its current
    /// procedure is over.
    pub fn add_data_bearer(
        &mut self,
        rnti: Rnti,
        qos: BearerQos,
        teid: Option<Teid>,
        transport_address: Option<IpAddr>,
    ) -> Result<u8, RrcError> {
        let result = self.with_context(rnti, |ctx, env| ctx.add_data_bearer(env, qos, teid, transport_address));
        if let Err(err) = &result {
            if err.is_protocol_violation() {
                warn!("{}", err);
            }
        }
        result
    }

    /// Releases a DRB of a UE and reconfigures it.
    pub fn release_data_bearer(&mut self, rnti: Rnti, drb_id: u8) -> Result<(), RrcError> {
        let result = self.with_context(rnti, |ctx, env| ctx.release_data_bearer(env, drb_id));
        self.forwarding
            .retain(|_, (owner, drb)| !(*owner == rnti && *drb == drb_id));
        self.finish(rnti, result)
    }

    /// Hands a connected UE over to `target_cell`.
    pub fn trigger_handover(&mut self, rnti: Rnti, target_cell: CellId) -> Result<(), RrcError> {
        handover::prepare(self, rnti, target_cell)
    }

    /// Runs the release procedure on an active UE. A handover in progress
    /// is abandoned and its target cancelled.
    pub fn trigger_release(&mut self, rnti: Rnti) -> Result<(), RrcError> {
        handover::release_source(self, rnti)
    }

    /// A message from the core network.
    pub fn on_core_network(&mut self, msg: CoreNetworkMessage) -> Result<(), RrcError> {
        debug!("UE[{}] core network {}", msg.rnti(), msg.name());
        match msg {
            CoreNetworkMessage::InitialContextSetupRequest { rnti } => {
                let result = self.with_context(rnti, |ctx, env| ctx.on_initial_context_setup(env));
                self.finish(rnti, result)
            }
            CoreNetworkMessage::DataRadioBearerSetupRequest {
                rnti,
                qos,
                bearer_id,
                teid,
                transport_address,
            } => {
                let drb_id = self.add_data_bearer(rnti, qos, Some(teid), Some(transport_address))?;
                debug!("UE[{}] bearer {} mapped to DRB {}", rnti, bearer_id, drb_id);
                Ok(())
            }
            CoreNetworkMessage::PathSwitchRequestAck { rnti } => handover::on_path_switch_ack(self, rnti),
            CoreNetworkMessage::UeContextReleaseCommand { rnti } => self.trigger_release(rnti),
        }
    }

    /// A message from a peer gNB.
    pub fn on_x2_message(&mut self, msg: X2Message) -> Result<(), RrcError> {
        let (source, target) = msg.cells();
        nextgsim_common::log_x2_message(Direction::Rx, source, target, msg.name());
        match msg {
            X2Message::HandoverRequest(m) => handover::on_handover_request(self, m),
            X2Message::HandoverRequestAck(m) => handover::on_handover_request_ack(self, m),
            X2Message::HandoverPreparationFailure(m) => handover::on_preparation_failure(self, m),
            X2Message::HandoverCancel(m) => handover::on_handover_cancel(self, m),
            X2Message::SnStatusTransfer(m) => handover::on_sn_status_transfer(self, m),
            X2Message::UeContextRelease(m) => handover::on_ue_context_release(self, m),
            X2Message::LoadInformation(m) => {
                self.on_load_information(m);
                Ok(())
            }
            X2Message::UeDataForward(m) => match self.forwarding.get(&m.teid).copied() {
                Some((rnti, drb_id)) => self.on_data_arrival(rnti, drb_id, m.data),
                None => {
                    debug!("no forwarding tunnel {}, {} bytes dropped", m.teid, m.data.len());
                    Ok(())
                }
            },
        }
    }

    fn on_load_information(&mut self, msg: LoadInformation) {
        for load in msg.cells {
            debug!(
                "cell {} load DL {}% UL {}%",
                load.cell_id, load.dl_prb_usage, load.ul_prb_usage
            );
            self.neighbour_load.insert(load.cell_id, load);
        }
    }

    /// Reports the load of the served cells to a neighbour.
    pub fn report_load(&mut self, neighbour_cell: CellId, cells: Vec<CellLoad>) {
        let Some(source_cell) = self.config.cells.first().map(|c| c.cell_id) else {
            return;
        };
        nextgsim_common::log_x2_message(Direction::Tx, source_cell, neighbour_cell, "LoadInformation");
        self.with_env(|env| {
            env.x2.send(X2Message::LoadInformation(LoadInformation {
                source_cell,
                target_cell: neighbour_cell,
                cells,
            }))
        });
    }

    // ------------------------------------------------------------------
    // System information
    // ------------------------------------------------------------------

    /// Starts the periodic MIB/SIB broadcast. The first broadcast goes out
    /// immediately.
    pub fn start(&mut self) -> Result<(), RrcError> {
        if self.si_timer.is_some() {
            return Ok(());
        }
        info!(
            "gNB {} serving {} cell(s), broadcasting system information",
            self.config.gnb_id,
            self.config.cells.len()
        );
        self.broadcast_system_information()
    }

    fn broadcast_system_information(&mut self) -> Result<(), RrcError> {
        let period = self.config.rrc.timers.system_information_periodicity();
        let mut broadcasts = Vec::with_capacity(self.config.cells.len() * 2);
        for cell in &self.config.cells {
            let mib = BcchMessage::Mib(self.master_information_block(cell.cell_id));
            let si = BcchMessage::SystemInformation(SystemInformation {
                sib1: self.sib1(cell.cell_id),
                sib2: Some(Sib2 {
                    rach_config_common: RachConfigCommon::default(),
                    ul_carrier_freq: cell.arfcn,
                    ul_bandwidth_prbs: cell.ul_bandwidth_prbs,
                }),
            });
            broadcasts.push((cell.cell_id, encode_rrc(&mib)?));
            broadcasts.push((cell.cell_id, encode_rrc(&si)?));
        }
        self.with_env(|env| {
            for (cell_id, bytes) in broadcasts {
                env.radio.broadcast(cell_id, Bytes::from(bytes));
            }
        });

        let frames = u16::try_from(period.as_millis() / 10).unwrap_or(u16::MAX) % 1024;
        self.system_frame_number = (self.system_frame_number + frames) % 1024;
        self.si_timer = Some(
            self.scheduler
                .schedule_after(period, RrcTimer::SystemInformation),
        );
        Ok(())
    }

    pub(super) fn master_information_block(&self, cell_id: CellId) -> MasterInformationBlock {
        let dl_bandwidth_prbs = self
            .config
            .cell(cell_id)
            .map_or(100, |cell| cell.dl_bandwidth_prbs);
        MasterInformationBlock {
            system_frame_number: self.system_frame_number,
            dl_bandwidth_prbs,
            sub_carrier_spacing_common: SubCarrierSpacingCommon::Scs15Or60,
        }
    }

    pub(super) fn sib1(&self, cell_id: CellId) -> Sib1 {
        Sib1 {
            plmn: self.config.plmn,
            tracking_area_code: self.config.tac,
            cell_identity: ((u64::from(self.config.gnb_id) << 12) | u64::from(cell_id)) & 0xF_FFFF_FFFF,
            cell_barred: !self.config.rrc.admit_connection_request,
            cell_selection_info: Some(CellSelectionInfo { q_rx_lev_min: -70 }),
            sdt_data_volume_threshold: self
                .config
                .rrc
                .sdt_enabled
                .then_some(DEFAULT_SDT_DATA_VOLUME_THRESHOLD),
        }
    }
}
