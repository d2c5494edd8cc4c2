//! Handover Handling for gNB
//!
//! Coordinates both ends of a handover on top of the [`Registry`].
//!
//! # Handover Types
//!
//! ## Intra-gNB Handover
//! - Source and target cells are both served by this gNB
//! - The target context is created directly, no X2 signalling
//! - PDCP SN state is copied from source to target bearers
//!
//! ## Inter-gNB Handover (X2-based)
//! - The target cell is a configured neighbour of another gNB
//! - Preparation information and the handover command travel in RRC
//!   containers, bit-packed or as arena tokens depending on the protocol
//!   mode
//! - The source forwards downlink data through tunnels the target grants
//!
//! # Handover Procedure
//!
//! 1. Source gets a trigger or an A3 measurement report held for
//!    time-to-trigger
//! 2. Target admits the UE, creates a `HandoverJoining` context and builds
//!    the handover command
//! 3. Source sends the command to the UE and enters `HandoverLeaving`
//! 4. UE completes the reconfiguration at the target
//! 5. Target switches the downlink path at the core network (if any)
//! 6. Target releases the source context

use std::time::Duration;

use tracing::{debug, info, warn};

use nextgsim_common::{log_x2_message, CellId, Direction, GnbConfig, Rnti, Scheduler, Teid};
use nextgsim_rrc::procedures::{encode_handover_command, HandoverPreparationInfo, MeasurementReport};

use super::bearer::BearerQos;
use super::container::{relay_container, ContainerPayload, RrcContainer};
use super::error::RrcError;
use super::registry::Registry;
use super::sap::{AdmissionRequest, CoreNetworkEvent, PathSwitchBearer, ReleaseCause};
use super::state::{InitialState, RrcState};
use super::timer::{RrcTimer, TimerKind};
use super::ue_context::HandoverPeer;
use super::x2::{
    HandoverCancel, HandoverPreparationFailure, HandoverRequest, HandoverRequestAck,
    SnStatusItem, SnStatusTransfer, UeContextRelease, X2AdmittedBearer, X2BearerToSetup, X2Cause,
    X2Message,
};

/// DRB carried over to a handover target.
#[derive(Debug, Clone, Copy)]
struct BearerSnapshot {
    drb_id: u8,
    qos: BearerQos,
    teid: Option<Teid>,
    transport_address: Option<std::net::IpAddr>,
}

impl From<&X2BearerToSetup> for BearerSnapshot {
    fn from(bearer: &X2BearerToSetup) -> Self {
        Self {
            drb_id: bearer.drb_id,
            qos: bearer.qos,
            teid: bearer.teid,
            transport_address: bearer.transport_address,
        }
    }
}

/// What the source knows about the UE it hands over.
struct SourceSnapshot {
    cell_id: CellId,
    imsi: Option<u64>,
    reduced_capability: bool,
    bearers: Vec<BearerSnapshot>,
}

fn snapshot<S: Scheduler<RrcTimer>>(reg: &Registry<S>, rnti: Rnti) -> Result<SourceSnapshot, RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let bearers = ctx
        .bearers()
        .drbs()
        .filter_map(|record| {
            Some(BearerSnapshot {
                drb_id: record.drb_id()?,
                qos: record.qos?,
                teid: record.teid,
                transport_address: record.transport_address,
            })
        })
        .collect();
    Ok(SourceSnapshot {
        cell_id: ctx.cell_id(),
        imsi: ctx.imsi(),
        reduced_capability: ctx.reduced_capability(),
        bearers,
    })
}

fn is_neighbour(config: &GnbConfig, cell_id: CellId) -> bool {
    config.neighbours.iter().any(|n| n.cell_id == cell_id)
}

fn is_local(config: &GnbConfig, peer: &HandoverPeer) -> bool {
    config.has_cell(peer.cell_id)
}

fn send_x2<S: Scheduler<RrcTimer>>(reg: &mut Registry<S>, message: X2Message) {
    let (source, target) = message.cells();
    log_x2_message(Direction::Tx, source, target, message.name());
    reg.with_env(|env| env.x2.send(message));
}

fn admit<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    cell_id: CellId,
    reduced_capability: bool,
) -> bool {
    reg.with_env(|env| {
        let request = AdmissionRequest {
            rnti,
            cell_id,
            reduced_capability,
            connected_ues: env.connected_ues,
        };
        env.admission.admit_handover(&request)
    })
}

/// Creates the target context and builds the handover command for it.
/// The context is removed again if anything fails.
fn create_target<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    target_cell: CellId,
    source: HandoverPeer,
    ue: &SourceSnapshot,
) -> Result<(Rnti, nextgsim_rrc::procedures::RrcReconfiguration), RrcError> {
    let target_rnti = reg.create_context(target_cell, InitialState::HandoverJoining)?;
    let result = reg.with_context(target_rnti, |ctx, env| {
        ctx.set_handover_source(source, ue.imsi, ue.reduced_capability);
        for bearer in &ue.bearers {
            ctx.replicate_bearer(
                env,
                bearer.drb_id,
                bearer.qos,
                bearer.teid,
                bearer.transport_address,
            )?;
        }
        let cell = env
            .config
            .cell(target_cell)
            .ok_or(RrcError::UnknownCell(target_cell))?;
        Ok(ctx.build_handover_command(cell))
    });
    match result {
        Ok(command) => Ok((target_rnti, command)),
        Err(err) => {
            warn!("UE[{}] handover target setup failed: {}", target_rnti, err);
            reg.remove_context(target_rnti, ReleaseCause::HandoverCancelled);
            Err(err)
        }
    }
}

// ============================================================================
// Source side
// ============================================================================

/// Starts a handover of a connected UE to `target_cell`.
pub(super) fn prepare<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    target_cell: CellId,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    if ctx.state() != RrcState::ConnectedNormally {
        let err = RrcError::ProtocolViolation {
            rnti,
            state: ctx.state(),
            event: "HandoverRequest",
        };
        warn!("{}", err);
        return Err(err);
    }
    if reg.config().has_cell(target_cell) {
        prepare_intra(reg, rnti, target_cell)
    } else if is_neighbour(reg.config(), target_cell) {
        prepare_inter(reg, rnti, target_cell)
    } else {
        warn!("UE[{}] handover to unknown cell {}", rnti, target_cell);
        Err(RrcError::UnknownCell(target_cell))
    }
}

fn prepare_intra<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    target_cell: CellId,
) -> Result<(), RrcError> {
    let ue = snapshot(reg, rnti)?;
    reg.counters.handovers_started += 1;
    info!(
        "UE[{}] intra-gNB handover: cell {} -> cell {}",
        rnti, ue.cell_id, target_cell
    );

    if !admit(reg, rnti, target_cell, ue.reduced_capability) {
        warn!("UE[{}] handover into cell {} not admitted", rnti, target_cell);
        reg.counters.handovers_failed += 1;
        return Err(RrcError::AdmissionDenied {
            rnti,
            procedure: "HandoverRequest",
        });
    }

    let source = HandoverPeer {
        cell_id: ue.cell_id,
        rnti: Some(rnti),
    };
    let (target_rnti, command) = match create_target(reg, target_cell, source, &ue) {
        Ok(target) => target,
        Err(err) => {
            reg.counters.handovers_failed += 1;
            return Err(err);
        }
    };

    let target = HandoverPeer {
        cell_id: target_cell,
        rnti: Some(target_rnti),
    };
    let sent = encode_handover_command(&command)
        .map_err(RrcError::from)
        .and_then(|bytes| {
            reg.with_context(rnti, |ctx, env| {
                ctx.send_handover_command(env, target, bytes)?;
                Ok(ctx.pdcp_statuses(env))
            })
        });
    let statuses = match sent {
        Ok(statuses) => statuses,
        Err(err) => {
            reg.remove_context(target_rnti, ReleaseCause::HandoverCancelled);
            reg.counters.handovers_failed += 1;
            return Err(err);
        }
    };

    for (drb_id, status) in statuses {
        reg.with_context(target_rnti, |ctx, env| ctx.apply_pdcp_status(env, drb_id, status))?;
    }
    debug!("UE[{}] handover command sent, target is UE[{}]", rnti, target_rnti);
    Ok(())
}

fn prepare_inter<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    target_cell: CellId,
) -> Result<(), RrcError> {
    let ue = snapshot(reg, rnti)?;
    let cell = reg
        .config()
        .cell(ue.cell_id)
        .ok_or(RrcError::UnknownCell(ue.cell_id))?;
    let source_dl_carrier_freq = cell.arfcn;
    let source_radio_bearer_config = reg
        .context(rnti)
        .ok_or(RrcError::UnknownContext(rnti))?
        .bearers()
        .radio_bearer_config(true);
    let info = HandoverPreparationInfo {
        source_ue_identity: rnti.value(),
        source_radio_bearer_config,
        source_mib: reg.master_information_block(ue.cell_id),
        source_sib1: reg.sib1(ue.cell_id),
        source_dl_carrier_freq,
    };
    let mode = reg.config().rrc.protocol;
    let rrc_context = reg
        .containers
        .pack(mode, ContainerPayload::PreparationInfo(info))?;

    reg.with_context(rnti, |ctx, _| ctx.begin_handover_preparation(target_cell))?;
    reg.counters.handovers_started += 1;
    info!(
        "UE[{}] inter-gNB handover: cell {} -> cell {}",
        rnti, ue.cell_id, target_cell
    );

    let request = HandoverRequest {
        old_rnti: rnti,
        source_cell: ue.cell_id,
        target_cell,
        cause: X2Cause::HandoverDesirableForRadioReasons,
        imsi: ue.imsi,
        reduced_capability: ue.reduced_capability,
        ue_ambr_dl_bps: reg.config().rrc.ue_ambr_dl_bps,
        ue_ambr_ul_bps: reg.config().rrc.ue_ambr_ul_bps,
        bearers: ue
            .bearers
            .iter()
            .map(|b| X2BearerToSetup {
                drb_id: b.drb_id,
                qos: b.qos,
                teid: b.teid,
                transport_address: b.transport_address,
            })
            .collect(),
        rrc_context,
    };
    send_x2(reg, X2Message::HandoverRequest(request));
    Ok(())
}

pub(super) fn on_handover_request_ack<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: HandoverRequestAck,
) -> Result<(), RrcError> {
    let rnti = msg.old_rnti;
    let state = reg.context(rnti).map(|ctx| ctx.state());
    if state != Some(RrcState::HandoverPreparation) {
        // the source went away while the target prepared: drop the target
        if let Err(err) = reg.containers.unpack_handover_command(&msg.rrc_context) {
            debug!("UE[{}] stale handover command discarded: {}", rnti, err);
        }
        send_x2(
            reg,
            X2Message::HandoverCancel(HandoverCancel {
                old_rnti: rnti,
                new_rnti: msg.new_rnti,
                source_cell: msg.source_cell,
                target_cell: msg.target_cell,
                cause: X2Cause::ReleaseDueToGnbGeneratedReason,
            }),
        );
        let err = match state {
            Some(state) => RrcError::ProtocolViolation {
                rnti,
                state,
                event: "HandoverRequestAck",
            },
            None => RrcError::UnknownContext(rnti),
        };
        warn!("{}, target UE[{}] cancelled", err, msg.new_rnti);
        return Err(err);
    }

    let bytes = match reg.containers.unpack_handover_command(&msg.rrc_context) {
        Ok((_, bytes)) => bytes,
        Err(err) => {
            warn!("UE[{}] unreadable handover command: {}", rnti, err);
            send_x2(
                reg,
                X2Message::HandoverCancel(HandoverCancel {
                    old_rnti: rnti,
                    new_rnti: msg.new_rnti,
                    source_cell: msg.source_cell,
                    target_cell: msg.target_cell,
                    cause: X2Cause::AbstractSyntaxError,
                }),
            );
            let result = reg.with_context(rnti, |ctx, env| ctx.on_preparation_failure(env));
            reg.counters.handovers_failed += 1;
            reg.finish(rnti, result)?;
            return Err(err);
        }
    };

    let target = HandoverPeer {
        cell_id: msg.target_cell,
        rnti: Some(msg.new_rnti),
    };
    let statuses = reg.with_context(rnti, |ctx, env| {
        ctx.set_forwarding_teids(
            msg.admitted_bearers
                .iter()
                .map(|b| (b.drb_id, b.dl_forwarding_teid)),
        );
        ctx.send_handover_command(env, target, bytes)?;
        Ok(ctx.pdcp_statuses(env))
    })?;

    if !statuses.is_empty() {
        send_x2(
            reg,
            X2Message::SnStatusTransfer(SnStatusTransfer {
                old_rnti: rnti,
                new_rnti: msg.new_rnti,
                source_cell: msg.source_cell,
                target_cell: msg.target_cell,
                bearers: statuses
                    .into_iter()
                    .map(|(drb_id, status)| SnStatusItem { drb_id, status })
                    .collect(),
            }),
        );
    }
    Ok(())
}

pub(super) fn on_preparation_failure<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: HandoverPreparationFailure,
) -> Result<(), RrcError> {
    let rnti = msg.old_rnti;
    warn!(
        "UE[{}] handover to cell {} failed: {:?}",
        rnti, msg.target_cell, msg.cause
    );
    let result = reg.with_context(rnti, |ctx, env| ctx.on_preparation_failure(env));
    if result.is_ok() {
        reg.counters.handovers_failed += 1;
    }
    reg.finish(rnti, result)
}

pub(super) fn on_ue_context_release<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: UeContextRelease,
) -> Result<(), RrcError> {
    let rnti = msg.old_rnti;
    debug!("UE[{}] released by target UE[{}]", rnti, msg.new_rnti);
    let result = reg.with_context(rnti, |ctx, env| ctx.on_ue_context_release(env));
    reg.finish(rnti, result)
}

/// The source context outlived the handover leaving timer. A target still
/// waiting for the UE is cancelled.
pub(super) fn on_leaving_timeout<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let cell_id = ctx.cell_id();
    let target = ctx.handover_target();
    warn!("UE[{}] handover leaving timer expired", rnti);
    cancel_target(reg, rnti, cell_id, target, X2Cause::TX2RelocOverallExpiry);

    let timer = TimerKind::HandoverLeaving;
    reg.remove_context(rnti, ReleaseCause::Timeout(timer));
    reg.counters.handovers_failed += 1;
    Err(RrcError::Timeout { rnti, timer })
}

/// Release of a UE that may be handing over. A target already prepared
/// for it is cancelled; one still preparing is cancelled when its
/// acknowledge arrives.
pub(super) fn release_source<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let cell_id = ctx.cell_id();
    let target = match ctx.state() {
        RrcState::HandoverPreparation | RrcState::HandoverLeaving => ctx.handover_target(),
        _ => None,
    };

    let result = reg.with_context(rnti, |ctx, env| ctx.release(env));
    reg.finish(rnti, result)?;
    if target.is_some() {
        info!("UE[{}] released during handover", rnti);
    }
    cancel_target(reg, rnti, cell_id, target, X2Cause::ReleaseDueToGnbGeneratedReason);
    Ok(())
}

/// The UE will not arrive at `target`: a local target context is dropped,
/// a remote one is sent a HandoverCancel.
fn cancel_target<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    cell_id: CellId,
    target: Option<HandoverPeer>,
    cause: X2Cause,
) {
    let Some(peer @ HandoverPeer { rnti: Some(target_rnti), .. }) = target else {
        return;
    };
    if is_local(reg.config(), &peer) {
        let result = reg.with_context(target_rnti, |ctx, env| ctx.on_handover_cancel(env));
        if let Err(err) = reg.finish(target_rnti, result) {
            debug!("UE[{}] target not cancelled: {}", target_rnti, err);
        }
    } else {
        send_x2(
            reg,
            X2Message::HandoverCancel(HandoverCancel {
                old_rnti: rnti,
                new_rnti: target_rnti,
                source_cell: cell_id,
                target_cell: peer.cell_id,
                cause,
            }),
        );
    }
}

// ============================================================================
// Target side
// ============================================================================

fn send_preparation_failure<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: &HandoverRequest,
    cause: X2Cause,
) {
    send_x2(
        reg,
        X2Message::HandoverPreparationFailure(HandoverPreparationFailure {
            old_rnti: msg.old_rnti,
            source_cell: msg.source_cell,
            target_cell: msg.target_cell,
            cause,
        }),
    );
}

pub(super) fn on_handover_request<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: HandoverRequest,
) -> Result<(), RrcError> {
    let target_cell = msg.target_cell;
    if !reg.config().has_cell(target_cell) {
        warn!("handover request for cell {} not served here", target_cell);
        send_preparation_failure(reg, &msg, X2Cause::CellNotAvailable);
        return Err(RrcError::UnknownCell(target_cell));
    }

    let info = match reg.containers.unpack_preparation_info(&msg.rrc_context) {
        Ok(info) => info,
        Err(err) => {
            warn!("unreadable handover preparation information: {}", err);
            send_preparation_failure(reg, &msg, X2Cause::AbstractSyntaxError);
            return Err(err);
        }
    };
    if info.source_ue_identity != msg.old_rnti.value() {
        warn!(
            "preparation information names UE {}, request names UE[{}]",
            info.source_ue_identity, msg.old_rnti
        );
    }

    if !admit(reg, msg.old_rnti, target_cell, msg.reduced_capability) {
        warn!("handover of UE[{}] into cell {} not admitted", msg.old_rnti, target_cell);
        send_preparation_failure(reg, &msg, X2Cause::NoRadioResourcesAvailable);
        return Err(RrcError::AdmissionDenied {
            rnti: msg.old_rnti,
            procedure: "HandoverRequest",
        });
    }

    let ue = SourceSnapshot {
        cell_id: msg.source_cell,
        imsi: msg.imsi,
        reduced_capability: msg.reduced_capability,
        bearers: msg.bearers.iter().map(BearerSnapshot::from).collect(),
    };
    let source = HandoverPeer {
        cell_id: msg.source_cell,
        rnti: Some(msg.old_rnti),
    };
    let (new_rnti, command) = match create_target(reg, target_cell, source, &ue) {
        Ok(target) => target,
        Err(err) => {
            send_preparation_failure(reg, &msg, X2Cause::NoRadioResourcesAvailable);
            return Err(err);
        }
    };

    let admitted_bearers: Vec<X2AdmittedBearer> = ue
        .bearers
        .iter()
        .map(|b| X2AdmittedBearer {
            drb_id: b.drb_id,
            dl_forwarding_teid: reg.allocate_forwarding_teid(new_rnti, b.drb_id),
        })
        .collect();

    let mode = reg.config().rrc.protocol;
    let rrc_context = match reg
        .containers
        .pack(mode, ContainerPayload::HandoverCommand(command))
    {
        Ok(container) => container,
        Err(err) => {
            reg.remove_context(new_rnti, ReleaseCause::HandoverCancelled);
            send_preparation_failure(reg, &msg, X2Cause::AbstractSyntaxError);
            return Err(err);
        }
    };

    info!(
        "UE[{}] admitted from cell {} (UE[{}]), {} bearer(s)",
        new_rnti,
        msg.source_cell,
        msg.old_rnti,
        admitted_bearers.len()
    );
    send_x2(
        reg,
        X2Message::HandoverRequestAck(HandoverRequestAck {
            old_rnti: msg.old_rnti,
            new_rnti,
            source_cell: msg.source_cell,
            target_cell,
            admitted_bearers,
            rrc_context,
        }),
    );
    Ok(())
}

pub(super) fn on_sn_status_transfer<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: SnStatusTransfer,
) -> Result<(), RrcError> {
    let rnti = msg.new_rnti;
    for item in msg.bearers {
        let result = reg.with_context(rnti, |ctx, env| ctx.apply_pdcp_status(env, item.drb_id, item.status));
        if let Err(err) = result {
            warn!("UE[{}] SN status for DRB {} not applied: {}", rnti, item.drb_id, err);
        }
    }
    Ok(())
}

pub(super) fn on_handover_cancel<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    msg: HandoverCancel,
) -> Result<(), RrcError> {
    let rnti = msg.new_rnti;
    info!("UE[{}] handover cancelled by source: {:?}", rnti, msg.cause);
    let result = reg.with_context(rnti, |ctx, env| ctx.on_handover_cancel(env));
    reg.finish(rnti, result)
}

/// The UE arrived: asks the core network to move the downlink path, or
/// completes at once without a core.
pub(super) fn on_path_switch<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    if !reg.with_env(|env| env.has_core()) {
        return complete_path_switch(reg, rnti);
    }
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let event = CoreNetworkEvent::PathSwitchRequest {
        rnti,
        cell_id: ctx.cell_id(),
        imsi: ctx.imsi(),
        bearers: ctx
            .bearers()
            .drbs()
            .filter_map(|record| {
                record.drb_id().map(|bearer_id| PathSwitchBearer {
                    bearer_id,
                    teid: record.teid,
                })
            })
            .collect(),
    };
    debug!("UE[{}] path switch requested", rnti);
    reg.with_context(rnti, |ctx, env| {
        env.notify_core(event);
        ctx.mark_core_registered();
        Ok(())
    })
}

pub(super) fn on_path_switch_ack<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    complete_path_switch(reg, rnti)
}

fn complete_path_switch<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let cell_id = ctx.cell_id();
    let source = ctx.handover_source();

    let result = reg.with_context(rnti, |ctx, env| ctx.on_path_switch_complete(env));
    reg.finish(rnti, result)?;
    reg.forwarding.retain(|_, (owner, _)| *owner != rnti);
    info!("UE[{}] handover completed in cell {}", rnti, cell_id);

    match source {
        Some(peer @ HandoverPeer { rnti: Some(source_rnti), .. }) => {
            if is_local(reg.config(), &peer) {
                let result = reg.with_context(source_rnti, |ctx, env| ctx.on_ue_context_release(env));
                reg.finish(source_rnti, result)
            } else {
                send_x2(
                    reg,
                    X2Message::UeContextRelease(UeContextRelease {
                        old_rnti: source_rnti,
                        new_rnti: rnti,
                        source_cell: peer.cell_id,
                        target_cell: cell_id,
                    }),
                );
                Ok(())
            }
        }
        _ => {
            warn!("UE[{}] handover source unknown, nothing to release", rnti);
            Ok(())
        }
    }
}

/// The UE never arrived at this target. The source is told so and the
/// context is destroyed.
pub(super) fn on_joining_timeout<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    let cell_id = ctx.cell_id();
    let source = ctx.handover_source();
    warn!("UE[{}] never arrived in cell {}", rnti, cell_id);

    if let Some(peer @ HandoverPeer { rnti: Some(source_rnti), .. }) = source {
        if is_local(reg.config(), &peer) {
            let result = reg.with_context(source_rnti, |ctx, env| ctx.on_preparation_failure(env));
            match reg.finish(source_rnti, result) {
                Ok(()) => reg.counters.handovers_failed += 1,
                Err(err) => debug!("UE[{}] source not failed: {}", source_rnti, err),
            }
        } else {
            send_x2(
                reg,
                X2Message::HandoverPreparationFailure(HandoverPreparationFailure {
                    old_rnti: source_rnti,
                    source_cell: peer.cell_id,
                    target_cell: cell_id,
                    cause: X2Cause::TRelocPrepExpiry,
                }),
            );
        }
    }

    let timer = TimerKind::HandoverJoining;
    reg.remove_context(rnti, ReleaseCause::Timeout(timer));
    Err(RrcError::Timeout { rnti, timer })
}

// ============================================================================
// Measurement reports
// ============================================================================

/// Neighbour satisfying the A3 entry condition
/// `neighbour > serving + offset + hysteresis`, if any.
pub fn a3_target(config: &GnbConfig, serving_cell: CellId, report: &MeasurementReport) -> Option<CellId> {
    let handover = &config.rrc.handover;
    let neighbour = report.best_neighbour()?;
    let rsrp = i32::from(neighbour.rsrp?);
    let threshold = i32::from(report.pcell.rsrp) + handover.a3_offset_db + handover.hysteresis_db;
    if rsrp <= threshold {
        return None;
    }
    config
        .cell_id_for_pci(neighbour.physical_cell_id)
        .filter(|cell_id| *cell_id != serving_cell)
}

/// Tracks the A3 condition per UE and hands the UE over once it held for
/// time-to-trigger. Reports are ignored unless automatic handover is on.
pub(super) fn on_measurement_report<S: Scheduler<RrcTimer>>(
    reg: &mut Registry<S>,
    rnti: Rnti,
    report: &MeasurementReport,
) -> Result<(), RrcError> {
    let ctx = reg.context(rnti).ok_or(RrcError::UnknownContext(rnti))?;
    debug!(
        "UE[{}] measurement report {}: serving RSRP {}, {} neighbour(s)",
        rnti,
        report.meas_id,
        report.pcell.rsrp,
        report.neighbours.len()
    );
    if !reg.config().rrc.handover.automatic || ctx.state() != RrcState::ConnectedNormally {
        return Ok(());
    }

    let candidate = a3_target(reg.config(), ctx.cell_id(), report);
    let time_to_trigger = Duration::from_millis(reg.config().rrc.handover.time_to_trigger_ms);
    let now = reg.now();
    let trigger = reg.with_context(rnti, |ctx, _| {
        let Some(target) = candidate else {
            ctx.set_a3_candidate(None);
            return Ok(None);
        };
        let held = match ctx.a3_candidate() {
            Some((cell_id, since)) if cell_id == target => now.duration_since(since),
            _ => {
                ctx.set_a3_candidate(Some((target, now)));
                Duration::ZERO
            }
        };
        if held >= time_to_trigger {
            ctx.set_a3_candidate(None);
            Ok(Some(target))
        } else {
            Ok(None)
        }
    })?;

    match trigger {
        Some(target) => {
            info!("UE[{}] A3 condition held towards cell {}", rnti, target);
            prepare(reg, rnti, target)
        }
        None => Ok(()),
    }
}

// ============================================================================
// X2 delivery
// ============================================================================

/// Delivers an X2 message from one registry to another. Ideal-mode
/// containers are moved from the sender's arena into the receiver's.
pub fn deliver_x2<A, B>(from: &mut Registry<A>, to: &mut Registry<B>, mut message: X2Message) -> Result<(), RrcError>
where
    A: Scheduler<RrcTimer>,
    B: Scheduler<RrcTimer>,
{
    if let Some(container) = message.container_mut() {
        let taken = std::mem::replace(container, RrcContainer::Encoded(Vec::new()));
        *container = relay_container(from.containers_mut(), to.containers_mut(), taken)?;
    }
    to.on_x2_message(message)
}
