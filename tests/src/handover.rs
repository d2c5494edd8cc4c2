//! Handover integration tests
//!
//! Intra-gNB handover, X2 handover between two registries in both container
//! modes, SN status transfer, data forwarding, failures and A3-triggered
//! handover.

use std::time::Duration;

use bytes::Bytes;
use integration_tests::ue_emulator::measurement_report;
use integration_tests::{
    exchange_x2, init_test_logging, two_cell_config, x2_pair_configs, TestGnb, Ue,
};
use nextgsim_common::{GnbConfig, RlcModePolicy, Rnti, RrcProtocolMode};
use nextgsim_gnb::rrc::{
    BearerQos, CellLoad, CoreNetworkEvent, CoreNetworkMessage, PdcpStatus, QosClass, TimerKind,
    X2Cause, X2Message,
};
use nextgsim_gnb::{RrcError, RrcState};
use nextgsim_rrc::{DlDcchMessage, RrcChannel};

fn default_qos() -> BearerQos {
    BearerQos::new(QosClass::VideoTcpDefault)
}

/// Connected UE with `bearers` data bearers, all configured.
fn connected_ue(gnb: &mut TestGnb, cell_id: u16, bearers: u8) -> Ue {
    let ue = Ue::connect(&mut gnb.registry, cell_id, 7, false).unwrap();
    for i in 0..bearers {
        gnb.registry
            .add_data_bearer(ue.rnti, default_qos(), Some(0x1000 + u32::from(i)), None)
            .unwrap();
    }
    ue.settle(&mut gnb.registry).unwrap();
    ue
}

fn target_of(gnb: &TestGnb, source: Rnti) -> Rnti {
    gnb.registry
        .context(source)
        .and_then(|ctx| ctx.handover_target())
        .and_then(|peer| peer.rnti)
        .expect("source knows its target")
}

fn x2_pair(configure: impl Fn(&mut GnbConfig)) -> (TestGnb, TestGnb) {
    let (mut first, mut second) = x2_pair_configs();
    configure(&mut first);
    configure(&mut second);
    (TestGnb::new(first), TestGnb::new(second))
}

// ============================================================================
// Intra-gNB
// ============================================================================

#[test]
fn test_intra_handover_without_core_completes_on_arrival() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 1);

    gnb.registry.trigger_handover(ue.rnti, 2).unwrap();
    let target = target_of(&gnb, ue.rnti);

    // downlink data reaching the source is handed to the target and held
    gnb.registry
        .on_data_arrival(ue.rnti, 1, Bytes::from_static(b"in flight"))
        .unwrap();
    assert!(gnb.env.pdus_for(ue.rnti).is_empty());
    assert_eq!(gnb.registry.context(target).unwrap().pending_data_len(), 1);

    let arrived = Ue { rnti: target, ..ue };
    arrived.complete_reconfiguration(&mut gnb.registry).unwrap();

    assert_eq!(arrived.state(&gnb.registry), Some(RrcState::ConnectedNormally));
    assert!(gnb.registry.context(ue.rnti).is_none());
    assert_eq!(
        gnb.env.pdus_for(target),
        vec![(1, Bytes::from_static(b"in flight"))]
    );
    assert!(gnb.env.lock().started.contains(&(target, 1)));
    assert_eq!(gnb.registry.stats().handovers_completed, 1);
}

#[test]
fn test_intra_handover_copies_pdcp_state() {
    init_test_logging();
    let mut config = two_cell_config();
    config.rrc.rlc_mode_policy = RlcModePolicy::AlwaysAm;
    let mut gnb = TestGnb::new(config);
    let ue = connected_ue(&mut gnb, 1, 1);
    let status = PdcpStatus { dl_sn: 120, ul_sn: 77 };
    gnb.env.lock().pdcp.insert((ue.rnti, 1), status);

    gnb.registry.trigger_handover(ue.rnti, 2).unwrap();
    let target = target_of(&gnb, ue.rnti);

    let ctx = gnb.registry.context(target).unwrap();
    assert_eq!(ctx.bearers().drb(1).unwrap().pdcp_status, Some(status));
    assert_eq!(gnb.env.lock().pdcp.get(&(target, 1)), Some(&status));
}

#[test]
fn test_joining_timeout_fails_source() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 1);
    gnb.registry.trigger_handover(ue.rnti, 2).unwrap();
    let target = target_of(&gnb, ue.rnti);

    assert!(gnb.registry.advance(Duration::from_millis(199)).is_empty());
    let errors = gnb.registry.advance(Duration::from_millis(1));
    assert!(errors.iter().any(|err| matches!(
        err,
        RrcError::Timeout { rnti, timer: TimerKind::HandoverJoining } if *rnti == target
    )));

    assert!(gnb.registry.is_empty());
    assert!(matches!(
        gnb.env.last_dcch(ue.rnti),
        Some(DlDcchMessage::RrcRelease(release)) if release.suspend_config.is_none()
    ));
    let stats = gnb.registry.stats();
    assert_eq!(stats.handovers_started, 1);
    assert_eq!(stats.handovers_failed, 1);
    assert_eq!(stats.handovers_completed, 0);

    // the source's leaving timer died with it
    assert!(gnb.registry.advance(Duration::from_millis(500)).is_empty());
}

#[test]
fn test_intra_handover_not_admitted() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 1);
    gnb.env.deny_handovers(true);

    let result = gnb.registry.trigger_handover(ue.rnti, 2);
    assert!(matches!(result, Err(RrcError::AdmissionDenied { rnti, .. }) if rnti == ue.rnti));
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));
    assert_eq!(gnb.registry.len(), 1);
    assert_eq!(gnb.registry.stats().handovers_failed, 1);
}

#[test]
fn test_handover_preconditions() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 0);
    assert!(matches!(
        gnb.registry.trigger_handover(ue.rnti, 9),
        Err(RrcError::UnknownCell(9))
    ));

    let setup = Ue::request_connection(&mut gnb.registry, 1, 8, false).unwrap();
    let result = gnb.registry.trigger_handover(setup.rnti, 2);
    assert!(matches!(
        result,
        Err(RrcError::ProtocolViolation { state: RrcState::ConnectionSetup, .. })
    ));
    assert_eq!(setup.state(&gnb.registry), Some(RrcState::ConnectionSetup));
    assert_eq!(gnb.registry.stats().handovers_started, 0);
}

#[test]
fn test_reconfiguration_deferred_while_leaving() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 1);
    gnb.registry.trigger_handover(ue.rnti, 2).unwrap();
    let sent = gnb.env.downlink_count(ue.rnti);

    let drb = gnb
        .registry
        .add_data_bearer(ue.rnti, default_qos(), None, None)
        .unwrap();
    assert_eq!(drb, 2);
    assert!(gnb.registry.context(ue.rnti).unwrap().pending_reconfiguration());
    assert_eq!(gnb.env.downlink_count(ue.rnti), sent);
}

// ============================================================================
// X2
// ============================================================================

fn run_x2_handover(mode: RrcProtocolMode) {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|config| config.rrc.protocol = mode);
    let ue = connected_ue(&mut source, 1, 2);

    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert_eq!(ue.state(&source.registry), Some(RrcState::HandoverPreparation));
    match source.env.lock().x2.as_slice() {
        [X2Message::HandoverRequest(request)] => {
            assert_eq!(request.old_rnti, ue.rnti);
            assert_eq!(request.target_cell, 2);
            assert_eq!(request.imsi, Some(ue.imsi()));
            assert_eq!(request.bearers.len(), 2);
        }
        other => panic!("expected HandoverRequest, got {other:?}"),
    }

    assert!(exchange_x2(&mut source, &mut target).is_empty());

    let new_rnti = target_of(&source, ue.rnti);
    let ctx = target.registry.context(new_rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::HandoverJoining);
    assert_eq!(ctx.bearers().drb_count(), 2);
    assert_eq!(ctx.handover_source().unwrap().rnti, Some(ue.rnti));
    assert_eq!(ue.state(&source.registry), Some(RrcState::HandoverLeaving));

    match source.env.last_dcch(ue.rnti) {
        Some(DlDcchMessage::RrcReconfiguration(command)) => {
            let mobility = command.mobility_control_info.unwrap();
            assert_eq!(mobility.new_ue_identity, new_rnti.value());
            assert_eq!(mobility.target_physical_cell_id, 20);
        }
        other => panic!("expected handover command, got {other:?}"),
    }
    assert!(source.registry.containers_mut().is_empty());
    assert!(target.registry.containers_mut().is_empty());

    let arrived = Ue { rnti: new_rnti, ..ue };
    arrived.complete_reconfiguration(&mut target.registry).unwrap();
    assert_eq!(arrived.state(&target.registry), Some(RrcState::ConnectedNormally));
    assert!(matches!(
        target.env.lock().x2.as_slice(),
        [X2Message::UeContextRelease(release)] if release.old_rnti == ue.rnti
    ));

    assert!(exchange_x2(&mut source, &mut target).is_empty());
    assert!(source.registry.is_empty());
    assert_eq!(target.registry.len(), 1);
    assert_eq!(source.registry.stats().handovers_completed, 1);
}

#[test]
fn test_x2_handover_with_encoded_containers() {
    run_x2_handover(RrcProtocolMode::Real);
}

#[test]
fn test_x2_handover_with_container_tokens() {
    run_x2_handover(RrcProtocolMode::Ideal);
}

#[test]
fn test_x2_sn_status_transfer() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|config| config.rrc.rlc_mode_policy = RlcModePolicy::AlwaysAm);
    let ue = connected_ue(&mut source, 1, 2);
    let first = PdcpStatus { dl_sn: 9, ul_sn: 3 };
    let second = PdcpStatus { dl_sn: 4000, ul_sn: 12 };
    source.env.lock().pdcp.insert((ue.rnti, 1), first);
    source.env.lock().pdcp.insert((ue.rnti, 2), second);

    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());

    let new_rnti = target_of(&source, ue.rnti);
    let ctx = target.registry.context(new_rnti).unwrap();
    assert_eq!(ctx.bearers().drb(1).unwrap().pdcp_status, Some(first));
    assert_eq!(ctx.bearers().drb(2).unwrap().pdcp_status, Some(second));
    assert_eq!(target.env.lock().pdcp.get(&(new_rnti, 2)), Some(&second));
}

#[test]
fn test_x2_data_forwarding() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|_| {});
    let ue = connected_ue(&mut source, 1, 1);
    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    let new_rnti = target_of(&source, ue.rnti);

    source
        .registry
        .on_data_arrival(ue.rnti, 1, Bytes::from_static(b"forwarded"))
        .unwrap();
    assert!(matches!(
        source.env.lock().x2.as_slice(),
        [X2Message::UeDataForward(forward)] if forward.target_cell == 2
    ));
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    assert_eq!(target.registry.context(new_rnti).unwrap().pending_data_len(), 1);

    Ue { rnti: new_rnti, ..ue }
        .complete_reconfiguration(&mut target.registry)
        .unwrap();
    assert_eq!(
        target.env.pdus_for(new_rnti),
        vec![(1, Bytes::from_static(b"forwarded"))]
    );
}

#[test]
fn test_x2_handover_refused_by_target() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|_| {});
    let ue = connected_ue(&mut source, 1, 1);
    target.env.deny_handovers(true);

    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    let errors = exchange_x2(&mut source, &mut target);
    assert!(matches!(
        errors.as_slice(),
        [RrcError::AdmissionDenied { .. }]
    ));

    assert!(target.registry.is_empty());
    let ctx = source.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::ConnectedNormally);
    assert!(ctx.handover_target().is_none());
    assert_eq!(source.registry.stats().handovers_failed, 1);
}

#[test]
fn test_x2_leaving_timeout_cancels_target() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|_| {});
    let ue = connected_ue(&mut source, 1, 1);
    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    let new_rnti = target_of(&source, ue.rnti);

    let errors = source.registry.advance(Duration::from_millis(500));
    assert!(matches!(
        errors.as_slice(),
        [RrcError::Timeout { timer: TimerKind::HandoverLeaving, .. }]
    ));
    assert!(source.registry.is_empty());
    assert!(matches!(
        source.env.lock().x2.as_slice(),
        [X2Message::HandoverCancel(cancel)] if cancel.new_rnti == new_rnti
    ));

    assert!(exchange_x2(&mut source, &mut target).is_empty());
    assert!(target.registry.context(new_rnti).is_none());
    assert_eq!(source.registry.stats().handovers_failed, 1);
}

#[test]
fn test_release_while_leaving_drops_local_target() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 1);
    gnb.registry.trigger_handover(ue.rnti, 2).unwrap();
    let target = target_of(&gnb, ue.rnti);

    gnb.registry.trigger_release(ue.rnti).unwrap();
    assert!(gnb.registry.context(ue.rnti).is_none());
    assert!(gnb.registry.context(target).is_none());
    assert!(gnb.registry.is_empty());

    // neither the joining nor the leaving timer outlives its context
    assert!(gnb.registry.advance(Duration::from_millis(500)).is_empty());
    assert_eq!(gnb.registry.stats().handovers_completed, 0);
}

#[test]
fn test_release_while_leaving_cancels_x2_target() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|_| {});
    let ue = connected_ue(&mut source, 1, 1);
    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    let new_rnti = target_of(&source, ue.rnti);

    source.registry.trigger_release(ue.rnti).unwrap();
    assert!(source.registry.is_empty());
    assert!(matches!(
        source.env.lock().x2.as_slice(),
        [X2Message::HandoverCancel(cancel)]
            if cancel.new_rnti == new_rnti
                && cancel.cause == X2Cause::ReleaseDueToGnbGeneratedReason
    ));

    assert!(exchange_x2(&mut source, &mut target).is_empty());
    assert!(target.registry.context(new_rnti).is_none());
    assert!(target.registry.advance(Duration::from_millis(200)).is_empty());
}

#[test]
fn test_release_while_preparing_cancels_target_on_ack() {
    init_test_logging();
    let (mut source, mut target) = x2_pair(|config| config.rrc.protocol = RrcProtocolMode::Ideal);
    let ue = connected_ue(&mut source, 1, 1);
    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert_eq!(ue.state(&source.registry), Some(RrcState::HandoverPreparation));

    source.registry.trigger_release(ue.rnti).unwrap();
    assert!(source.registry.is_empty());

    // the acknowledge finds no source and is answered with a cancel
    let errors = exchange_x2(&mut source, &mut target);
    assert!(matches!(
        errors.as_slice(),
        [RrcError::UnknownContext(rnti)] if *rnti == ue.rnti
    ));
    assert!(target.registry.is_empty());
    assert!(source.registry.containers_mut().is_empty());
    assert!(target.registry.containers_mut().is_empty());
}

#[test]
fn test_x2_handover_with_core_path_switch() {
    init_test_logging();
    let (source_config, mut target_config) = x2_pair_configs();
    target_config.rrc.core_network_enabled = true;
    let mut source = TestGnb::new(source_config);
    let mut target = TestGnb::new(target_config);

    let ue = connected_ue(&mut source, 1, 1);
    source.registry.trigger_handover(ue.rnti, 2).unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    let new_rnti = target_of(&source, ue.rnti);

    let arrived = Ue { rnti: new_rnti, ..ue };
    arrived.complete_reconfiguration(&mut target.registry).unwrap();
    assert_eq!(arrived.state(&target.registry), Some(RrcState::HandoverPathSwitch));
    assert!(matches!(
        target.env.take_core().as_slice(),
        [CoreNetworkEvent::PathSwitchRequest { rnti, .. }] if *rnti == new_rnti
    ));
    // nothing released before the core answers
    assert!(target.env.lock().x2.is_empty());

    target
        .registry
        .on_core_network(CoreNetworkMessage::PathSwitchRequestAck { rnti: new_rnti })
        .unwrap();
    assert!(exchange_x2(&mut source, &mut target).is_empty());
    assert!(source.registry.is_empty());
    assert!(target.registry.context(new_rnti).unwrap().core_registered());
}

#[test]
fn test_load_information_exchange() {
    init_test_logging();
    let (mut first, mut second) = x2_pair(|_| {});
    let load = CellLoad {
        cell_id: 1,
        dl_prb_usage: 40,
        ul_prb_usage: 25,
    };
    first.registry.report_load(2, vec![load]);
    assert!(exchange_x2(&mut first, &mut second).is_empty());
    assert_eq!(second.registry.neighbour_load(1), Some(&load));
    assert_eq!(first.registry.neighbour_load(2), None);
}

// ============================================================================
// Measurement-triggered handover
// ============================================================================

fn automatic_gnb() -> TestGnb {
    TestGnb::with_rrc(two_cell_config(), |rrc| rrc.handover.automatic = true)
}

fn report(gnb: &mut TestGnb, ue: &Ue, serving: u8, neighbour: u8) -> Result<(), RrcError> {
    gnb.registry
        .on_inbound_message(ue.rnti, RrcChannel::UlDcch, &measurement_report(serving, 20, neighbour))
}

#[test]
fn test_a3_handover_after_time_to_trigger() {
    init_test_logging();
    let mut gnb = automatic_gnb();
    let ue = connected_ue(&mut gnb, 1, 1);

    // the reconfiguration carried the A3 measurement setup
    match gnb.env.last_dcch(ue.rnti) {
        Some(DlDcchMessage::RrcReconfiguration(reconf)) => assert!(reconf.meas_config.is_some()),
        other => panic!("expected RRCReconfiguration, got {other:?}"),
    }

    report(&mut gnb, &ue, 40, 60).unwrap();
    gnb.registry.advance(Duration::from_millis(300));
    report(&mut gnb, &ue, 40, 60).unwrap();
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));

    gnb.registry.advance(Duration::from_millis(340));
    report(&mut gnb, &ue, 40, 60).unwrap();
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::HandoverLeaving));
    let target = target_of(&gnb, ue.rnti);
    assert_eq!(gnb.registry.context(target).unwrap().cell_id(), 2);
}

#[test]
fn test_a3_condition_must_hold() {
    init_test_logging();
    let mut gnb = automatic_gnb();
    let ue = connected_ue(&mut gnb, 1, 0);

    report(&mut gnb, &ue, 40, 60).unwrap();
    gnb.registry.advance(Duration::from_millis(300));
    // neighbour within offset plus hysteresis
    report(&mut gnb, &ue, 40, 44).unwrap();
    gnb.registry.advance(Duration::from_millis(340));
    report(&mut gnb, &ue, 40, 60).unwrap();
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));

    gnb.registry.advance(Duration::from_millis(640));
    report(&mut gnb, &ue, 40, 60).unwrap();
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::HandoverLeaving));
}

#[test]
fn test_reports_ignored_without_automatic_handover() {
    init_test_logging();
    let mut gnb = TestGnb::new(two_cell_config());
    let ue = connected_ue(&mut gnb, 1, 0);

    for _ in 0..3 {
        report(&mut gnb, &ue, 40, 90).unwrap();
        gnb.registry.advance(Duration::from_millis(700));
    }
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));
    assert_eq!(gnb.registry.len(), 1);
}
