//! RRC_INACTIVE integration tests
//!
//! Release and suspend of reduced-capability UEs, paging on downlink data,
//! resume from a fresh random access, and small data transfer.

use std::time::Duration;

use bytes::Bytes;
use integration_tests::ue_emulator::{resume_complete, resume_request};
use integration_tests::{init_test_logging, single_cell_config, TestGnb, Ue};
use nextgsim_common::Rnti;
use nextgsim_gnb::rrc::{BearerQos, CoreNetworkEvent, QosClass, ReleaseCause, TimerKind};
use nextgsim_gnb::{RrcError, RrcState};
use nextgsim_rrc::{DlCcchMessage, DlDcchMessage, RrcChannel};

/// Connected RedCap UE with one data bearer, released to RRC_INACTIVE.
fn suspended_ue(gnb: &mut TestGnb) -> Ue {
    let ue = Ue::connect(&mut gnb.registry, 1, 7, true).unwrap();
    gnb.registry
        .add_data_bearer(ue.rnti, BearerQos::new(QosClass::VideoTcpDefault), Some(0x42), None)
        .unwrap();
    ue.settle(&mut gnb.registry).unwrap();
    gnb.registry.trigger_release(ue.rnti).unwrap();
    ue
}

/// A fresh random access sending a resume request for `identity`.
fn resume_from_new_access(gnb: &mut TestGnb, identity: u32, sdt: Vec<Vec<u8>>) -> (Rnti, Result<(), RrcError>) {
    let temporary = gnb.registry.on_radio_attempt(1).unwrap();
    let result = gnb.registry.on_inbound_message(
        temporary,
        RrcChannel::UlCcch,
        &resume_request(identity, sdt),
    );
    (temporary, result)
}

fn complete_resume(gnb: &mut TestGnb, rnti: Rnti) -> Result<(), RrcError> {
    let tid = gnb.registry.context(rnti).unwrap().last_transaction_id();
    gnb.registry
        .on_inbound_message(rnti, RrcChannel::UlDcch, &resume_complete(tid))
}

#[test]
fn test_redcap_release_suspends_context() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = suspended_ue(&mut gnb);

    let ctx = gnb.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::Inactive);
    assert_eq!(ctx.timers().armed().count(), 0);
    let suspend = ctx.suspend_config().unwrap();
    assert_eq!(suspend.short_i_rnti, u32::from(ue.rnti.value()));
    assert_eq!(suspend.sdt_config.as_ref().unwrap().sdt_drb_list, vec![1]);

    match gnb.env.last_dcch(ue.rnti) {
        Some(DlDcchMessage::RrcRelease(release)) => {
            assert_eq!(release.suspend_config.as_ref(), Some(suspend));
        }
        other => panic!("expected RRCRelease, got {other:?}"),
    }
    assert!(gnb.env.removed().is_empty());

    // a suspended UE has nothing to release
    let result = gnb.registry.trigger_release(ue.rnti);
    assert!(matches!(
        result,
        Err(RrcError::ProtocolViolation { state: RrcState::Inactive, .. })
    ));
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::Inactive));
}

#[test]
fn test_data_inactivity_suspends_redcap_ue() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = Ue::connect(&mut gnb.registry, 1, 7, true).unwrap();

    assert!(gnb.registry.advance(Duration::from_millis(9_999)).is_empty());
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));
    assert!(gnb.registry.advance(Duration::from_millis(1)).is_empty());
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::Inactive));
}

#[test]
fn test_data_inactivity_releases_regular_ue() {
    init_test_logging();
    let mut gnb = TestGnb::with_rrc(single_cell_config(), |rrc| rrc.core_network_enabled = true);
    let ue = Ue::connect(&mut gnb.registry, 1, 7, false).unwrap();
    let drb = gnb
        .registry
        .add_data_bearer(ue.rnti, BearerQos::new(QosClass::VideoTcpDefault), Some(1), None)
        .unwrap();
    ue.settle(&mut gnb.registry).unwrap();
    gnb.env.take_core();

    // downlink traffic re-arms the timer
    gnb.registry.advance(Duration::from_millis(6_000));
    gnb.registry
        .on_data_arrival(ue.rnti, drb, Bytes::from_static(b"x"))
        .unwrap();
    gnb.registry.advance(Duration::from_millis(6_000));
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::ConnectedNormally));

    gnb.registry.advance(Duration::from_millis(4_000));
    assert!(gnb.registry.context(ue.rnti).is_none());
    assert!(matches!(
        gnb.env.last_dcch(ue.rnti),
        Some(DlDcchMessage::RrcRelease(release)) if release.suspend_config.is_none()
    ));
    assert!(matches!(
        gnb.env.take_core().as_slice(),
        [CoreNetworkEvent::UeContextRelease { rnti, cause: ReleaseCause::Normal, .. }] if *rnti == ue.rnti
    ));
}

#[test]
fn test_downlink_data_pages_and_resume_flushes() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = suspended_ue(&mut gnb);

    gnb.registry
        .on_data_arrival(ue.rnti, 1, Bytes::from_static(b"first"))
        .unwrap();
    gnb.registry
        .on_data_arrival(ue.rnti, 1, Bytes::from_static(b"second"))
        .unwrap();
    let ctx = gnb.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::InactiveConnecting);
    assert_eq!(ctx.pending_data_len(), 2);
    assert_eq!(gnb.env.pages(), vec![ue.rnti]);
    assert!(gnb.env.pdus_for(ue.rnti).is_empty());

    let (temporary, result) = resume_from_new_access(&mut gnb, u32::from(ue.rnti.value()), Vec::new());
    result.unwrap();
    assert!(gnb.registry.context(temporary).is_none());
    assert!(gnb.env.removed().contains(&temporary));
    assert!(matches!(
        gnb.env.last_dcch(ue.rnti),
        Some(DlDcchMessage::RrcResume(resume)) if resume.radio_bearer_config.is_some()
    ));

    complete_resume(&mut gnb, ue.rnti).unwrap();
    let ctx = gnb.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::ConnectedNormally);
    assert!(ctx.suspend_config().is_none());
    assert!(ctx.timers().is_armed(TimerKind::DataInactivity));
    assert_eq!(
        gnb.env.pdus_for(ue.rnti),
        vec![
            (1, Bytes::from_static(b"first")),
            (1, Bytes::from_static(b"second"))
        ]
    );
}

#[test]
fn test_small_data_transfer_returns_to_inactive() {
    init_test_logging();
    let mut gnb = TestGnb::with_rrc(single_cell_config(), |rrc| rrc.sdt_enabled = true);
    let ue = suspended_ue(&mut gnb);

    let (temporary, result) =
        resume_from_new_access(&mut gnb, u32::from(ue.rnti.value()), vec![vec![1, 2, 3], vec![4]]);
    result.unwrap();
    assert!(gnb.registry.context(temporary).is_none());

    assert_eq!(
        gnb.env.lock().uplink,
        vec![
            (ue.rnti, 1, Bytes::from_static(&[1, 2, 3])),
            (ue.rnti, 1, Bytes::from_static(&[4]))
        ]
    );
    let ctx = gnb.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::Inactive);
    assert!(ctx.suspend_config().is_some());
    assert!(matches!(
        gnb.env.last_dcch(ue.rnti),
        Some(DlDcchMessage::RrcRelease(release)) if release.suspend_config.is_some()
    ));
    assert!(gnb.env.pages().is_empty());
}

#[test]
fn test_small_data_transfer_with_pending_downlink_pages_again() {
    init_test_logging();
    let mut gnb = TestGnb::with_rrc(single_cell_config(), |rrc| rrc.sdt_enabled = true);
    let ue = suspended_ue(&mut gnb);
    gnb.registry
        .on_data_arrival(ue.rnti, 1, Bytes::from_static(b"waiting"))
        .unwrap();

    let (_, result) = resume_from_new_access(&mut gnb, u32::from(ue.rnti.value()), vec![vec![9]]);
    result.unwrap();

    let ctx = gnb.registry.context(ue.rnti).unwrap();
    assert_eq!(ctx.state(), RrcState::InactiveConnecting);
    assert_eq!(ctx.pending_data_len(), 1);
    assert_eq!(gnb.env.pages(), vec![ue.rnti, ue.rnti]);
}

#[test]
fn test_small_data_ignored_when_disabled() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = suspended_ue(&mut gnb);

    let (_, result) = resume_from_new_access(&mut gnb, u32::from(ue.rnti.value()), vec![vec![1]]);
    result.unwrap();
    assert!(gnb.env.lock().uplink.is_empty());
    assert!(matches!(
        gnb.env.last_dcch(ue.rnti),
        Some(DlDcchMessage::RrcResume(_))
    ));
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::InactiveConnecting));
}

#[test]
fn test_unknown_resume_identity_is_rejected() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = suspended_ue(&mut gnb);

    let (temporary, result) = resume_from_new_access(&mut gnb, 999, Vec::new());
    result.unwrap();
    assert_eq!(
        gnb.registry.context(temporary).unwrap().state(),
        RrcState::ConnectionRejected
    );
    assert!(matches!(
        gnb.env.last_ccch(temporary),
        Some(DlCcchMessage::RrcReject(reject)) if reject.wait_time == 3
    ));
    // the suspended context is untouched
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::Inactive));

    let errors = gnb.registry.advance(Duration::from_millis(30));
    assert!(matches!(
        errors.as_slice(),
        [RrcError::Timeout { timer: TimerKind::ConnectionRejected, .. }]
    ));
    assert!(gnb.registry.context(temporary).is_none());
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::Inactive));
}

#[test]
fn test_resume_complete_outside_resume_is_violation() {
    init_test_logging();
    let mut gnb = TestGnb::new(single_cell_config());
    let ue = suspended_ue(&mut gnb);

    let result = complete_resume(&mut gnb, ue.rnti);
    assert!(matches!(
        result,
        Err(RrcError::ProtocolViolation { state: RrcState::Inactive, .. })
    ));
    assert_eq!(ue.state(&gnb.registry), Some(RrcState::Inactive));
}
