//! Property tests for identifier allocation

use std::collections::HashSet;
use std::time::Duration;

use integration_tests::{single_cell_config, TestGnb};
use nextgsim_common::RlcModePolicy;
use nextgsim_gnb::rrc::{BearerManager, BearerQos, QosClass};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum RegistryOp {
    Attempt,
    Advance(u64),
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        3 => Just(RegistryOp::Attempt),
        1 => (1u64..40).prop_map(RegistryOp::Advance),
    ]
}

#[derive(Debug, Clone)]
enum BearerOp {
    Add,
    Release(u8),
}

fn bearer_op() -> impl Strategy<Value = BearerOp> {
    prop_oneof![
        2 => Just(BearerOp::Add),
        1 => (1u8..=32).prop_map(BearerOp::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A fresh RNTI never names a live context, and SRS indices stay
    /// distinct within the cell.
    #[test]
    fn prop_live_identifiers_are_unique(ops in proptest::collection::vec(registry_op(), 1..80)) {
        let mut gnb = TestGnb::new(single_cell_config());
        for op in ops {
            match op {
                RegistryOp::Attempt => {
                    let live: HashSet<_> = gnb.registry.contexts().map(|ctx| ctx.rnti()).collect();
                    let rnti = gnb.registry.on_radio_attempt(1).unwrap();
                    prop_assert!(!live.contains(&rnti));
                }
                RegistryOp::Advance(ms) => {
                    gnb.registry.advance(Duration::from_millis(ms));
                }
            }
            let srs: Vec<u16> = gnb.registry.contexts().map(|ctx| ctx.srs_config_index()).collect();
            let distinct: HashSet<_> = srs.iter().collect();
            prop_assert_eq!(distinct.len(), srs.len());
        }
    }

    /// DRB identities stay unique and within the per-UE bound.
    #[test]
    fn prop_data_bearer_ids_bounded(
        reduced_capability in any::<bool>(),
        ops in proptest::collection::vec(bearer_op(), 1..100),
    ) {
        let mut bearers = BearerManager::new(RlcModePolicy::AlwaysUm, reduced_capability);
        let max = bearers.max_drbs();
        prop_assert_eq!(max, if reduced_capability { 8 } else { 32 });

        for op in ops {
            match op {
                BearerOp::Add => {
                    let before = bearers.drb_count();
                    match bearers.add_data_bearer(BearerQos::new(QosClass::VideoTcpDefault), None, None) {
                        Ok(id) => {
                            prop_assert!((1..=max).contains(&id));
                            prop_assert_eq!(bearers.drb_count(), before + 1);
                        }
                        Err(_) => prop_assert_eq!(before, usize::from(max)),
                    }
                }
                BearerOp::Release(id) => {
                    let held = bearers.has_drb(id);
                    prop_assert_eq!(bearers.release_data_bearer(id).is_some(), held);
                    prop_assert!(!bearers.has_drb(id));
                }
            }
            let ids: Vec<u8> = bearers.drbs().filter_map(|record| record.drb_id()).collect();
            let distinct: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(distinct.len(), ids.len());
            prop_assert!(ids.len() <= usize::from(max));
        }
    }
}
