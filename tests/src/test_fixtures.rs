//! Test fixtures and configuration helpers
//!
//! Ready-made gNB configurations and a [`TestGnb`] pairing a registry with
//! its recording collaborators.

use nextgsim_common::{CellConfig, GnbConfig, NeighbourCellConfig, Plmn, RrcConfig};
use nextgsim_gnb::{deliver_x2, Registry, RrcError};

use crate::mock_env::MockEnv;

pub fn cell(cell_id: u16, pci: u16) -> CellConfig {
    CellConfig {
        cell_id,
        pci,
        arfcn: 632_628,
        dl_bandwidth_prbs: 100,
        ul_bandwidth_prbs: 100,
    }
}

/// gNB 1 serving cell 1 (PCI 10).
pub fn single_cell_config() -> GnbConfig {
    GnbConfig {
        gnb_id: 1,
        plmn: Plmn::new(1, 1, false),
        tac: 1,
        cells: vec![cell(1, 10)],
        neighbours: Vec::new(),
        rrc: RrcConfig::default(),
    }
}

/// gNB 1 serving cells 1 (PCI 10) and 2 (PCI 20).
pub fn two_cell_config() -> GnbConfig {
    GnbConfig {
        cells: vec![cell(1, 10), cell(2, 20)],
        ..single_cell_config()
    }
}

/// Two gNBs neighbouring each other over X2: gNB 1 serves cell 1
/// (PCI 10), gNB 2 serves cell 2 (PCI 20).
pub fn x2_pair_configs() -> (GnbConfig, GnbConfig) {
    let first = GnbConfig {
        neighbours: vec![NeighbourCellConfig { cell_id: 2, pci: 20 }],
        ..single_cell_config()
    };
    let second = GnbConfig {
        gnb_id: 2,
        cells: vec![cell(2, 20)],
        neighbours: vec![NeighbourCellConfig { cell_id: 1, pci: 10 }],
        ..single_cell_config()
    };
    (first, second)
}

/// A registry and the collaborators recording what it does.
pub struct TestGnb {
    pub registry: Registry,
    pub env: MockEnv,
}

impl TestGnb {
    pub fn new(config: GnbConfig) -> Self {
        let core = config.rrc.core_network_enabled;
        let env = MockEnv::new();
        let registry = Registry::new(config, env.collaborators(core));
        Self { registry, env }
    }

    pub fn with_rrc(mut config: GnbConfig, configure: impl FnOnce(&mut RrcConfig)) -> Self {
        configure(&mut config.rrc);
        Self::new(config)
    }
}

/// Delivers X2 messages between two gNBs until neither has anything left
/// to send. Returns the errors the receivers reported.
pub fn exchange_x2(a: &mut TestGnb, b: &mut TestGnb) -> Vec<RrcError> {
    let mut errors = Vec::new();
    loop {
        let from_a = a.env.take_x2();
        let from_b = b.env.take_x2();
        if from_a.is_empty() && from_b.is_empty() {
            return errors;
        }
        for message in from_a {
            if let Err(err) = deliver_x2(&mut a.registry, &mut b.registry, message) {
                errors.push(err);
            }
        }
        for message in from_b {
            if let Err(err) = deliver_x2(&mut b.registry, &mut a.registry, message) {
                errors.push(err);
            }
        }
    }
}
