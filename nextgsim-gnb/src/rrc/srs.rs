//! SRS configuration index allocation
//!
//! Each UE of a cell gets its own SRS configuration index from the window
//! that belongs to the cell's SRS periodicity (TS 36.213 Table 8.2-1).

use std::collections::BTreeSet;

use nextgsim_common::SRS_PERIODICITIES;

use super::error::{Resource, RrcError};

/// First configuration index of each periodicity window
const SRS_CI_LOW: [u16; 8] = [0, 2, 7, 17, 37, 77, 157, 317];
/// Last configuration index of each periodicity window
const SRS_CI_HIGH: [u16; 8] = [1, 6, 16, 36, 76, 156, 316, 636];

/// Per-cell SRS configuration index pool.
#[derive(Debug, Clone)]
pub struct SrsAllocator {
    low: u16,
    high: u16,
    allocated: BTreeSet<u16>,
}

impl SrsAllocator {
    /// Creates the pool for `periodicity` ms. Unknown periodicities fall back
    /// to the largest window.
    pub fn new(periodicity: u16) -> Self {
        let idx = SRS_PERIODICITIES
            .iter()
            .position(|p| *p == periodicity)
            .unwrap_or(SRS_PERIODICITIES.len() - 1);
        Self {
            low: SRS_CI_LOW[idx],
            high: SRS_CI_HIGH[idx],
            allocated: BTreeSet::new(),
        }
    }

    /// Number of indices in the window
    pub fn capacity(&self) -> usize {
        usize::from(self.high - self.low) + 1
    }

    pub fn in_use(&self) -> usize {
        self.allocated.len()
    }

    /// Takes the index after the highest allocated one, or the lowest free
    /// index once the top of the window has been reached.
    pub fn allocate(&mut self) -> Result<u16, RrcError> {
        let index = match self.allocated.iter().next_back() {
            None => Some(self.low),
            Some(&highest) if highest < self.high => Some(highest + 1),
            Some(_) => (self.low..=self.high).find(|i| !self.allocated.contains(i)),
        }
        .ok_or(RrcError::ResourceExhausted(Resource::MeasurementResource))?;
        self.allocated.insert(index);
        Ok(index)
    }

    /// Returns an index to the pool. Unknown indices are ignored.
    pub fn release(&mut self, index: u16) {
        self.allocated.remove(&index);
    }
}
