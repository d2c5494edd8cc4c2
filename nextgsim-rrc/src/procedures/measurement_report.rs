//! Measurement Report
//!
//! UE → gNB on UL-DCCH: serving cell RSRP/RSRQ and the strongest neighbours,
//! sent when a configured report condition (event A3) is met.
//!
//! RSRP and RSRQ are reported as range indices 0-127.

use crate::codec::{DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::ies::MAX_PCI;

/// Maximum number of neighbour cells in one report.
pub const MAX_NEIGHBOUR_RESULTS: usize = 8;

/// Highest RSRP/RSRQ range index.
pub const MAX_MEAS_QUANTITY: u8 = 127;

/// Measurement of the serving cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PCellMeasResult {
    pub rsrp: u8,
    pub rsrq: u8,
}

/// Measurement of one neighbour cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighbourMeasResult {
    /// Physical cell id (0-1007)
    pub physical_cell_id: u16,
    pub rsrp: Option<u8>,
    pub rsrq: Option<u8>,
}

impl PerCodec for NeighbourMeasResult {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, [self.rsrp.is_some(), self.rsrq.is_some()]);
        enc.integer(self.physical_cell_id as i64, 0, MAX_PCI as i64)?;
        if let Some(rsrp) = self.rsrp {
            enc.integer(rsrp as i64, 0, MAX_MEAS_QUANTITY as i64)?;
        }
        if let Some(rsrq) = self.rsrq {
            enc.integer(rsrq as i64, 0, MAX_MEAS_QUANTITY as i64)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_rsrp, has_rsrq] = dec.sequence(true)?;
        let physical_cell_id = dec.integer(0, MAX_PCI as i64)? as u16;
        let rsrp = if has_rsrp {
            Some(dec.integer(0, MAX_MEAS_QUANTITY as i64)? as u8)
        } else {
            None
        };
        let rsrq = if has_rsrq {
            Some(dec.integer(0, MAX_MEAS_QUANTITY as i64)? as u8)
        } else {
            None
        };
        Ok(Self {
            physical_cell_id,
            rsrp,
            rsrq,
        })
    }
}

/// Measurement Report (UL-DCCH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementReport {
    /// Measurement identity that triggered the report (1-32)
    pub meas_id: u8,
    pub pcell: PCellMeasResult,
    pub neighbours: Vec<NeighbourMeasResult>,
}

impl MeasurementReport {
    /// Neighbour with the highest reported RSRP.
    pub fn best_neighbour(&self) -> Option<&NeighbourMeasResult> {
        self.neighbours
            .iter()
            .filter(|n| n.rsrp.is_some())
            .max_by_key(|n| n.rsrp)
    }
}

impl PerCodec for MeasurementReport {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.meas_id as i64, 1, 32)?;
        enc.integer(self.pcell.rsrp as i64, 0, MAX_MEAS_QUANTITY as i64)?;
        enc.integer(self.pcell.rsrq as i64, 0, MAX_MEAS_QUANTITY as i64)?;
        enc.list(&self.neighbours, 0, MAX_NEIGHBOUR_RESULTS)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            meas_id: dec.integer(1, 32)? as u8,
            pcell: PCellMeasResult {
                rsrp: dec.integer(0, MAX_MEAS_QUANTITY as i64)? as u8,
                rsrq: dec.integer(0, MAX_MEAS_QUANTITY as i64)? as u8,
            },
            neighbours: dec.list(0, MAX_NEIGHBOUR_RESULTS)?,
        })
    }
}
