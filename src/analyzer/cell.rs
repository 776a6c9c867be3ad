use std::collections::HashMap;

use crate::event::HitSource;
use crate::geometry::RingIndex;

use super::ring::{MAX_ENERGY_INIT, MIN_ENERGY_INIT};

/// Key for run-cumulative per-cell statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub ring: RingIndex,
    pub iphi: u8,
    pub depth: u8,
    pub source: HitSource,
}

impl CellKey {
    pub fn new(ring: RingIndex, iphi: u8, depth: u8, source: HitSource) -> Self {
        Self {
            ring,
            iphi,
            depth,
            source,
        }
    }
}

/// Run-cumulative statistics of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellAccumulator {
    pub hits: u64,
    /// Hits with positive energy.
    pub occupancy: u64,
    pub energy_sum: f64,
    pub min_energy: f64,
    pub max_energy: f64,
}

impl Default for CellAccumulator {
    fn default() -> Self {
        Self {
            hits: 0,
            occupancy: 0,
            energy_sum: 0.0,
            min_energy: MIN_ENERGY_INIT,
            max_energy: MAX_ENERGY_INIT,
        }
    }
}

impl CellAccumulator {
    pub fn record(&mut self, energy: f64) {
        self.hits += 1;
        self.energy_sum += energy;
        if energy > 0.0 {
            self.occupancy += 1;
        }
        if energy > self.max_energy {
            self.max_energy = energy;
        }
        if energy < self.min_energy {
            self.min_energy = energy;
        }
    }
}

/// Per-cell statistics keyed by (ring, phi, depth, source), alive for the
/// whole run. Mirrors what the per-depth cell maps hold in the sink.
#[derive(Debug, Default)]
pub struct CellLedger {
    cells: HashMap<CellKey, CellAccumulator>,
}

impl CellLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: CellKey, energy: f64) {
        self.cells.entry(key).or_default().record(energy);
    }

    pub fn get(&self, key: &CellKey) -> Option<&CellAccumulator> {
        self.cells.get(key)
    }

    /// Number of distinct cells seen.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells with at least one positive-energy hit.
    pub fn occupied(&self) -> usize {
        self.cells.values().filter(|c| c.occupancy > 0).count()
    }
}
