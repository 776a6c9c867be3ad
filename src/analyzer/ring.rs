use crate::event::HitSource;
use crate::geometry::{RingIndex, NUM_RINGS};

/// Initial per-event minimum energy; any real hit lowers it.
pub const MIN_ENERGY_INIT: f64 = 14_000.0;

/// Initial per-event maximum energy; any real hit raises it.
pub const MAX_ENERGY_INIT: f64 = -999.0;

/// Running negated vector sum of transverse energy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetVector {
    pub x: f64,
    pub y: f64,
}

impl MetVector {
    /// Subtracts a vector of magnitude `et` at angle `phi`. The angle is fed
    /// to `cos`/`sin` unchanged, whatever unit the caller stores it in.
    pub fn subtract_polar(&mut self, et: f64, phi: f64) {
        self.x -= et * phi.cos();
        self.y -= et * phi.sin();
    }

    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Azimuth in radians; 0 for a null vector.
    pub fn phi(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            0.0
        } else {
            self.y.atan2(self.x)
        }
    }
}

/// Per-event statistics of one (ring, depth) slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingDepthAggregate {
    /// At least one hit with positive energy.
    pub active: bool,
    pub active_cells: u32,
    /// Scalar sum of transverse energy.
    pub set: f64,
    pub met: MetVector,
    pub min_energy: f64,
    pub max_energy: f64,
}

impl RingDepthAggregate {
    pub const fn new() -> Self {
        Self {
            active: false,
            active_cells: 0,
            set: 0.0,
            met: MetVector { x: 0.0, y: 0.0 },
            min_energy: MIN_ENERGY_INIT,
            max_energy: MAX_ENERGY_INIT,
        }
    }

    /// Records one hit. Only positive energies count towards activity and
    /// the transverse sums; min/max track every hit.
    pub fn record(&mut self, energy: f64, et: f64, phi: f64) {
        if energy > 0.0 {
            self.active = true;
            self.active_cells += 1;
            self.set += et;
            self.met.subtract_polar(et, phi);
        }

        if energy > self.max_energy {
            self.max_energy = energy;
        }
        if energy < self.min_energy {
            self.min_energy = energy;
        }
    }
}

impl Default for RingDepthAggregate {
    fn default() -> Self {
        Self::new()
    }
}

/// (ring, depth) aggregates for one hit source, reset every event.
#[derive(Debug, Clone)]
pub struct RingAggregates {
    depths: &'static [u8],
    slots: Vec<RingDepthAggregate>,
}

impl RingAggregates {
    pub fn new(source: HitSource) -> Self {
        let depths = source.depths();
        Self {
            depths,
            slots: vec![RingDepthAggregate::new(); NUM_RINGS * depths.len()],
        }
    }

    /// Restores every slot to its initial state.
    pub fn reset(&mut self) {
        self.slots.fill(RingDepthAggregate::new());
    }

    fn index(&self, ring: RingIndex, depth: u8) -> Option<usize> {
        let pos = self.depths.iter().position(|&d| d == depth)?;
        Some(ring.get() * self.depths.len() + pos)
    }

    pub fn get(&self, ring: RingIndex, depth: u8) -> Option<&RingDepthAggregate> {
        self.index(ring, depth).map(|i| &self.slots[i])
    }

    pub fn get_mut(&mut self, ring: RingIndex, depth: u8) -> Option<&mut RingDepthAggregate> {
        self.index(ring, depth).map(move |i| &mut self.slots[i])
    }

    /// Slots in ring-major order, depth ascending within a ring.
    pub fn iter(&self) -> impl Iterator<Item = (RingIndex, u8, &RingDepthAggregate)> + '_ {
        let width = self.depths.len();
        RingIndex::all().flat_map(move |ring| {
            self.depths
                .iter()
                .enumerate()
                .map(move |(pos, &depth)| (ring, depth, &self.slots[ring.get() * width + pos]))
        })
    }

    /// Number of active slots.
    pub fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}
