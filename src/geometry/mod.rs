pub mod file;
pub mod table;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of eta rings covered by the HCAL (signed eta index -41..=41).
pub const NUM_RINGS: usize = 83;

/// Number of phi segments per ring.
pub const NUM_PHI: usize = 72;

/// Offset added to a signed eta index to obtain the zero-based ring index.
pub const RING_OFFSET: i32 = 41;

/// HCAL subdetector partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subdetector {
    Barrel,
    Endcap,
    Outer,
    Forward,
}

impl Subdetector {
    /// Table build order. Earlier partitions win shared (ring, phi) cells.
    pub const BUILD_ORDER: [Subdetector; 4] = [
        Subdetector::Barrel,
        Subdetector::Endcap,
        Subdetector::Forward,
        Subdetector::Outer,
    ];

    /// Short detector label used in log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Barrel => "HB",
            Self::Endcap => "HE",
            Self::Outer => "HO",
            Self::Forward => "HF",
        }
    }
}

/// Identifies a single readout cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub subdet: Subdetector,
    /// Signed, detector-native eta index.
    pub ieta: i32,
    /// Phi index, 1..=72.
    pub iphi: i32,
    /// Longitudinal depth layer, 1..=4.
    pub depth: u8,
}

impl CellId {
    pub fn new(subdet: Subdetector, ieta: i32, iphi: i32, depth: u8) -> Self {
        Self {
            subdet,
            ieta,
            iphi,
            depth,
        }
    }

    /// Zero-based ring index (`41 + ieta`). May fall outside 0..83 for
    /// malformed ids; use [`RingIndex::from_ieta`] for a checked value.
    pub fn raw_ring(&self) -> i32 {
        RING_OFFSET + self.ieta
    }
}

/// Checked zero-based eta-ring index, 0..=82.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingIndex(u8);

impl RingIndex {
    /// Returns the ring for a signed eta index, or `None` outside -41..=41.
    pub fn from_ieta(ieta: i32) -> Option<Self> {
        Self::new(RING_OFFSET + ieta)
    }

    /// Returns the ring for a zero-based index, or `None` outside 0..=82.
    pub fn new(ring: i32) -> Option<Self> {
        if (0..NUM_RINGS as i32).contains(&ring) {
            Some(Self(ring as u8))
        } else {
            None
        }
    }

    /// Zero-based index for table rows.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    /// One-based histogram bin number (`ring + 1`).
    pub fn bin(self) -> usize {
        self.get() + 1
    }

    /// Signed eta index this ring represents.
    pub fn ieta(self) -> i32 {
        i32::from(self.0) - RING_OFFSET
    }

    /// All rings in ascending order.
    pub fn all() -> impl Iterator<Item = RingIndex> {
        (0..NUM_RINGS as u8).map(RingIndex)
    }
}

/// Physical cell centre as reported by the geometry service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub eta: f64,
    /// Azimuth in radians.
    pub phi: f64,
}

/// Errors raised by a geometry provider.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("geometry unavailable for {subdet:?}: {reason}")]
    Unavailable { subdet: Subdetector, reason: String },

    #[error("no position for cell {cell:?}")]
    UnknownCell { cell: CellId },
}

/// Cell geometry lookup consumed by the table builder.
pub trait GeometrySource {
    /// All valid cell ids of one subdetector, in a stable order.
    fn valid_cell_ids(&self, subdet: Subdetector) -> Result<Vec<CellId>, GeometryError>;

    /// Physical (eta, phi) of one cell.
    fn position(&self, cell: &CellId) -> Result<Position, GeometryError>;
}
