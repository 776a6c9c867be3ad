//! Geometry-derived eta/phi lookup tables.
//!
//! The table maps every (ring, phi) cell to the physical eta and phi (in
//! degrees) of the first subdetector that reports it, and every ring to an
//! angular cell size. It is built once at start-up and read-only afterwards.

use super::{
    CellId, GeometryError, GeometrySource, RingIndex, Subdetector, NUM_PHI, NUM_RINGS, RING_OFFSET,
};

/// Marker for table entries that no geometry record populated.
pub const UNSET: f64 = -999.0;

/// Phi index sampled when deriving ring cell sizes.
const CELL_SIZE_PHI: i32 = 3;

/// Low edge forced after ring 29 to absorb the HE/HF overlap.
const HF_LOW_EDGE: f64 = 2.964;

/// Angular size of the cells in one ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSize {
    pub deta: f64,
    /// Width in degrees.
    pub dphi: f64,
}

impl CellSize {
    const UNSET: CellSize = CellSize {
        deta: UNSET,
        dphi: UNSET,
    };
}

/// Table entry for one (ring, phi) cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub eta: f64,
    pub phi_deg: f64,
}

impl TableEntry {
    const UNSET: TableEntry = TableEntry {
        eta: UNSET,
        phi_deg: UNSET,
    };

    /// Whether a geometry record has written this entry.
    pub fn is_set(&self) -> bool {
        self.eta != UNSET
    }
}

/// Observed index ranges of one subdetector, for diagnostics only.
///
/// Ranges are expressed in one-based ring bins (`42 + ieta`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubdetectorRange {
    pub subdet: Subdetector,
    pub cells: usize,
    pub min_ieta: i32,
    pub max_ieta: i32,
    pub min_iphi: i32,
    pub max_iphi: i32,
}

impl SubdetectorRange {
    fn new(subdet: Subdetector) -> Self {
        Self {
            subdet,
            cells: 0,
            min_ieta: 99,
            max_ieta: -99,
            min_iphi: 99,
            max_iphi: -99,
        }
    }

    fn observe(&mut self, ieta_bin: i32, iphi: i32) {
        self.cells += 1;
        if ieta_bin > self.max_ieta {
            self.max_ieta = ieta_bin;
        }
        if ieta_bin < self.min_ieta {
            self.min_ieta = ieta_bin;
        }
        if iphi > self.max_iphi {
            self.max_iphi = iphi;
        }
        // Compares against max_iphi after it was raised, so min_iphi never
        // moves from its initial value.
        if iphi > self.max_iphi {
            self.min_iphi = iphi;
        }
    }
}

/// Outcome of a table build.
#[derive(Debug, Clone, Default)]
pub struct GeometryReport {
    /// Per-subdetector ranges in build order.
    pub ranges: Vec<SubdetectorRange>,
    /// Cells whose indices fall outside the table.
    pub skipped_cells: usize,
    /// False when the geometry source failed and the table is partial.
    pub complete: bool,
}

/// Per-cell eta/phi lookup plus per-ring cell sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTable {
    entries: Vec<TableEntry>,
    cell_sizes: [CellSize; NUM_RINGS],
}

impl Default for GeometryTable {
    fn default() -> Self {
        Self::unset()
    }
}

impl GeometryTable {
    /// A table with every entry at the [`UNSET`] sentinel.
    pub fn unset() -> Self {
        Self {
            entries: vec![TableEntry::UNSET; NUM_RINGS * NUM_PHI],
            cell_sizes: [CellSize::UNSET; NUM_RINGS],
        }
    }

    /// Builds the table from a geometry source.
    ///
    /// A failing source is logged and leaves the table partially populated;
    /// `report.complete` tells the two apart.
    pub fn build<G: GeometrySource + ?Sized>(source: &G) -> (Self, GeometryReport) {
        let mut table = Self::unset();
        let mut report = GeometryReport::default();

        match table.populate(source, &mut report) {
            Ok(()) => {
                table.derive_cell_sizes();
                report.complete = true;
                log_ranges(&report);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    populated = table.populated_cells(),
                    "failed to read geometry, aborting table build",
                );
            }
        }

        (table, report)
    }

    fn populate<G: GeometrySource + ?Sized>(
        &mut self,
        source: &G,
        report: &mut GeometryReport,
    ) -> Result<(), GeometryError> {
        // Every subdetector must be reachable before anything is written.
        let mut cell_sets: Vec<(Subdetector, Vec<CellId>)> = Vec::with_capacity(4);
        for subdet in Subdetector::BUILD_ORDER {
            cell_sets.push((subdet, source.valid_cell_ids(subdet)?));
        }

        for (subdet, cells) in cell_sets {
            let mut range = SubdetectorRange::new(subdet);

            for cell in &cells {
                let position = source.position(cell)?;

                let Some(slot) = slot(cell.raw_ring(), cell.iphi) else {
                    tracing::debug!(?cell, "cell outside ring/phi table, skipping");
                    report.skipped_cells += 1;
                    continue;
                };

                let entry = &mut self.entries[slot];
                if !entry.is_set() {
                    *entry = TableEntry {
                        eta: position.eta,
                        phi_deg: position.phi.to_degrees(),
                    };
                }

                range.observe(cell.raw_ring() + 1, cell.iphi);
            }

            report.ranges.push(range);
        }

        Ok(())
    }

    /// Walks the positive rings outwards, accumulating a running low edge.
    fn derive_cell_sizes(&mut self) {
        let mut low_edge = 0.0_f64;

        for ieta in 1..=RING_OFFSET {
            let sample = slot(RING_OFFSET + ieta, CELL_SIZE_PHI)
                .map_or(TableEntry::UNSET, |s| self.entries[s]);

            let mut deta = round_millis(2.0 * (sample.eta - low_edge));
            let dphi = match ieta {
                1..=20 => 5.0,
                21..=39 => 10.0,
                // 40 and 41, the last rings the loop reaches.
                _ => 20.0,
            };

            // Provisional HE/HF overlap correction, known to be inaccurate.
            match ieta {
                28 => deta = 0.218,
                29 => deta = 0.096,
                _ => {}
            }

            low_edge += deta;
            if ieta == 29 {
                low_edge = HF_LOW_EDGE;
            }

            let size = CellSize { deta, dphi };
            self.cell_sizes[(RING_OFFSET + ieta) as usize] = size;
            self.cell_sizes[(RING_OFFSET - ieta) as usize] = size;
        }
    }

    /// Entry at `(ring, iphi)`, or `None` when `iphi` is outside 1..=72.
    /// Unpopulated entries carry the [`UNSET`] sentinel.
    pub fn entry(&self, ring: RingIndex, iphi: i32) -> Option<TableEntry> {
        slot(ring.get() as i32, iphi).map(|s| self.entries[s])
    }

    /// Cell size of one ring; [`UNSET`] until derived.
    pub fn cell_size(&self, ring: RingIndex) -> CellSize {
        self.cell_sizes[ring.get()]
    }

    /// Number of populated (ring, phi) entries.
    pub fn populated_cells(&self) -> usize {
        self.entries.iter().filter(|e| e.is_set()).count()
    }

    /// All entries as `(ring, iphi, entry)` in ring-major order.
    pub fn entries(&self) -> impl Iterator<Item = (RingIndex, i32, TableEntry)> + '_ {
        RingIndex::all().flat_map(move |ring| {
            (1..=NUM_PHI as i32).map(move |iphi| {
                let entry = self.entries[ring.get() * NUM_PHI + (iphi - 1) as usize];
                (ring, iphi, entry)
            })
        })
    }
}

/// Flat index for a zero-based ring and one-based phi.
fn slot(ring: i32, iphi: i32) -> Option<usize> {
    let ring = RingIndex::new(ring)?;
    if !(1..=NUM_PHI as i32).contains(&iphi) {
        return None;
    }
    Some(ring.get() * NUM_PHI + (iphi - 1) as usize)
}

/// Rounds to three decimals, truncating through single precision.
fn round_millis(value: f64) -> f64 {
    f64::from((1.0e3 * value + 0.5) as i32 as f32) / 1.0e3
}

fn log_ranges(report: &GeometryReport) {
    for range in &report.ranges {
        tracing::info!(
            subdet = range.subdet.as_str(),
            cells = range.cells,
            min_ieta = range.min_ieta,
            max_ieta = range.max_ieta,
            min_iphi = range.min_iphi,
            max_iphi = range.max_iphi,
            "geometry index range",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::file::{FileGeometry, GeometryCell};
    use crate::geometry::Position;
    use approx::assert_abs_diff_eq;

    fn cell(subdet: Subdetector, ieta: i32, iphi: i32, eta: f64, phi: f64) -> GeometryCell {
        GeometryCell {
            cell: CellId::new(subdet, ieta, iphi, 1),
            eta,
            phi,
        }
    }

    /// One cell per positive ring at phi index 3 with a uniform eta pitch.
    fn positive_rings(pitch: f64) -> Vec<GeometryCell> {
        (1..=41)
            .map(|ieta| {
                let subdet = if ieta <= 16 {
                    Subdetector::Barrel
                } else if ieta <= 29 {
                    Subdetector::Endcap
                } else {
                    Subdetector::Forward
                };
                cell(subdet, ieta, 3, (f64::from(ieta) - 0.5) * pitch, 0.1)
            })
            .collect()
    }

    struct FailingGeometry;

    impl GeometrySource for FailingGeometry {
        fn valid_cell_ids(&self, subdet: Subdetector) -> Result<Vec<CellId>, GeometryError> {
            Err(GeometryError::Unavailable {
                subdet,
                reason: "no geometry record".into(),
            })
        }

        fn position(&self, cell: &CellId) -> Result<Position, GeometryError> {
            Err(GeometryError::UnknownCell { cell: *cell })
        }
    }

    /// Serves real ids but cannot place any cell after the first `limit`.
    struct TruncatedGeometry {
        inner: FileGeometry,
        limit: usize,
        served: std::cell::Cell<usize>,
    }

    impl GeometrySource for TruncatedGeometry {
        fn valid_cell_ids(&self, subdet: Subdetector) -> Result<Vec<CellId>, GeometryError> {
            self.inner.valid_cell_ids(subdet)
        }

        fn position(&self, cell: &CellId) -> Result<Position, GeometryError> {
            let n = self.served.get();
            if n >= self.limit {
                return Err(GeometryError::UnknownCell { cell: *cell });
            }
            self.served.set(n + 1);
            self.inner.position(cell)
        }
    }

    #[test]
    fn test_unset_table_is_sentinel_filled() {
        let table = GeometryTable::unset();
        let ring = RingIndex::from_ieta(5).expect("ring");
        let entry = table.entry(ring, 10).expect("entry");
        assert_eq!(entry.eta, UNSET);
        assert_eq!(entry.phi_deg, UNSET);
        assert_eq!(table.cell_size(ring), CellSize::UNSET);
        assert_eq!(table.populated_cells(), 0);
    }

    #[test]
    fn test_entry_stores_phi_in_degrees() {
        let geometry = FileGeometry::from_cells([cell(Subdetector::Barrel, 5, 10, 0.6, 1.2)]);
        let (table, report) = GeometryTable::build(&geometry);
        assert!(report.complete);

        let entry = table
            .entry(RingIndex::from_ieta(5).expect("ring"), 10)
            .expect("entry");
        assert_eq!(entry.eta, 0.6);
        assert_abs_diff_eq!(entry.phi_deg, 1.2 * 180.0 / std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_first_writer_wins_across_subdetectors() {
        // Endcap is read before outer; both report ring 46 phi 10.
        let geometry = FileGeometry::from_cells([
            cell(Subdetector::Outer, 5, 10, 0.9, 0.9),
            cell(Subdetector::Endcap, 5, 10, 0.4, 0.4),
        ]);
        let (table, _) = GeometryTable::build(&geometry);
        let entry = table
            .entry(RingIndex::from_ieta(5).expect("ring"), 10)
            .expect("entry");
        assert_eq!(entry.eta, 0.4);
    }

    #[test]
    fn test_first_writer_wins_within_subdetector_depths() {
        let mut deep = cell(Subdetector::Barrel, 5, 10, 0.7, 0.0);
        deep.cell.depth = 2;
        let geometry = FileGeometry::from_cells([cell(Subdetector::Barrel, 5, 10, 0.6, 0.0), deep]);
        let (table, _) = GeometryTable::build(&geometry);
        let entry = table
            .entry(RingIndex::from_ieta(5).expect("ring"), 10)
            .expect("entry");
        assert_eq!(entry.eta, 0.6);
    }

    #[test]
    fn test_overlap_overrides_are_fixed() {
        for pitch in [0.087, 0.05, 0.2] {
            let geometry = FileGeometry::from_cells(positive_rings(pitch));
            let (table, _) = GeometryTable::build(&geometry);
            assert_eq!(table.cell_size(RingIndex::from_ieta(28).expect("ring")).deta, 0.218);
            assert_eq!(table.cell_size(RingIndex::from_ieta(29).expect("ring")).deta, 0.096);
        }
    }

    #[test]
    fn test_overrides_hold_without_geometry() {
        let (table, report) = GeometryTable::build(&FileGeometry::default());
        assert!(report.complete);
        assert_eq!(table.cell_size(RingIndex::from_ieta(-28).expect("ring")).deta, 0.218);
        assert_eq!(table.cell_size(RingIndex::from_ieta(-29).expect("ring")).deta, 0.096);
    }

    #[test]
    fn test_low_edge_forced_after_ring_29() {
        let mut cells = positive_rings(0.087);
        // Ring 30 centre at 3.1: deta = 2 * (3.1 - 2.964) = 0.272.
        cells[29] = cell(Subdetector::Forward, 30, 3, 3.1, 0.1);
        let geometry = FileGeometry::from_cells(cells);
        let (table, _) = GeometryTable::build(&geometry);
        let deta = table.cell_size(RingIndex::from_ieta(30).expect("ring")).deta;
        assert_abs_diff_eq!(deta, 0.272, epsilon = 1e-6);
    }

    #[test]
    fn test_first_ring_cell_size() {
        let geometry = FileGeometry::from_cells(positive_rings(0.087));
        let (table, _) = GeometryTable::build(&geometry);
        // Ring 1 centre at 0.0435 from a zero low edge.
        let size = table.cell_size(RingIndex::from_ieta(1).expect("ring"));
        assert_abs_diff_eq!(size.deta, 0.087, epsilon = 1e-6);
        assert_eq!(size.dphi, 5.0);
    }

    #[test]
    fn test_dphi_bands() {
        let geometry = FileGeometry::from_cells(positive_rings(0.087));
        let (table, _) = GeometryTable::build(&geometry);
        let dphi = |ieta| table.cell_size(RingIndex::from_ieta(ieta).expect("ring")).dphi;
        assert_eq!(dphi(20), 5.0);
        assert_eq!(dphi(21), 10.0);
        assert_eq!(dphi(39), 10.0);
        assert_eq!(dphi(40), 20.0);
        assert_eq!(dphi(41), 20.0);
        assert_eq!(dphi(-41), 20.0);
    }

    #[test]
    fn test_negative_rings_mirror_positive() {
        let geometry = FileGeometry::from_cells(positive_rings(0.087));
        let (table, _) = GeometryTable::build(&geometry);
        for ieta in 1..=41 {
            let pos = table.cell_size(RingIndex::from_ieta(ieta).expect("ring"));
            let neg = table.cell_size(RingIndex::from_ieta(-ieta).expect("ring"));
            assert_eq!(pos, neg, "ring {ieta}");
        }
        // Ring zero has no physical cells and is never derived.
        assert_eq!(
            table.cell_size(RingIndex::from_ieta(0).expect("ring")),
            CellSize::UNSET
        );
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(0.0874), 0.087);
        assert_eq!(round_millis(0.0876), 0.088);
        assert_abs_diff_eq!(round_millis(0.17400001), 0.174, epsilon = 1e-9);
    }

    #[test]
    fn test_build_is_deterministic() {
        let cells = positive_rings(0.087);
        let (a, _) = GeometryTable::build(&FileGeometry::from_cells(cells.clone()));
        let (b, _) = GeometryTable::build(&FileGeometry::from_cells(cells));
        let bits = |t: &GeometryTable| -> Vec<(u64, u64)> {
            t.entries()
                .map(|(_, _, e)| (e.eta.to_bits(), e.phi_deg.to_bits()))
                .chain(
                    RingIndex::all()
                        .map(|r| (t.cell_size(r).deta.to_bits(), t.cell_size(r).dphi.to_bits())),
                )
                .collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_unavailable_geometry_leaves_sentinels() {
        let (table, report) = GeometryTable::build(&FailingGeometry);
        assert!(!report.complete);
        assert!(report.ranges.is_empty());
        assert_eq!(table, GeometryTable::unset());
    }

    #[test]
    fn test_failure_mid_build_keeps_partial_entries() {
        let geometry = TruncatedGeometry {
            inner: FileGeometry::from_cells(positive_rings(0.087)),
            limit: 3,
            served: std::cell::Cell::new(0),
        };
        let (table, report) = GeometryTable::build(&geometry);
        assert!(!report.complete);
        assert_eq!(table.populated_cells(), 3);
        // Cell sizes are never derived from a partial table.
        assert_eq!(
            table.cell_size(RingIndex::from_ieta(28).expect("ring")),
            CellSize::UNSET
        );
    }

    #[test]
    fn test_out_of_range_cells_skipped() {
        let geometry = FileGeometry::from_cells([
            cell(Subdetector::Forward, 42, 3, 5.0, 0.0),
            cell(Subdetector::Barrel, 1, 73, 0.04, 0.0),
            cell(Subdetector::Barrel, 1, 3, 0.04, 0.0),
        ]);
        let (table, report) = GeometryTable::build(&geometry);
        assert_eq!(report.skipped_cells, 2);
        assert_eq!(table.populated_cells(), 1);
    }

    #[test]
    fn test_range_report_keeps_min_iphi_initial() {
        let geometry = FileGeometry::from_cells([
            cell(Subdetector::Barrel, -16, 1, -1.3, 0.0),
            cell(Subdetector::Barrel, 16, 72, 1.3, 0.0),
        ]);
        let (_, report) = GeometryTable::build(&geometry);
        let hb = report.ranges[0];
        assert_eq!(hb.subdet, Subdetector::Barrel);
        assert_eq!(hb.cells, 2);
        assert_eq!(hb.min_ieta, 26);
        assert_eq!(hb.max_ieta, 58);
        assert_eq!(hb.max_iphi, 72);
        assert_eq!(hb.min_iphi, 99);
        assert_eq!(report.ranges.len(), 4);
    }
}
