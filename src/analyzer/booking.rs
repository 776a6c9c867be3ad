//! Histogram booking for the rec-hit monitor.
//!
//! Everything is booked once during initialization; the returned handles are
//! the only way the analyzer addresses the sink afterwards.

use crate::geometry::table::{GeometryTable, UNSET};
use crate::geometry::{RingIndex, NUM_PHI, NUM_RINGS};
use crate::sink::histogram::Axis;
use crate::sink::{HistId, HistogramSink, SinkError};

use super::ring::{MAX_ENERGY_INIT, MIN_ENERGY_INIT};

/// Number of depth layers with their own histogram families.
pub const NUM_DEPTHS: usize = 4;

const PREFIX: &str = "METTask_HCAL";

/// Signed eta index axis: one bin per ring.
const RING_AXIS: Axis = Axis::new(NUM_RINGS, -41.0, 42.0);

/// Phi index axis.
const PHI_AXIS: Axis = Axis::new(NUM_PHI, 1.0, 73.0);

/// Y axes of the vs-ring distributions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binning {
    pub energy: Axis,
    pub transverse: Axis,
    pub components: Axis,
    pub met_phi: Axis,
    pub occupancy: Axis,
}

impl Binning {
    pub const COARSE: Binning = Binning {
        energy: Axis::new(1000, -10.0, 1990.0),
        transverse: Axis::new(1000, 0.0, 2000.0),
        components: Axis::new(500, -500.0, 500.0),
        met_phi: Axis::new(80, -4.0, 4.0),
        occupancy: Axis::new(73, 0.0, 73.0),
    };

    pub const FINE: Binning = Binning {
        energy: Axis::new(20101, -100.0, 2001.0),
        transverse: Axis::new(20001, 0.0, 2001.0),
        components: Axis::new(10001, -500.0, 501.0),
        met_phi: Axis::new(80, -4.0, 4.0),
        occupancy: Axis::new(73, 0.0, 73.0),
    };

    pub fn select(fine: bool) -> Self {
        if fine {
            Self::FINE
        } else {
            Self::COARSE
        }
    }
}

/// Geometry maps published from the table.
#[derive(Debug, Clone, Copy)]
pub struct GeometryHistograms {
    pub eta_map: HistId,
    pub phi_map: HistId,
    pub deta_map: HistId,
    pub dphi_map: HistId,
}

/// Histogram handles of one depth layer.
#[derive(Debug, Clone, Copy)]
pub struct DepthHistograms {
    pub energy_map: HistId,
    pub min_energy_map: HistId,
    pub max_energy_map: HistId,
    pub occupancy_map: HistId,

    pub energy_vs_ring: HistId,
    pub min_energy_vs_ring: HistId,
    pub max_energy_vs_ring: HistId,
    pub occupancy_vs_ring: HistId,
    pub set_vs_ring: HistId,
    pub met_vs_ring: HistId,
    pub met_phi_vs_ring: HistId,
    pub mex_vs_ring: HistId,
    pub mey_vs_ring: HistId,
}

/// Every histogram handle the analyzer fills.
#[derive(Debug, Clone)]
pub struct BookedHistograms {
    pub geometry: GeometryHistograms,
    pub nevents: HistId,
    depths: [DepthHistograms; NUM_DEPTHS],
}

impl BookedHistograms {
    /// Handles for depth 1..=4.
    pub fn depth(&self, depth: u8) -> Option<&DepthHistograms> {
        usize::from(depth)
            .checked_sub(1)
            .and_then(|i| self.depths.get(i))
    }
}

/// Folder holding the geometry maps.
pub fn geometry_folder(root: &str) -> String {
    format!("{root}/geometry")
}

/// Folder holding the per-event data histograms.
pub fn data_folder(root: &str) -> String {
    format!("{root}/data")
}

/// Books every histogram family under `root`.
pub fn book<S: HistogramSink + ?Sized>(
    sink: &mut S,
    root: &str,
    binning: &Binning,
) -> Result<BookedHistograms, SinkError> {
    let geo = geometry_folder(root);
    let data = data_folder(root);

    let geometry = GeometryHistograms {
        eta_map: sink.book_2d(&geo, &format!("{PREFIX}_ieta_iphi_etaMap"), RING_AXIS, PHI_AXIS)?,
        phi_map: sink.book_2d(&geo, &format!("{PREFIX}_ieta_iphi_phiMap"), RING_AXIS, PHI_AXIS)?,
        deta_map: sink.book_1d(&geo, &format!("{PREFIX}_ieta_detaMap"), RING_AXIS)?,
        dphi_map: sink.book_1d(&geo, &format!("{PREFIX}_ieta_dphiMap"), RING_AXIS)?,
    };
    for bin in 1..=NUM_RINGS {
        for iphi in 1..=NUM_PHI {
            sink.set_bin_content(geometry.eta_map, bin, iphi, UNSET);
            sink.set_bin_content(geometry.phi_map, bin, iphi, UNSET);
        }
        sink.set_bin_content(geometry.deta_map, bin, 0, UNSET);
        sink.set_bin_content(geometry.dphi_map, bin, 0, UNSET);
    }

    let nevents = sink.book_1d(&data, &format!("{PREFIX}_Nevents"), Axis::new(1, 0.0, 1.0))?;

    let depths = [
        book_depth(sink, &data, 1, binning)?,
        book_depth(sink, &data, 2, binning)?,
        book_depth(sink, &data, 3, binning)?,
        book_depth(sink, &data, 4, binning)?,
    ];

    Ok(BookedHistograms {
        geometry,
        nevents,
        depths,
    })
}

fn book_depth<S: HistogramSink + ?Sized>(
    sink: &mut S,
    folder: &str,
    depth: u8,
    binning: &Binning,
) -> Result<DepthHistograms, SinkError> {
    let name = |family: &str| format!("{PREFIX}_D{depth}_{family}");

    let hists = DepthHistograms {
        energy_map: sink.book_2d(folder, &name("energy_ieta_iphi"), RING_AXIS, PHI_AXIS)?,
        min_energy_map: sink.book_2d(folder, &name("Minenergy_ieta_iphi"), RING_AXIS, PHI_AXIS)?,
        max_energy_map: sink.book_2d(folder, &name("Maxenergy_ieta_iphi"), RING_AXIS, PHI_AXIS)?,
        occupancy_map: sink.book_2d(folder, &name("Occ_ieta_iphi"), RING_AXIS, PHI_AXIS)?,

        energy_vs_ring: sink.book_2d(folder, &name("energyvsieta"), RING_AXIS, binning.energy)?,
        min_energy_vs_ring: sink.book_2d(
            folder,
            &name("Minenergyvsieta"),
            RING_AXIS,
            binning.energy,
        )?,
        max_energy_vs_ring: sink.book_2d(
            folder,
            &name("Maxenergyvsieta"),
            RING_AXIS,
            binning.energy,
        )?,
        occupancy_vs_ring: sink.book_2d(folder, &name("Occvsieta"), RING_AXIS, binning.occupancy)?,
        set_vs_ring: sink.book_2d(folder, &name("SETvsieta"), RING_AXIS, binning.transverse)?,
        met_vs_ring: sink.book_2d(folder, &name("METvsieta"), RING_AXIS, binning.transverse)?,
        met_phi_vs_ring: sink.book_2d(folder, &name("METPhivsieta"), RING_AXIS, binning.met_phi)?,
        mex_vs_ring: sink.book_2d(folder, &name("MExvsieta"), RING_AXIS, binning.components)?,
        mey_vs_ring: sink.book_2d(folder, &name("MEyvsieta"), RING_AXIS, binning.components)?,
    };

    // The extremum maps include the phi overflow row.
    for bin in 1..=NUM_RINGS {
        for iphi in 1..=NUM_PHI + 1 {
            sink.set_bin_content(hists.min_energy_map, bin, iphi, MIN_ENERGY_INIT);
            sink.set_bin_content(hists.max_energy_map, bin, iphi, MAX_ENERGY_INIT);
        }
    }

    Ok(hists)
}

/// Copies the geometry table into the geometry maps. Unpopulated entries
/// keep the sentinel.
pub fn publish_geometry<S: HistogramSink + ?Sized>(
    sink: &mut S,
    hists: &GeometryHistograms,
    table: &GeometryTable,
) {
    for (ring, iphi, entry) in table.entries() {
        if !entry.is_set() {
            continue;
        }
        let iphi = iphi as usize;
        sink.set_bin_content(hists.eta_map, ring.bin(), iphi, entry.eta);
        sink.set_bin_content(hists.phi_map, ring.bin(), iphi, entry.phi_deg);
    }
    for ring in RingIndex::all() {
        let size = table.cell_size(ring);
        sink.set_bin_content(hists.deta_map, ring.bin(), 0, size.deta);
        sink.set_bin_content(hists.dphi_map, ring.bin(), 0, size.dphi);
    }
}
