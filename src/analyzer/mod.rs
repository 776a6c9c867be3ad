//! Per-event HCAL rec-hit aggregation.
//!
//! [`HcalRecHitAnalyzer`] owns the geometry table and the histogram handles.
//! Each event walks the three rec-hit collections in a fixed order, updates
//! the per-cell maps hit by hit, and flushes per-(ring, depth) summaries into
//! the vs-ring distributions once the collection is exhausted.

pub mod booking;
pub mod cell;
pub mod ring;

use crate::config::{Config, InputConfig};
use crate::event::{CollectionError, Event, HitSource, RecHit};
use crate::geometry::table::{GeometryReport, GeometryTable};
use crate::geometry::{GeometrySource, RingIndex, Subdetector};
use crate::sink::{HistogramSink, SinkError};

use self::booking::{BookedHistograms, Binning};
use self::cell::{CellKey, CellLedger};
use self::ring::RingAggregates;

/// Hit counts of one processed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub event_id: u64,
    pub barrel_hits: usize,
    pub endcap_hits: usize,
    pub outer_hits: usize,
    pub forward_hits: usize,
    /// Hits with positive energy.
    pub active_hits: usize,
    /// Hits rejected by the index guards.
    pub skipped_hits: usize,
}

impl EventSummary {
    pub fn total_hits(&self) -> usize {
        self.barrel_hits + self.endcap_hits + self.outer_hits + self.forward_hits
    }
}

/// Result of [`HcalRecHitAnalyzer::process`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Processed(EventSummary),
    /// A required collection was missing or invalid; only the event counter
    /// moved.
    Skipped(CollectionError),
}

impl EventOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed(_))
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events: u64,
    pub processed_events: u64,
    pub skipped_events: u64,
    pub hits: u64,
    pub skipped_hits: u64,
}

/// Reason a hit was rejected before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HitRejection {
    Ring,
    Phi,
    Depth,
    Subdetector,
}

impl HitRejection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ring => "ring_out_of_range",
            Self::Phi => "phi_out_of_range",
            Self::Depth => "depth_not_served",
            Self::Subdetector => "foreign_subdetector",
        }
    }
}

/// Accumulates HCAL rec-hit distributions over a run.
pub struct HcalRecHitAnalyzer {
    input: InputConfig,
    debug: bool,
    table: GeometryTable,
    report: GeometryReport,
    histograms: BookedHistograms,
    cells: CellLedger,
    /// Scratch aggregates indexed like [`HitSource::ALL`].
    rings: [RingAggregates; 3],
    stats: RunStats,
}

impl HcalRecHitAnalyzer {
    /// Books all histograms, builds the geometry table and publishes it.
    ///
    /// A geometry source that fails part-way leaves a partial table; the
    /// analyzer still starts and [`Self::geometry_report`] records it.
    pub fn initialize<G, S>(config: &Config, geometry: &G, sink: &mut S) -> Result<Self, SinkError>
    where
        G: GeometrySource + ?Sized,
        S: HistogramSink + ?Sized,
    {
        let binning = Binning::select(config.fine_binning);
        let histograms = booking::book(sink, &config.folder, &binning)?;

        let (table, report) = GeometryTable::build(geometry);
        booking::publish_geometry(sink, &histograms.geometry, &table);

        tracing::info!(
            sink = sink.name(),
            folder = %config.folder,
            fine_binning = config.fine_binning,
            populated_cells = table.populated_cells(),
            geometry_complete = report.complete,
            "initialized rec-hit analyzer",
        );

        Ok(Self {
            input: config.input.clone(),
            debug: config.debug,
            table,
            report,
            histograms,
            cells: CellLedger::new(),
            rings: HitSource::ALL.map(RingAggregates::new),
            stats: RunStats::default(),
        })
    }

    /// Processes one event.
    ///
    /// The event counter is filled first. If any of the three collections is
    /// missing or invalid, nothing else changes.
    pub fn process<S: HistogramSink + ?Sized>(&mut self, event: &Event, sink: &mut S) -> EventOutcome {
        self.stats.events += 1;
        sink.fill_1d(self.histograms.nevents, 0.0, 1.0);

        let collections = match self.resolve(event) {
            Ok(collections) => collections,
            Err(e) => {
                self.stats.skipped_events += 1;
                tracing::warn!(event = event.id, error = %e, "skipping event");
                return EventOutcome::Skipped(e);
            }
        };

        let mut summary = EventSummary {
            event_id: event.id,
            ..Default::default()
        };

        for (slot, (source, hits)) in HitSource::ALL.into_iter().zip(collections).enumerate() {
            self.rings[slot].reset();
            self.aggregate(slot, source, hits, sink, &mut summary);
            self.flush(slot, source, sink);
        }

        self.stats.processed_events += 1;
        self.stats.hits += summary.total_hits() as u64;
        self.stats.skipped_hits += summary.skipped_hits as u64;

        tracing::debug!(
            event = event.id,
            hits = summary.total_hits(),
            active = summary.active_hits,
            skipped = summary.skipped_hits,
            "processed event",
        );

        EventOutcome::Processed(summary)
    }

    /// Logs the run totals and returns the number of events seen.
    pub fn finalize(&self) -> u64 {
        tracing::info!(
            events = self.stats.events,
            processed = self.stats.processed_events,
            skipped = self.stats.skipped_events,
            hits = self.stats.hits,
            skipped_hits = self.stats.skipped_hits,
            cells = self.cells.len(),
            occupied_cells = self.cells.occupied(),
            "rec-hit analyzer finished",
        );
        self.stats.events
    }

    pub fn table(&self) -> &GeometryTable {
        &self.table
    }

    pub fn geometry_report(&self) -> &GeometryReport {
        &self.report
    }

    pub fn histograms(&self) -> &BookedHistograms {
        &self.histograms
    }

    pub fn cells(&self) -> &CellLedger {
        &self.cells
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// (ring, depth) aggregates of the last processed event for `source`.
    pub fn ring_aggregates(&self, source: HitSource) -> &RingAggregates {
        let slot = HitSource::ALL
            .iter()
            .position(|&s| s == source)
            .unwrap_or_default();
        &self.rings[slot]
    }

    fn resolve<'e>(&self, event: &'e Event) -> Result<[&'e [RecHit]; 3], CollectionError> {
        let hbhe = event.collection(HitSource::Hbhe.label(&self.input))?;
        let ho = event.collection(HitSource::Ho.label(&self.input))?;
        let hf = event.collection(HitSource::Hf.label(&self.input))?;
        Ok([hbhe, ho, hf])
    }

    fn aggregate<S: HistogramSink + ?Sized>(
        &mut self,
        slot: usize,
        source: HitSource,
        hits: &[RecHit],
        sink: &mut S,
        summary: &mut EventSummary,
    ) {
        for hit in hits {
            match hit.id.subdet {
                Subdetector::Barrel => summary.barrel_hits += 1,
                Subdetector::Endcap => summary.endcap_hits += 1,
                Subdetector::Outer => summary.outer_hits += 1,
                Subdetector::Forward => summary.forward_hits += 1,
            }

            if let Err(reason) = self.record_hit(slot, source, hit, sink) {
                summary.skipped_hits += 1;
                tracing::debug!(
                    source = source.as_str(),
                    subdet = hit.id.subdet.as_str(),
                    ieta = hit.id.ieta,
                    iphi = hit.id.iphi,
                    depth = hit.id.depth,
                    reason = reason.as_str(),
                    "skipping rec hit",
                );
                continue;
            }

            if hit.energy > 0.0 {
                summary.active_hits += 1;
            }
        }
    }

    fn record_hit<S: HistogramSink + ?Sized>(
        &mut self,
        slot: usize,
        source: HitSource,
        hit: &RecHit,
        sink: &mut S,
    ) -> Result<(), HitRejection> {
        if !source.serves(hit.id.subdet) {
            return Err(HitRejection::Subdetector);
        }
        let ring = RingIndex::from_ieta(hit.id.ieta).ok_or(HitRejection::Ring)?;
        let depth = source
            .aggregation_depth(hit.id.depth)
            .ok_or(HitRejection::Depth)?;
        let entry = self
            .table
            .entry(ring, hit.id.iphi)
            .ok_or(HitRejection::Phi)?;
        let hists = self.histograms.depth(depth).ok_or(HitRejection::Depth)?;

        let energy = hit.energy;
        let theta = 2.0 * (-entry.eta).exp().atan();
        let et = energy * theta.sin();

        // The stored degree value goes into the vector sum as-is.
        if let Some(aggregate) = self.rings[slot].get_mut(ring, depth) {
            aggregate.record(energy, et, entry.phi_deg);
        }
        // iphi is 1..=72 once the table lookup succeeded.
        let iphi = hit.id.iphi as u8;
        self.cells
            .record(CellKey::new(ring, iphi, depth, source), energy);

        let ieta = f64::from(hit.id.ieta);
        let iphi_x = f64::from(hit.id.iphi);
        let iphi_bin = usize::from(iphi);

        if energy > 0.0 {
            sink.fill_2d(hists.occupancy_map, ieta, iphi_x, 1.0);
        }
        sink.fill_2d(hists.energy_map, ieta, iphi_x, energy);
        sink.fill_2d(hists.energy_vs_ring, ieta, energy, 1.0);

        if energy > sink.bin_content(hists.max_energy_map, ring.bin(), iphi_bin) {
            sink.set_bin_content(hists.max_energy_map, ring.bin(), iphi_bin, energy);
        }
        if energy < sink.bin_content(hists.min_energy_map, ring.bin(), iphi_bin) {
            sink.set_bin_content(hists.min_energy_map, ring.bin(), iphi_bin, energy);
        }

        if self.debug {
            tracing::debug!(
                source = source.as_str(),
                subdet = hit.id.subdet.as_str(),
                ieta = hit.id.ieta,
                iphi = hit.id.iphi,
                depth,
                energy,
                et,
                eta = entry.eta,
                phi_deg = entry.phi_deg,
                "rec hit",
            );
        }

        Ok(())
    }

    /// Writes the per-(ring, depth) summaries of one source.
    fn flush<S: HistogramSink + ?Sized>(&self, slot: usize, source: HitSource, sink: &mut S) {
        let mut active = 0usize;
        for (ring, depth, aggregate) in self.rings[slot].iter() {
            let Some(hists) = self.histograms.depth(depth) else {
                continue;
            };
            let x = f64::from(ring.ieta());

            sink.fill_2d(hists.max_energy_vs_ring, x, aggregate.max_energy, 1.0);
            sink.fill_2d(hists.min_energy_vs_ring, x, aggregate.min_energy, 1.0);

            if !aggregate.active {
                continue;
            }
            active += 1;
            sink.fill_2d(hists.met_phi_vs_ring, x, aggregate.met.phi(), 1.0);
            sink.fill_2d(hists.mex_vs_ring, x, aggregate.met.x, 1.0);
            sink.fill_2d(hists.mey_vs_ring, x, aggregate.met.y, 1.0);
            sink.fill_2d(hists.met_vs_ring, x, aggregate.met.magnitude(), 1.0);
            sink.fill_2d(hists.set_vs_ring, x, aggregate.set, 1.0);
            sink.fill_2d(
                hists.occupancy_vs_ring,
                x,
                f64::from(aggregate.active_cells),
                1.0,
            );
        }

        if self.debug {
            tracing::debug!(source = source.as_str(), active_slots = active, "flushed rings");
        }
    }
}
