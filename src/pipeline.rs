//! Job driver: geometry file and event file in, histogram artifact out.

use std::path::Path;

use anyhow::{Context, Result};

use crate::analyzer::{HcalRecHitAnalyzer, RunStats};
use crate::config::Config;
use crate::event::reader::EventReader;
use crate::geometry::file::FileGeometry;
use crate::sink::store::MemoryStore;
use crate::sink::HistogramSink;

/// Totals of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub stats: RunStats,
    /// Event lines that could not be read or parsed.
    pub unreadable_events: u64,
}

/// Runs initialize → process → finalize → export.
///
/// Event lines that fail to parse are logged and skipped; everything
/// accumulated so far is still exported.
pub fn run(cfg: &Config, geometry_path: &Path, events_path: &Path) -> Result<JobReport> {
    let geometry = FileGeometry::load(geometry_path)?;

    let mut store = MemoryStore::new();
    let mut analyzer = HcalRecHitAnalyzer::initialize(cfg, &geometry, &mut store)
        .context("booking histograms")?;

    let mut report = JobReport::default();
    for event in EventReader::open(events_path)? {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                report.unreadable_events += 1;
                tracing::warn!(error = %format!("{e:#}"), "skipping unreadable event");
                continue;
            }
        };
        analyzer.process(&event, &mut store);
    }

    let events = analyzer.finalize();
    report.stats = analyzer.stats();

    store
        .export(&cfg.output.path, cfg.output.format)
        .with_context(|| format!("exporting histograms to {}", cfg.output.path.display()))?;

    tracing::info!(
        events,
        skipped = report.stats.skipped_events,
        unreadable = report.unreadable_events,
        "hcalmon stopped",
    );

    Ok(report)
}
