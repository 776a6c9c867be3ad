use std::collections::HashMap;
use std::path::Path;

use crate::config::OutputFormat;

use super::exporter::Exporter;
use super::histogram::{Axis, Histogram};
use super::{HistId, HistogramSink, SinkError};

/// In-memory histogram store that lives for the whole job.
///
/// Histograms keep their booking order, which is also the export order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    histograms: Vec<Histogram>,
    by_path: HashMap<String, HistId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of booked histograms.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Looks up a histogram by its folder-qualified path.
    pub fn get(&self, path: &str) -> Option<&Histogram> {
        self.by_path
            .get(path)
            .and_then(|id| self.histograms.get(id.0))
    }

    fn insert(&mut self, histogram: Histogram) -> Result<HistId, SinkError> {
        let path = histogram.path();
        if self.by_path.contains_key(&path) {
            return Err(SinkError::AlreadyBooked { path });
        }
        let id = HistId(self.histograms.len());
        self.histograms.push(histogram);
        self.by_path.insert(path, id);
        Ok(id)
    }
}

impl HistogramSink for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn book_1d(&mut self, folder: &str, name: &str, x: Axis) -> Result<HistId, SinkError> {
        self.insert(Histogram::new_1d(folder, name, x))
    }

    fn book_2d(
        &mut self,
        folder: &str,
        name: &str,
        x: Axis,
        y: Axis,
    ) -> Result<HistId, SinkError> {
        self.insert(Histogram::new_2d(folder, name, x, y))
    }

    fn set_bin_content(&mut self, id: HistId, ix: usize, iy: usize, value: f64) {
        if let Some(h) = self.histograms.get_mut(id.0) {
            h.set_bin_content(ix, iy, value);
        }
    }

    fn bin_content(&self, id: HistId, ix: usize, iy: usize) -> f64 {
        self.histograms
            .get(id.0)
            .map_or(0.0, |h| h.bin_content(ix, iy))
    }

    fn fill_1d(&mut self, id: HistId, x: f64, weight: f64) {
        if let Some(h) = self.histograms.get_mut(id.0) {
            h.fill_1d(x, weight);
        }
    }

    fn fill_2d(&mut self, id: HistId, x: f64, y: f64, weight: f64) {
        if let Some(h) = self.histograms.get_mut(id.0) {
            h.fill_2d(x, y, weight);
        }
    }

    fn export(&self, path: &Path, format: OutputFormat) -> Result<(), SinkError> {
        let exporter = Exporter::for_format(format);
        exporter.write(path, &self.histograms)?;

        tracing::info!(
            exporter = exporter.name(),
            path = %path.display(),
            histograms = self.histograms.len(),
            "exported histograms",
        );

        Ok(())
    }
}
