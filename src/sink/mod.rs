pub mod exporter;
pub mod histogram;
pub mod store;

use std::path::Path;

use thiserror::Error;

use crate::config::OutputFormat;

use self::histogram::Axis;

/// Handle to a booked histogram, issued by the sink that booked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistId(pub(crate) usize);

/// Errors raised while booking or exporting histograms.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("histogram already booked: {path}")]
    AlreadyBooked { path: String },

    #[error("writing export artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding JSON export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding YAML export: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Histogram storage backend consumed by the analyzer.
///
/// Bin numbers are 1-based with 0 as underflow and `bins + 1` as overflow;
/// 1-D histograms use `iy = 0`. Writes through a handle this sink did not
/// issue are ignored and reads return 0.
pub trait HistogramSink {
    /// Returns the sink's name for logging.
    fn name(&self) -> &str;

    /// Books a 1-D histogram under `folder`.
    fn book_1d(&mut self, folder: &str, name: &str, x: Axis) -> Result<HistId, SinkError>;

    /// Books a 2-D histogram under `folder`.
    fn book_2d(&mut self, folder: &str, name: &str, x: Axis, y: Axis)
        -> Result<HistId, SinkError>;

    /// Overwrites the content of one bin.
    fn set_bin_content(&mut self, id: HistId, ix: usize, iy: usize, value: f64);

    /// Reads the content of one bin.
    fn bin_content(&self, id: HistId, ix: usize, iy: usize) -> f64;

    /// Adds `weight` at coordinate `x`.
    fn fill_1d(&mut self, id: HistId, x: f64, weight: f64);

    /// Adds `weight` at coordinate `(x, y)`.
    fn fill_2d(&mut self, id: HistId, x: f64, y: f64, weight: f64);

    /// Writes every booked histogram to `path`.
    fn export(&self, path: &Path, format: OutputFormat) -> Result<(), SinkError>;
}
