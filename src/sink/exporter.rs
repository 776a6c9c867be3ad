use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::OutputFormat;

use super::histogram::{Axis, BinValue, Histogram};
use super::SinkError;

/// Writes the job's histograms to a named output artifact.
///
/// Uses enum dispatch over the supported encodings.
pub enum Exporter {
    Json(JsonExporter),
    Yaml(YamlExporter),
}

impl Exporter {
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json(JsonExporter),
            OutputFormat::Yaml => Self::Yaml(YamlExporter),
        }
    }

    /// Returns the exporter name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Json(e) => e.name(),
            Self::Yaml(e) => e.name(),
        }
    }

    /// Encodes `histograms` into the file at `path`, replacing it.
    pub fn write(&self, path: &Path, histograms: &[Histogram]) -> Result<(), SinkError> {
        let document = ExportDocument::new(histograms);
        let mut out = BufWriter::new(File::create(path)?);
        match self {
            Self::Json(e) => e.encode(&mut out, &document)?,
            Self::Yaml(e) => e.encode(&mut out, &document)?,
        }
        out.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON output.
pub struct JsonExporter;

impl JsonExporter {
    pub fn name(&self) -> &str {
        "json"
    }

    fn encode<W: Write>(&self, out: &mut W, document: &ExportDocument<'_>) -> Result<(), SinkError> {
        serde_json::to_writer_pretty(&mut *out, document)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// YAML output.
pub struct YamlExporter;

impl YamlExporter {
    pub fn name(&self) -> &str {
        "yaml"
    }

    fn encode<W: Write>(&self, out: &mut W, document: &ExportDocument<'_>) -> Result<(), SinkError> {
        serde_yaml::to_writer(out, document)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    histograms: Vec<HistogramRecord<'a>>,
}

impl<'a> ExportDocument<'a> {
    fn new(histograms: &'a [Histogram]) -> Self {
        Self {
            histograms: histograms.iter().map(HistogramRecord::from).collect(),
        }
    }
}

/// Serialized view of one histogram: metadata plus its non-zero bins.
#[derive(Serialize)]
struct HistogramRecord<'a> {
    path: String,
    name: &'a str,
    x: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<Axis>,
    entries: u64,
    bins: Vec<BinValue>,
}

impl<'a> From<&'a Histogram> for HistogramRecord<'a> {
    fn from(h: &'a Histogram) -> Self {
        Self {
            path: h.path(),
            name: &h.name,
            x: h.x,
            y: h.y,
            entries: h.entries,
            bins: h.nonzero_bins(),
        }
    }
}
