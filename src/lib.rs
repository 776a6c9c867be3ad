//! HCAL rec-hit monitor.
//!
//! Builds an eta/phi lookup table from detector geometry, then aggregates
//! calorimeter rec hits event by event into per-cell and per-ring
//! histograms.

pub mod analyzer;
pub mod config;
pub mod event;
pub mod geometry;
pub mod pipeline;
pub mod sink;
