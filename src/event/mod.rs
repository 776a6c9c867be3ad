pub mod reader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InputConfig;
use crate::geometry::{CellId, Subdetector};

/// A reconstructed hit: one cell and its calibrated energy (GeV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecHit {
    #[serde(flatten)]
    pub id: CellId,
    pub energy: f64,
}

impl RecHit {
    pub fn new(id: CellId, energy: f64) -> Self {
        Self { id, energy }
    }
}

/// Errors raised when an event lacks an expected collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("collection {label} not found in event")]
    Missing { label: String },

    #[error("collection {label} is marked invalid")]
    Invalid { label: String },
}

/// One collision event: named rec-hit collections.
///
/// A collection present with a `null` payload is an invalid product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub collections: BTreeMap<String, Option<Vec<RecHit>>>,
}

impl Event {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            collections: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a valid collection.
    pub fn with_collection(mut self, label: &str, hits: Vec<RecHit>) -> Self {
        self.collections.insert(label.to_string(), Some(hits));
        self
    }

    /// Marks a collection as present but invalid.
    pub fn with_invalid_collection(mut self, label: &str) -> Self {
        self.collections.insert(label.to_string(), None);
        self
    }

    /// Looks up a collection by label.
    pub fn collection(&self, label: &str) -> Result<&[RecHit], CollectionError> {
        match self.collections.get(label) {
            Some(Some(hits)) => Ok(hits),
            Some(None) => Err(CollectionError::Invalid {
                label: label.to_string(),
            }),
            None => Err(CollectionError::Missing {
                label: label.to_string(),
            }),
        }
    }
}

/// The three rec-hit sources aggregated per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HitSource {
    /// Combined barrel + endcap, depths 1-3.
    Hbhe,
    /// Outer, aggregated at depth 4.
    Ho,
    /// Forward, depths 1-2.
    Hf,
}

impl HitSource {
    /// Processing order within an event.
    pub const ALL: [HitSource; 3] = [HitSource::Hbhe, HitSource::Ho, HitSource::Hf];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hbhe => "hbhe",
            Self::Ho => "ho",
            Self::Hf => "hf",
        }
    }

    /// Depth layers this source aggregates into.
    pub const fn depths(self) -> &'static [u8] {
        match self {
            Self::Hbhe => &[1, 2, 3],
            Self::Ho => &[4],
            Self::Hf => &[1, 2],
        }
    }

    /// Aggregation depth for a hit, or `None` if the hit's depth is not
    /// served by this source. Outer hits always land on depth 4.
    pub fn aggregation_depth(self, hit_depth: u8) -> Option<u8> {
        match self {
            Self::Ho => Some(4),
            _ if self.depths().contains(&hit_depth) => Some(hit_depth),
            _ => None,
        }
    }

    /// Event collection label for this source.
    pub fn label(self, input: &InputConfig) -> &str {
        match self {
            Self::Hbhe => input.hbhe_label.as_str(),
            Self::Ho => input.ho_label.as_str(),
            Self::Hf => input.hf_label.as_str(),
        }
    }

    /// Whether a subdetector tag belongs to this source.
    pub fn serves(self, subdet: Subdetector) -> bool {
        matches!(
            (self, subdet),
            (Self::Hbhe, Subdetector::Barrel | Subdetector::Endcap)
                | (Self::Ho, Subdetector::Outer)
                | (Self::Hf, Subdetector::Forward)
        )
    }
}
