use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{CellId, GeometryError, GeometrySource, Position, Subdetector};

/// One cell record of a geometry dump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryCell {
    #[serde(flatten)]
    pub cell: CellId,
    pub eta: f64,
    /// Azimuth in radians.
    pub phi: f64,
}

#[derive(Debug, Deserialize)]
struct GeometryDump {
    cells: Vec<GeometryCell>,
}

/// Geometry provider backed by a JSON dump of cell positions.
///
/// Cell order within each subdetector is the order of the dump, which keeps
/// table builds reproducible.
#[derive(Debug, Clone, Default)]
pub struct FileGeometry {
    by_subdet: HashMap<Subdetector, Vec<CellId>>,
    positions: HashMap<CellId, Position>,
}

impl FileGeometry {
    /// Load a `{"cells": [...]}` JSON dump.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading geometry file {}", path.display()))?;

        let dump: GeometryDump = serde_json::from_str(&data)
            .with_context(|| format!("parsing geometry file {}", path.display()))?;

        let geometry = Self::from_cells(dump.cells);

        tracing::info!(
            path = %path.display(),
            cells = geometry.positions.len(),
            "loaded geometry",
        );

        Ok(geometry)
    }

    /// Builds a provider from in-memory records. A repeated cell keeps its
    /// first position.
    pub fn from_cells(cells: impl IntoIterator<Item = GeometryCell>) -> Self {
        let mut geometry = Self::default();
        for record in cells {
            if geometry.positions.contains_key(&record.cell) {
                continue;
            }
            geometry.positions.insert(
                record.cell,
                Position {
                    eta: record.eta,
                    phi: record.phi,
                },
            );
            geometry
                .by_subdet
                .entry(record.cell.subdet)
                .or_default()
                .push(record.cell);
        }
        geometry
    }

    /// Total number of distinct cells.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl GeometrySource for FileGeometry {
    fn valid_cell_ids(&self, subdet: Subdetector) -> Result<Vec<CellId>, GeometryError> {
        Ok(self.by_subdet.get(&subdet).cloned().unwrap_or_default())
    }

    fn position(&self, cell: &CellId) -> Result<Position, GeometryError> {
        self.positions
            .get(cell)
            .copied()
            .ok_or(GeometryError::UnknownCell { cell: *cell })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subdet: Subdetector, ieta: i32, iphi: i32, eta: f64) -> GeometryCell {
        GeometryCell {
            cell: CellId::new(subdet, ieta, iphi, 1),
            eta,
            phi: 0.5,
        }
    }

    #[test]
    fn test_from_cells_groups_by_subdetector_in_order() {
        let geometry = FileGeometry::from_cells([
            record(Subdetector::Barrel, 2, 1, 0.1),
            record(Subdetector::Forward, 30, 1, 3.0),
            record(Subdetector::Barrel, 1, 1, 0.05),
        ]);
        let barrel = geometry
            .valid_cell_ids(Subdetector::Barrel)
            .expect("barrel ids");
        assert_eq!(barrel.iter().map(|c| c.ieta).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(geometry.len(), 3);
        assert!(geometry
            .valid_cell_ids(Subdetector::Outer)
            .expect("outer ids")
            .is_empty());
    }

    #[test]
    fn test_duplicate_cell_keeps_first_position() {
        let geometry = FileGeometry::from_cells([
            record(Subdetector::Barrel, 2, 1, 0.1),
            record(Subdetector::Barrel, 2, 1, 9.9),
        ]);
        let pos = geometry
            .position(&CellId::new(Subdetector::Barrel, 2, 1, 1))
            .expect("position");
        assert_eq!(pos.eta, 0.1);
        assert_eq!(geometry.len(), 1);
    }

    #[test]
    fn test_unknown_cell_errors() {
        let geometry = FileGeometry::default();
        let err = geometry
            .position(&CellId::new(Subdetector::Endcap, 20, 1, 1))
            .unwrap_err();
        assert!(matches!(err, GeometryError::UnknownCell { .. }));
    }

    #[test]
    fn test_load_json_dump() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("geometry.json");
        std::fs::write(
            &path,
            r#"{"cells": [
                {"subdet": "barrel", "ieta": 5, "iphi": 10, "depth": 1, "eta": 0.6, "phi": 1.2},
                {"subdet": "outer", "ieta": -3, "iphi": 4, "depth": 4, "eta": -0.2, "phi": -2.9}
            ]}"#,
        )
        .expect("write");

        let geometry = FileGeometry::load(&path).expect("load");
        assert_eq!(geometry.len(), 2);
        let pos = geometry
            .position(&CellId::new(Subdetector::Outer, -3, 4, 4))
            .expect("position");
        assert_eq!(pos.phi, -2.9);
    }

    #[test]
    fn test_load_malformed_json_has_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("geometry.json");
        std::fs::write(&path, "{\"cells\": [").expect("write");
        let err = FileGeometry::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing geometry file"));
    }
}
