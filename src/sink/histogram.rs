use std::collections::BTreeMap;

use serde::Serialize;

/// Fixed-width binning along one axis.
///
/// Bin numbers follow the usual convention: 0 is underflow, `1..=bins` are
/// the regular bins and `bins + 1` is overflow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Axis {
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl Axis {
    pub const fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    /// Total slots including underflow and overflow.
    pub fn slots(&self) -> usize {
        self.bins + 2
    }

    /// Returns the bin number holding `x`.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.low {
            return 0;
        }
        if x >= self.high {
            return self.bins + 1;
        }
        let width = (self.high - self.low) / self.bins as f64;
        let bin = 1 + ((x - self.low) / width) as usize;
        // Floating error right below `high` can push past the last bin.
        bin.min(self.bins)
    }
}

/// One- or two-dimensional histogram with sparse bin storage.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub folder: String,
    pub name: String,
    pub x: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Axis>,
    pub entries: u64,
    /// Non-zero bins keyed by global bin number.
    #[serde(skip)]
    contents: BTreeMap<usize, f64>,
}

impl Histogram {
    pub fn new_1d(folder: &str, name: &str, x: Axis) -> Self {
        Self::with_axes(folder, name, x, None)
    }

    pub fn new_2d(folder: &str, name: &str, x: Axis, y: Axis) -> Self {
        Self::with_axes(folder, name, x, Some(y))
    }

    fn with_axes(folder: &str, name: &str, x: Axis, y: Option<Axis>) -> Self {
        Self {
            folder: folder.to_string(),
            name: name.to_string(),
            x,
            y,
            entries: 0,
            contents: BTreeMap::new(),
        }
    }

    /// Folder-qualified name (`folder/name`).
    pub fn path(&self) -> String {
        format!("{}/{}", self.folder, self.name)
    }

    /// Maps `(ix, iy)` to a global bin, or `None` when out of range.
    fn global_bin(&self, ix: usize, iy: usize) -> Option<usize> {
        let nx = self.x.slots();
        let ny = self.y.map_or(1, |y| y.slots());
        if ix >= nx || iy >= ny {
            return None;
        }
        Some(iy * nx + ix)
    }

    /// Content of bin `(ix, iy)`; 0 for out-of-range or untouched bins.
    pub fn bin_content(&self, ix: usize, iy: usize) -> f64 {
        self.global_bin(ix, iy)
            .and_then(|bin| self.contents.get(&bin).copied())
            .unwrap_or(0.0)
    }

    /// Overwrites bin `(ix, iy)`. Out-of-range bins are ignored.
    pub fn set_bin_content(&mut self, ix: usize, iy: usize, value: f64) {
        if let Some(bin) = self.global_bin(ix, iy) {
            self.store(bin, value);
        }
    }

    /// Adds `weight` at coordinate `x` of a 1-D histogram.
    pub fn fill_1d(&mut self, x: f64, weight: f64) {
        let ix = self.x.find_bin(x);
        self.add(ix, 0, weight);
    }

    /// Adds `weight` at `(x, y)` of a 2-D histogram.
    pub fn fill_2d(&mut self, x: f64, y: f64, weight: f64) {
        let Some(y_axis) = self.y else {
            return;
        };
        let ix = self.x.find_bin(x);
        let iy = y_axis.find_bin(y);
        self.add(ix, iy, weight);
    }

    fn add(&mut self, ix: usize, iy: usize, weight: f64) {
        if let Some(bin) = self.global_bin(ix, iy) {
            let current = self.contents.get(&bin).copied().unwrap_or(0.0);
            self.store(bin, current + weight);
            self.entries += 1;
        }
    }

    fn store(&mut self, bin: usize, value: f64) {
        if value == 0.0 {
            self.contents.remove(&bin);
        } else {
            self.contents.insert(bin, value);
        }
    }

    /// Non-zero bins as `(ix, iy, value)` in ascending bin order.
    pub fn nonzero_bins(&self) -> Vec<BinValue> {
        let nx = self.x.slots();
        self.contents
            .iter()
            .map(|(&bin, &value)| BinValue {
                ix: bin % nx,
                iy: bin / nx,
                value,
            })
            .collect()
    }
}

/// A single exported bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinValue {
    pub ix: usize,
    pub iy: usize,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RING_AXIS: Axis = Axis::new(83, -41.0, 42.0);
    const PHI_AXIS: Axis = Axis::new(72, 1.0, 73.0);

    #[test]
    fn test_find_bin_regular_range() {
        assert_eq!(RING_AXIS.find_bin(-41.0), 1);
        assert_eq!(RING_AXIS.find_bin(0.0), 42);
        assert_eq!(RING_AXIS.find_bin(5.0), 47);
        assert_eq!(RING_AXIS.find_bin(41.0), 83);
        assert_eq!(RING_AXIS.find_bin(41.999), 83);
    }

    #[test]
    fn test_find_bin_under_and_overflow() {
        assert_eq!(RING_AXIS.find_bin(-41.5), 0);
        assert_eq!(RING_AXIS.find_bin(42.0), 84);
        assert_eq!(RING_AXIS.find_bin(f64::NAN), 0);

        let energy = Axis::new(1000, -10.0, 1990.0);
        assert_eq!(energy.find_bin(-999.0), 0);
        assert_eq!(energy.find_bin(14_000.0), 1001);
    }

    #[test]
    fn test_set_and_get_bin_content() {
        let mut h = Histogram::new_2d("geo", "etaMap", RING_AXIS, PHI_AXIS);
        h.set_bin_content(47, 10, 0.6);
        assert_eq!(h.bin_content(47, 10), 0.6);
        assert_eq!(h.bin_content(47, 11), 0.0);
        // Setting content is not an entry.
        assert_eq!(h.entries, 0);
    }

    #[test]
    fn test_set_bin_content_out_of_range_ignored() {
        let mut h = Histogram::new_1d("geo", "deta", RING_AXIS);
        h.set_bin_content(85, 0, 1.0);
        h.set_bin_content(3, 1, 1.0);
        assert!(h.nonzero_bins().is_empty());
    }

    #[test]
    fn test_fill_2d_weighted() {
        let mut h = Histogram::new_2d("data", "energy", RING_AXIS, PHI_AXIS);
        h.fill_2d(5.0, 10.0, 12.0);
        h.fill_2d(5.0, 10.0, 3.0);
        assert_eq!(h.bin_content(47, 10), 15.0);
        assert_eq!(h.entries, 2);
    }

    #[test]
    fn test_fill_2d_on_1d_is_noop() {
        let mut h = Histogram::new_1d("data", "nevents", Axis::new(1, 0.0, 1.0));
        h.fill_2d(0.0, 0.0, 1.0);
        assert_eq!(h.entries, 0);
        h.fill_1d(0.0, 1.0);
        assert_eq!(h.bin_content(1, 0), 1.0);
    }

    #[test]
    fn test_nonzero_bins_roundtrip_coordinates() {
        let mut h = Histogram::new_2d("data", "occ", RING_AXIS, PHI_AXIS);
        h.fill_2d(-41.0, 72.0, 1.0);
        let bins = h.nonzero_bins();
        assert_eq!(
            bins,
            vec![BinValue {
                ix: 1,
                iy: 72,
                value: 1.0
            }]
        );
    }

    #[test]
    fn test_negative_weight_cancelling_clears_bin() {
        let mut h = Histogram::new_1d("data", "x", RING_AXIS);
        h.fill_1d(0.0, 2.0);
        h.fill_1d(0.0, -2.0);
        assert!(h.nonzero_bins().is_empty());
        assert_eq!(h.entries, 2);
    }
}
