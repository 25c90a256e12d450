//! Remaps values using a series of linear segments.
//!
//! Used for user : design mappings such as the ones a designspace `<map>` element describes.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PiecewiseLinearMap {
    // same length by construction, both sorted
    from: Vec<OrderedFloat<f64>>,
    to: Vec<OrderedFloat<f64>>,
}

impl PiecewiseLinearMap {
    pub(crate) fn new(mut mappings: Vec<(OrderedFloat<f64>, OrderedFloat<f64>)>) -> Self {
        mappings.sort();
        mappings.dedup_by_key(|(from, _)| *from);
        let (from, to) = mappings.into_iter().unzip();
        PiecewiseLinearMap { from, to }
    }

    pub(crate) fn reverse(&self) -> PiecewiseLinearMap {
        PiecewiseLinearMap::new(
            self.to
                .iter()
                .copied()
                .zip(self.from.iter().copied())
                .collect(),
        )
    }

    /// Values outside the known range are shifted by the offset of the nearest mapping.
    pub(crate) fn map(&self, value: f64) -> f64 {
        if self.from.is_empty() {
            return value;
        }
        match self.from.binary_search(&OrderedFloat(value)) {
            Ok(idx) => self.to[idx].0,
            Err(0) => value + self.to[0].0 - self.from[0].0,
            Err(idx) if idx == self.from.len() => {
                value + self.to[idx - 1].0 - self.from[idx - 1].0
            }
            Err(idx) => {
                let (x0, x1) = (self.from[idx - 1].0, self.from[idx].0);
                let (y0, y1) = (self.to[idx - 1].0, self.to[idx].0);
                y0 + (value - x0) / (x1 - x0) * (y1 - y0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ordered_float::OrderedFloat;

    use super::PiecewiseLinearMap;

    fn plm(pairs: &[(f64, f64)]) -> PiecewiseLinearMap {
        PiecewiseLinearMap::new(
            pairs
                .iter()
                .map(|(f, t)| (OrderedFloat(*f), OrderedFloat(*t)))
                .collect(),
        )
    }

    #[test]
    fn single_segment() {
        let map = plm(&[(0.0, 0.0), (10.0, 1000.0)]);
        assert_eq!(500.0, map.map(5.0));
        // off the ends we shift
        assert_eq!(-1.0, map.map(-1.0));
        assert_eq!(1010.0, map.map(20.0));
    }

    #[test]
    fn multi_segment_and_reverse() {
        let map = plm(&[(-1.0, 100.0), (0.0, 400.0), (10.0, 700.0)]);
        assert_eq!(550.0, map.map(5.0));
        assert_eq!(250.0, map.map(-0.5));
        assert_eq!(5.0, map.reverse().map(550.0));
    }
}
