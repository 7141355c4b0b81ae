//! Per-region patch records and their aggregation into flat
//! coordinate/label sequences.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{PatchRecord, Point};

/// Mapping from tissue-region id to the ordered patch records retained
/// for that region.
///
/// Region ids are the indices of the segmenter's region list; records
/// keep their grid-generation (x-major) order. `BTreeMap` keeps region
/// iteration in id order, so flattening is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset(BTreeMap<usize, Vec<PatchRecord>>);

impl Dataset {
    /// An empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the records of one region, replacing any previous entry
    /// for the same id.
    pub fn insert(&mut self, region_id: usize, records: Vec<PatchRecord>) {
        self.0.insert(region_id, records);
    }

    /// Records of one region, if present.
    #[must_use]
    pub fn region(&self, region_id: usize) -> Option<&[PatchRecord]> {
        self.0.get(&region_id).map(Vec::as_slice)
    }

    /// Iterate regions in ascending id order.
    pub fn regions(&self) -> impl Iterator<Item = (usize, &[PatchRecord])> {
        self.0.iter().map(|(id, records)| (*id, records.as_slice()))
    }

    /// Total record count across all regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Returns `true` if no region holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into parallel coordinate and label sequences.
    ///
    /// Region-then-grid order; the two sequences always have equal
    /// length, and empty regions contribute nothing.
    #[must_use]
    pub fn flatten(&self) -> (Vec<Point>, Vec<u8>) {
        let total = self.len();
        let mut coordinates = Vec::with_capacity(total);
        let mut labels = Vec::with_capacity(total);
        for records in self.0.values() {
            for record in records {
                coordinates.push(record.coordinate);
                labels.push(record.label);
            }
        }
        (coordinates, labels)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(x: i64, y: i64, label: u8) -> PatchRecord {
        PatchRecord {
            coordinate: Point::new(x, y),
            label,
        }
    }

    #[test]
    fn flatten_preserves_region_then_grid_order() {
        let mut dataset = Dataset::new();
        // Insert out of id order; flattening still goes 0, 1, 2.
        dataset.insert(2, vec![record(50, 0, 1)]);
        dataset.insert(0, vec![record(0, 0, 0), record(0, 10, 0)]);
        dataset.insert(1, vec![]);

        let (coordinates, labels) = dataset.flatten();
        assert_eq!(
            coordinates,
            vec![Point::new(0, 0), Point::new(0, 10), Point::new(50, 0)],
        );
        assert_eq!(labels, vec![0, 0, 1]);
    }

    #[test]
    fn flatten_lengths_are_equal() {
        let mut dataset = Dataset::new();
        dataset.insert(0, vec![record(0, 0, 0); 7]);
        dataset.insert(1, vec![record(1, 1, 1); 3]);
        let (coordinates, labels) = dataset.flatten();
        assert_eq!(coordinates.len(), labels.len());
        assert_eq!(coordinates.len(), 10);
        assert_eq!(dataset.len(), 10);
    }

    #[test]
    fn empty_regions_contribute_nothing() {
        let mut dataset = Dataset::new();
        dataset.insert(0, vec![]);
        dataset.insert(1, vec![]);
        assert!(dataset.is_empty());
        let (coordinates, labels) = dataset.flatten();
        assert!(coordinates.is_empty());
        assert!(labels.is_empty());
    }

    #[test]
    fn regions_iterate_in_id_order() {
        let mut dataset = Dataset::new();
        dataset.insert(5, vec![record(1, 1, 0)]);
        dataset.insert(2, vec![record(0, 0, 0), record(0, 10, 1)]);
        let summary: Vec<(usize, usize)> = dataset
            .regions()
            .map(|(id, records)| (id, records.len()))
            .collect();
        assert_eq!(summary, vec![(2, 2), (5, 1)]);
    }

    #[test]
    fn region_lookup() {
        let mut dataset = Dataset::new();
        dataset.insert(3, vec![record(9, 9, 0)]);
        assert_eq!(dataset.region(3).unwrap().len(), 1);
        assert!(dataset.region(0).is_none());
    }

    #[test]
    fn serde_round_trip() {
        let mut dataset = Dataset::new();
        dataset.insert(0, vec![record(256, 512, 1)]);
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(dataset, back);
    }
}
