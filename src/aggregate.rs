//! Result aggregation: merges per-worker buffers after the pool joined.
//!
//! Records are ordered by `id`, and ids are assigned when recognition
//! completes. The merged order is therefore completion order across all
//! workers, not discovery or submission order. Which file gets which id
//! depends on scheduling; the order of a given set of records does not.

use serde::Serialize;

use crate::worker::OcrRecord;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    records: Vec<OcrRecord>,
}

impl ResultSet {
    /// Concatenate buffers in any order, then sort by id.
    pub fn merge<I>(buffers: I) -> Self
    where
        I: IntoIterator<Item = Vec<OcrRecord>>,
    {
        let mut records: Vec<OcrRecord> = buffers.into_iter().flatten().collect();
        records.sort_by_key(|r| r.id);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OcrRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[OcrRecord] {
        &self.records
    }

    /// True when ids are exactly `1..=len`.
    pub fn is_contiguous(&self) -> bool {
        self.records
            .iter()
            .enumerate()
            .all(|(i, r)| r.id == i as u64 + 1)
    }

    /// Sum of per-record processing time.
    pub fn cumulative_ms(&self) -> u64 {
        self.records.iter().map(|r| r.elapsed_ms).sum()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a OcrRecord;
    type IntoIter = std::slice::Iter<'a, OcrRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, name: &str, ms: u64) -> OcrRecord {
        OcrRecord {
            id,
            filename: name.to_string(),
            text: String::new(),
            elapsed_ms: ms,
        }
    }

    #[test]
    fn merge_orders_by_id_across_buffers() {
        let a = vec![record(2, "b", 5), record(5, "e", 1)];
        let b = vec![record(1, "a", 3), record(4, "d", 2)];
        let c = vec![record(3, "c", 4)];

        let set = ResultSet::merge(vec![a, b, c]);
        let ids: Vec<u64> = set.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(set.is_contiguous());
        assert_eq!(set.cumulative_ms(), 15);
    }

    #[test]
    fn merge_is_independent_of_buffer_order() {
        let first = ResultSet::merge(vec![vec![record(2, "x", 0)], vec![record(1, "y", 0)]]);
        let second = ResultSet::merge(vec![vec![record(1, "y", 0)], vec![record(2, "x", 0)]]);
        let names = |s: &ResultSet| s.iter().map(|r| r.filename.clone()).collect::<Vec<_>>();
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn gaps_are_detected() {
        let set = ResultSet::merge(vec![vec![record(1, "a", 0), record(3, "c", 0)]]);
        assert!(!set.is_contiguous());
    }

    #[test]
    fn empty_set_is_contiguous() {
        let set = ResultSet::merge(Vec::<Vec<OcrRecord>>::new());
        assert!(set.is_empty());
        assert!(set.is_contiguous());
    }
}
