//! Storage of records within one logging interval.
use super::{Record, RecordValue};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them.
///
/// Scalars stored more than once are reduced to `_min`, `_max`, `_mean` and
/// `_median` statistics. For any other kind of value the latest one is kept.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn min(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().copied().fold(f32::INFINITY, f32::min))
}

fn max(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().copied().fold(f32::NEG_INFINITY, f32::max))
}

fn mean(vs: &[f32]) -> RecordValue {
    RecordValue::Scalar(vs.iter().sum::<f32>() / vs.len() as f32)
}

fn median(mut vs: Vec<f32>) -> RecordValue {
    vs.sort_by(|x, y| x.total_cmp(y));
    RecordValue::Scalar(vs[vs.len() / 2])
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Returns `true` if nothing has been stored since the last aggregation.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn keys(&self) -> HashSet<String, Xxh3Builder> {
        let mut keys = HashSet::<String, Xxh3Builder>::default();
        for record in self.data.iter() {
            keys.extend(record.keys().cloned());
        }
        keys
    }

    fn latest(&self, key: &str) -> Option<&RecordValue> {
        self.data.iter().rev().find_map(|record| record.get(key))
    }

    fn scalars(&self, key: &str) -> Vec<f32> {
        self.data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Aggregates all stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.keys().iter() {
            match self.latest(key) {
                Some(RecordValue::Scalar(_)) => {
                    let vs = self.scalars(key);
                    if vs.len() == 1 {
                        record.insert(key.clone(), RecordValue::Scalar(vs[0]));
                    } else {
                        record.insert(format!("{}_min", key), min(&vs));
                        record.insert(format!("{}_max", key), max(&vs));
                        record.insert(format!("{}_mean", key), mean(&vs));
                        record.insert(format!("{}_median", key), median(vs));
                    }
                }
                Some(value) => record.insert(key.clone(), value.clone()),
                None => {}
            }
        }

        self.data.clear();

        record
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_aggregate_scalars() {
        let mut storage = RecordStorage::new();
        for v in [1f32, 4.0, 2.0].iter() {
            storage.store(Record::from_scalar("policy_loss", *v));
        }
        storage.store(Record::from_scalar("lr", 0.1));

        let record = storage.aggregate();
        assert_eq!(record.get_scalar("policy_loss_min").unwrap(), 1.0);
        assert_eq!(record.get_scalar("policy_loss_max").unwrap(), 4.0);
        assert_eq!(record.get_scalar("policy_loss_median").unwrap(), 2.0);
        assert!((record.get_scalar("policy_loss_mean").unwrap() - 7.0 / 3.0).abs() < 1e-6);
        assert_eq!(record.get_scalar("lr").unwrap(), 0.1);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_aggregate_keeps_latest_array() {
        let mut storage = RecordStorage::new();
        storage.store(Record::from_slice(&[("visits", RecordValue::Array1(vec![1.]))]));
        storage.store(Record::from_slice(&[("visits", RecordValue::Array1(vec![2.]))]));
        assert_eq!(storage.aggregate().get_array1("visits").unwrap(), vec![2.]);
    }
}
