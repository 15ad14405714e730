//! Key-value records.
use crate::error::CohortError;
use std::collections::{
    hash_map::{Iter, Keys},
    HashMap,
};

/// A value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value, typically a metric.
    Scalar(f32),

    /// A 1-dimensional array, e.g., a per-agent or per-node quantity.
    Array1(Vec<f32>),

    /// A 3-dimensional array with its shape, e.g., an RGB frame `[height, width, 3]`.
    Array3(Vec<f32>, [usize; 3]),
}

/// A set of named values.
///
/// Used for training statistics, logging payloads and the per-thread information
/// reported by a vectorized environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value, replacing any previous value under the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets the value under the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns `true` if the record has a value under the given key.
    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    /// Gets a scalar.
    pub fn get_scalar(&self, k: &str) -> Result<f32, CohortError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(CohortError::RecordValueTypeError(format!("{} is not Scalar", k))),
            None => Err(CohortError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, CohortError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(CohortError::RecordValueTypeError(format!("{} is not Array1", k))),
            None => Err(CohortError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 3-dimensional array and its shape.
    pub fn get_array3(&self, k: &str) -> Result<(Vec<f32>, [usize; 3]), CohortError> {
        match self.0.get(k) {
            Some(RecordValue::Array3(v, s)) => Ok((v.clone(), *s)),
            Some(_) => Err(CohortError::RecordValueTypeError(format!("{} is not Array3", k))),
            None => Err(CohortError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns `true` if the record holds no value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of values in the record.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut record = Record::from_scalar("score_reward", 1.5);
        record.insert("node_visits", RecordValue::Array1(vec![1., 0., 2.]));

        assert_eq!(record.get_scalar("score_reward").unwrap(), 1.5);
        assert_eq!(record.get_array1("node_visits").unwrap(), vec![1., 0., 2.]);
        assert!(matches!(
            record.get_scalar("steps_left"),
            Err(CohortError::RecordKeyError(_))
        ));
        assert!(matches!(
            record.get_scalar("node_visits"),
            Err(CohortError::RecordValueTypeError(_))
        ));
    }
}
