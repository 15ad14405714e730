use super::{Record, RecordValue};
use std::collections::HashMap;
use xxhash_rust::xxh3::Xxh3Builder;

/// Accumulates environment information over one logging interval.
///
/// Each metric name maps to an append-only sequence of values. The set of names is
/// dynamic: per-node quantities like `node_visits/node_7` appear as the
/// environment reports them. [`InfoAccumulator::flush`] reduces every sequence to
/// its mean and starts a new interval.
#[derive(Debug, Default)]
pub struct InfoAccumulator {
    data: HashMap<String, Vec<f32>, Xxh3Builder>,
}

impl InfoAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the sequence of `key`.
    pub fn push(&mut self, key: impl Into<String>, value: f32) {
        self.data.entry(key.into()).or_insert_with(Vec::new).push(value);
    }

    /// Appends values to the sequence of `key`.
    pub fn extend(&mut self, key: impl Into<String>, values: impl IntoIterator<Item = f32>) {
        self.data
            .entry(key.into())
            .or_insert_with(Vec::new)
            .extend(values);
    }

    /// Returns the values accumulated under `key`.
    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    /// Returns `true` if nothing has been accumulated in the current interval.
    pub fn is_empty(&self) -> bool {
        self.data.values().all(|v| v.is_empty())
    }

    /// Reduces every non-empty sequence to its mean and clears the accumulator.
    pub fn flush(&mut self) -> Record {
        let mut record = Record::empty();
        for (key, values) in self.data.drain() {
            if !values.is_empty() {
                let mean = values.iter().sum::<f32>() / values.len() as f32;
                record.insert(key, RecordValue::Scalar(mean));
            }
        }
        record
    }
}

#[cfg(test)]
mod test {
    use super::InfoAccumulator;

    #[test]
    fn test_flush_means_and_clears() {
        let mut acc = InfoAccumulator::new();
        acc.extend("total_state", vec![1.0, 2.0, 3.0]);
        acc.push("node_visits/node_0", 4.0);
        acc.extend("agent_count", vec![]);

        let record = acc.flush();
        assert_eq!(record.get_scalar("total_state").unwrap(), 2.0);
        assert_eq!(record.get_scalar("node_visits/node_0").unwrap(), 4.0);
        assert!(record.get("agent_count").is_none());
        assert!(acc.is_empty());
        assert!(acc.flush().is_empty());
    }
}
