//! Types and traits for recording metrics and environment information.
//!
//! [`Record`] is the common currency between the runner, the environment and the
//! logging backends: an environment reports per-thread information as a
//! [`Record`], a [`Trainer`](crate::Trainer) returns its training statistics as a
//! [`Record`], and a [`Recorder`] writes a [`Record`] to its destination.
//!
//! ```rust
//! use cohort_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("env_steps", RecordValue::Scalar(400.0));
//! record.insert("value_loss", RecordValue::Scalar(0.25));
//! record.insert("delta_steps", RecordValue::Array1(vec![1.0, 3.0]));
//! assert_eq!(record.get_scalar("value_loss").unwrap(), 0.25);
//! ```
//!
//! Values written within one logging interval can be kept in an
//! [`InfoAccumulator`] or a [`RecordStorage`] and reduced when the interval is
//! flushed.
mod accumulator;
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use accumulator::InfoAccumulator;
pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{Recorder, STEP_KEY};
pub use storage::RecordStorage;
