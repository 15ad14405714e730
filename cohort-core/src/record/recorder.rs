use super::Record;

/// Key under which the global environment step count is carried in a [`Record`]
/// handed to [`Recorder::write`].
pub const STEP_KEY: &str = "env_steps";

/// Writes records to an output destination.
///
/// Backends are interchangeable; which one is used is a matter of configuration.
pub trait Recorder {
    /// Writes a record immediately.
    ///
    /// The record is expected to carry the global step as a scalar under
    /// [`STEP_KEY`].
    fn write(&mut self, record: Record);

    /// Stores a record, to be aggregated on the next [`Recorder::flush`].
    fn store(&mut self, record: Record);

    /// Aggregates the stored records and writes them tagged with `step`.
    fn flush(&mut self, step: i64);
}
