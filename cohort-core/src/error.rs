//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum CohortError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// An array did not have the shape the configuration expects.
    #[error("Shape mismatch in {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Name of the offending field.
        name: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// The environment did not report an info field the runner relies on.
    #[error("Missing field '{key}' in the info of thread {thread}")]
    MissingInfo {
        /// Key of the field.
        key: String,
        /// Index of the thread.
        thread: usize,
    },

    /// The environment returned a response for a different number of threads.
    #[error("Expected responses for {expected} threads, got {actual}")]
    ThreadCountMismatch {
        /// Number of threads of the environment.
        expected: usize,
        /// Number of responses.
        actual: usize,
    },

    /// The rollout window was handed to the trainer before it was filled.
    #[error("Rollout window is not full: {written} of {horizon} steps written")]
    IncompleteWindow {
        /// Steps written in the current window.
        written: usize,
        /// Length of the window.
        horizon: usize,
    },

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while validating configurations.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// Graph-based feature extractors are not available for the critic.
    #[error("Graph-based critic is not implemented")]
    GraphCriticUnsupported,

    /// A graph MLP head was requested without a graph feature extractor.
    #[error("use_gnn_mlp_policy requires use_gnn_policy")]
    GraphHeadWithoutGraphBase,

    /// Both kinds of recurrent policies were requested.
    #[error("use_recurrent_policy and use_naive_recurrent_policy are exclusive")]
    ConflictingRecurrence,

    /// A parameter that must be positive was zero.
    #[error("{0} must be positive")]
    NonPositive(&'static str),

    /// The environment spec does not agree with the configuration.
    #[error("{name} is {actual} in the environment but {expected} in the configuration")]
    EnvMismatch {
        /// Name of the parameter.
        name: &'static str,
        /// Value in the configuration.
        expected: usize,
        /// Value reported by the environment.
        actual: usize,
    },
}
