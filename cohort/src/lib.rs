//! Rollout orchestration for multi-agent on-policy reinforcement learning.
//!
//! Cohort consists of the following crates:
//!
//! * [cohort-core](cohort_core) provides the runner, the rollout buffer, the
//!   recurrent-state lifecycle, evaluation quotas and the traits of the
//!   environments, policies and trainers it drives.
//! * [cohort-tensorboard](cohort_tensorboard) has `TensorboardRecorder` to write
//!   records which can be shown in Tensorboard. It is based on
//!   [tensorboard-rs](https://crates.io/crates/tensorboard-rs).
//! * [cohort-mlflow-tracking](cohort_mlflow_tracking) logs parameters and metrics
//!   to an MLflow tracking server via REST API.
//! * `cohort` (this crate) selects a recorder from configuration with
//!   [`RecorderConfig`] and ships a small patrolling environment in [`demo`] to
//!   exercise the runner end to end.
pub mod demo;
mod recorder;
pub use cohort_core;
pub use cohort_mlflow_tracking;
pub use cohort_tensorboard;
pub use recorder::RecorderConfig;
