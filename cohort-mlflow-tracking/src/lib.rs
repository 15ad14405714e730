//! A recorder backed by [MLflow](https://mlflow.org) tracking.
//!
//! Before running the program using this crate, run a tracking server with the following command:
//!
//! ```bash
//! mlflow server --host 127.0.0.1 --port 8080
//! ```
//!
//! Then, configurations and metrics of a run can be logged to the tracking server.
//! Nested configuration parameters are flattened, logged like
//! `hyper_params.param1`.
//!
//! ```no_run
//! use anyhow::Result;
//! use cohort_core::{
//!     record::{Record, RecordValue, Recorder, STEP_KEY},
//!     RunnerConfig,
//! };
//! use cohort_mlflow_tracking::MlflowTrackingClient;
//!
//! fn main() -> Result<()> {
//!     env_logger::init();
//!
//!     let client = MlflowTrackingClient::new("http://localhost:8080").set_experiment("Default")?;
//!     let mut recorder = client.create_recorder("")?;
//!     recorder.log_params(&RunnerConfig::default())?;
//!
//!     for env_steps in (0..10_000).step_by(1000) {
//!         let mut record = Record::empty();
//!         record.insert(STEP_KEY, RecordValue::Scalar(env_steps as f32));
//!         record.insert("value_loss", RecordValue::Scalar((-1e-3 * env_steps as f32).exp()));
//!         recorder.write(record);
//!     }
//!
//!     Ok(())
//! }
//! ```
mod client;
mod experiment;
mod recorder;
mod run;
pub use client::MlflowTrackingClient;
pub use experiment::{Experiment, ExperimentTag};
pub use recorder::MlflowTrackingRecorder;
pub use run::{Run, RunInfo};
