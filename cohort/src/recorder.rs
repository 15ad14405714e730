//! Selection of a recorder backend.
use anyhow::Result;
use cohort_core::{
    record::{NullRecorder, Recorder},
    RunnerConfig,
};
use cohort_mlflow_tracking::MlflowTrackingClient;
use cohort_tensorboard::TensorboardRecorder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the records of a run go.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum RecorderConfig {
    /// TFRecord files under `logdir`.
    Tensorboard {
        /// Log directory.
        logdir: PathBuf,
    },

    /// A run of an MLflow tracking server.
    Mlflow {
        /// Base URL of the tracking server.
        url: String,

        /// Name of the experiment, created if missing.
        experiment: String,

        /// Name of the run; empty to let the server generate one.
        run_name: String,
    },

    /// Discard everything.
    Null,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::Null
    }
}

impl RecorderConfig {
    /// Builds the recorder of a run configured with `config`.
    ///
    /// An MLflow run logs `config` as parameters and is tagged with the names of
    /// the environment, the algorithm and the experiment.
    pub fn build_recorder(&self, config: &RunnerConfig) -> Result<Box<dyn Recorder>> {
        match self {
            Self::Tensorboard { logdir } => Ok(Box::new(TensorboardRecorder::new(logdir))),
            Self::Mlflow {
                url,
                experiment,
                run_name,
            } => {
                let client = MlflowTrackingClient::new(url).set_experiment(experiment)?;
                let recorder = client.create_recorder(run_name)?;
                recorder.log_params(config)?;
                recorder.set_tag("env", &config.env_name)?;
                recorder.set_tag("algo", &config.algorithm_name)?;
                recorder.set_tag("experiment", &config.experiment_name)?;
                Ok(Box::new(recorder))
            }
            Self::Null => Ok(Box::new(NullRecorder::new())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cohort_core::record::{Record, RecordValue, STEP_KEY};
    use tempdir::TempDir;
    use test_log::test;

    #[test]
    fn test_yaml() -> Result<()> {
        let config = RecorderConfig::Mlflow {
            url: "http://localhost:8080".into(),
            experiment: "ring_patrol".into(),
            run_name: "".into(),
        };
        let s = serde_yaml::to_string(&config)?;
        assert_eq!(serde_yaml::from_str::<RecorderConfig>(&s)?, config);
        Ok(())
    }

    #[test]
    fn test_build_local_recorders() -> Result<()> {
        let dir = TempDir::new("recorder")?;
        let config = RunnerConfig::default();
        for recorder_config in [
            RecorderConfig::Null,
            RecorderConfig::Tensorboard {
                logdir: dir.path().join("logs"),
            },
        ]
        .iter()
        {
            let mut recorder = recorder_config.build_recorder(&config)?;
            recorder.store(Record::from_scalar("value_loss", 1.));
            recorder.flush(10);
            let mut record = Record::from_scalar("eval_goal", 1.);
            record.insert(STEP_KEY, RecordValue::Scalar(10.));
            recorder.write(record);
        }
        assert!(dir.path().join("logs").exists());
        Ok(())
    }
}
