use crate::{client::Api, Run};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local, SecondsFormat};
use cohort_core::record::{Record, RecordStorage, RecordValue, Recorder, STEP_KEY};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct LogParamParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct LogMetricParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
    step: i64,
}

#[derive(Debug, Serialize)]
struct UpdateRunParams<'a> {
    run_id: &'a str,
    status: &'a str,
    end_time: i64,
    run_name: &'a str,
}

#[derive(Debug, Serialize)]
struct SetTagParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

/// Record metrics to the MLflow tracking server during training.
///
/// Before training, [`MlflowTrackingRecorder::log_params()`] logs the
/// configuration of the run, e.g. a [`RunnerConfig`]. Nested fields are flattened
/// like `hyper_params.param1`.
///
/// [`Recorder::write()`] logs the scalar values of a record as metrics, with the
/// value under [`STEP_KEY`] as the `step` field of each metric. Other values are
/// ignored.
///
/// When dropped, the run is tagged with its host duration and its status is set to
/// `FINISHED`.
///
/// [`RunnerConfig`]: cohort_core::RunnerConfig
pub struct MlflowTrackingRecorder {
    api: Api,
    run_id: String,
    run_name: String,
    storage: RecordStorage,
    start_time: DateTime<Local>,
}

impl MlflowTrackingRecorder {
    /// Creates a recorder of `run` and tags it with `host_start_time`.
    pub(crate) fn new(api: Api, run: &Run) -> Result<Self> {
        let recorder = Self {
            api,
            run_id: run.info.run_id.clone(),
            run_name: run.info.run_name.clone(),
            storage: RecordStorage::new(),
            start_time: Local::now(),
        };
        recorder.set_tag(
            "host_start_time",
            recorder
                .start_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        Ok(recorder)
    }

    /// Name of the run.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn log_params(&self, params: impl Serialize) -> Result<()> {
        for (key, value) in flatten_params(params)? {
            self.api.post(
                "runs/log-parameter",
                &LogParamParams {
                    run_id: &self.run_id,
                    key: &key,
                    value,
                },
            )?;
        }
        Ok(())
    }

    pub fn set_tag(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        self.api.post(
            "runs/set-tag",
            &SetTagParams {
                run_id: &self.run_id,
                key: key.as_ref(),
                value: value.as_ref(),
            },
        )?;
        Ok(())
    }

    fn log_metrics(&self, step: i64, metrics: Vec<(String, f64)>) -> Result<()> {
        let timestamp = Local::now().timestamp_millis();
        for (key, value) in metrics.iter() {
            self.api.post(
                "runs/log-metric",
                &LogMetricParams {
                    run_id: &self.run_id,
                    key,
                    value: *value,
                    timestamp,
                    step,
                },
            )?;
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let end_time = Local::now();
        let duration = end_time.signed_duration_since(self.start_time);
        self.set_tag(
            "host_end_time",
            end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        self.set_tag("host_duration", format_duration(&duration))?;
        self.api.post(
            "runs/update",
            &UpdateRunParams {
                run_id: &self.run_id,
                status: "FINISHED",
                end_time: end_time.timestamp_millis(),
                run_name: &self.run_name,
            },
        )?;
        Ok(())
    }
}

impl Recorder for MlflowTrackingRecorder {
    fn write(&mut self, record: Record) {
        match metrics(&record) {
            Some((step, metrics)) => {
                if let Err(e) = self.log_metrics(step, metrics) {
                    log::warn!("Failed to log metrics of run {}: {}", self.run_name, e);
                }
            }
            None => log::warn!("Dropped a record without {}", STEP_KEY),
        }
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        record.insert(STEP_KEY, RecordValue::Scalar(step as _));
        self.write(record);
    }
}

impl Drop for MlflowTrackingRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("Failed to finish run {}: {}", self.run_name, e);
        }
    }
}

/// Flattens a serializable object into `(key, value)` pairs of parameters.
fn flatten_params(params: impl Serialize) -> Result<Vec<(String, String)>> {
    let map = match serde_json::to_value(params)? {
        Value::Object(map) => map,
        v => return Err(anyhow!("Parameters must be an object, got {}", v)),
    };
    let mut params: Vec<_> = flatten_serde_json::flatten(&map)
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            v => (k, v.to_string()),
        })
        .collect();
    params.sort();
    Ok(params)
}

/// Step and scalar metrics of a record, `None` without a step.
fn metrics(record: &Record) -> Option<(i64, Vec<(String, f64)>)> {
    let step = record.get_scalar(STEP_KEY).ok()? as i64;
    let mut metrics: Vec<_> = record
        .iter()
        .filter(|(k, _)| k.as_str() != STEP_KEY)
        .filter_map(|(k, v)| match v {
            RecordValue::Scalar(v) => Some((k.clone(), *v as f64)),
            _ => None,
        })
        .collect();
    metrics.sort_by(|a, b| a.0.cmp(&b.0));
    Some((step, metrics))
}

fn format_duration(dt: &Duration) -> String {
    let mut seconds = dt.num_seconds();
    let mut minutes = seconds / 60;
    seconds %= 60;
    let hours = minutes / 60;
    minutes %= 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct HyperParams {
        lr: f32,
        env: String,
    }

    #[derive(Serialize)]
    struct Config {
        seed: i64,
        hyper_params: HyperParams,
    }

    #[test]
    fn test_flatten_params() -> Result<()> {
        let config = Config {
            seed: 1,
            hyper_params: HyperParams {
                lr: 0.5,
                env: "ring_patrol".into(),
            },
        };
        let params = flatten_params(&config)?;
        assert_eq!(
            params,
            vec![
                ("hyper_params.env".to_string(), "ring_patrol".to_string()),
                ("hyper_params.lr".to_string(), "0.5".to_string()),
                ("seed".to_string(), "1".to_string()),
            ]
        );
        assert!(flatten_params(3).is_err());
        Ok(())
    }

    #[test]
    fn test_metrics() {
        let mut record = Record::from_scalar("value_loss", 0.5);
        record.insert(STEP_KEY, RecordValue::Scalar(800.));
        record.insert("node_visits", RecordValue::Array1(vec![1., 2.]));
        let (step, metrics) = metrics(&record).unwrap();
        assert_eq!(step, 800);
        assert_eq!(metrics, vec![("value_loss".to_string(), 0.5)]);

        assert!(super::metrics(&Record::from_scalar("value_loss", 0.5)).is_none());
    }

    #[test]
    fn test_format_duration() {
        let dt = Duration::seconds(3 * 3600 + 25 * 60 + 7);
        assert_eq!(format_duration(&dt), "03:25:07");
    }
}
