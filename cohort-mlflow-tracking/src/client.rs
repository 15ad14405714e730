use crate::{
    experiment::{Experiment, GetExperimentResponse},
    run::CreateRunResponse,
    MlflowTrackingRecorder,
};
use anyhow::{anyhow, Context, Result};
use log::info;
use reqwest::blocking::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Serialize)]
struct CreateRunParams {
    experiment_id: String,
    start_time: i64,
    run_name: String,
}

#[derive(Debug, Serialize)]
struct CreateExperimentParams {
    name: String,
}

/// REST endpoint of a tracking server with its credentials.
#[derive(Clone)]
pub(crate) struct Api {
    client: Client,
    base_url: String,
    user_name: String,
    password: String,
}

impl Api {
    fn url(&self, api: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, api)
    }

    pub(crate) fn get(&self, api: &str, query: &impl Serialize) -> Result<Response> {
        Ok(self
            .client
            .get(self.url(api))
            .basic_auth(&self.user_name, Some(&self.password))
            .query(query)
            .send()?)
    }

    /// Posts `params` as json, failing on a non-success status.
    pub(crate) fn post(&self, api: &str, params: &impl Serialize) -> Result<Response> {
        let resp = self
            .client
            .post(self.url(api))
            .basic_auth(&self.user_name, Some(&self.password))
            .json(params)
            .send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(anyhow!("{} returned {}", api, resp.status()))
        }
    }
}

fn parse<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let text = resp.text()?;
    serde_json::from_str(&text).with_context(|| format!("Unexpected response: {}", text))
}

/// Provides access to a MLflow tracking server via REST API.
///
/// Support Mlflow API version 2.0.
pub struct MlflowTrackingClient {
    api: Api,

    /// Current experiment ID.
    experiment_id: Option<String>,
}

impl MlflowTrackingClient {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            api: Api {
                client: Client::new(),
                base_url: base_url.as_ref().trim_end_matches('/').to_string(),
                user_name: "".to_string(),
                password: "".to_string(),
            },
            experiment_id: None,
        }
    }

    /// Set user name and password for basic authentication of the tracking server.
    pub fn basic_auth(mut self, user_name: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        self.api.user_name = user_name.as_ref().to_string();
        self.api.password = password.as_ref().to_string();
        self
    }

    /// Set the experiment under which runs are created.
    ///
    /// The experiment is created on the tracking server if it does not exist.
    pub fn set_experiment(mut self, name: impl AsRef<str>) -> Result<Self> {
        let experiment = self.get_experiment(name.as_ref())?;
        info!(
            "For experiment '{}', id={} is set in MlflowTrackingClient",
            name.as_ref(),
            experiment.experiment_id
        );
        self.experiment_id = Some(experiment.experiment_id);
        Ok(self)
    }

    /// Get [`Experiment`] by name from the tracking server, creating it if missing.
    pub fn get_experiment(&self, name: impl AsRef<str>) -> Result<Experiment> {
        let query = [("experiment_name", name.as_ref())];
        let resp = self.api.get("experiments/get-by-name", &query)?;
        let resp = if resp.status().is_success() {
            resp
        } else {
            info!("Create experiment '{}'", name.as_ref());
            self.api.post(
                "experiments/create",
                &CreateExperimentParams {
                    name: name.as_ref().into(),
                },
            )?;
            self.api.get("experiments/get-by-name", &query)?
        };
        let resp: GetExperimentResponse = parse(resp)?;
        Ok(resp.experiment)
    }

    /// Create [`MlflowTrackingRecorder`] corresponding to a new run.
    ///
    /// If `run_name` is empty, a run name is generated by the tracking server.
    /// [`MlflowTrackingClient::set_experiment()`] must be called before.
    pub fn create_recorder(&self, run_name: impl AsRef<str>) -> Result<MlflowTrackingRecorder> {
        let experiment_id = self
            .experiment_id
            .as_ref()
            .ok_or_else(|| anyhow!("Experiment is not set"))?;
        let resp = self.api.post(
            "runs/create",
            &CreateRunParams {
                experiment_id: experiment_id.clone(),
                start_time: chrono::Local::now().timestamp_millis(),
                run_name: run_name.as_ref().to_string(),
            },
        )?;
        let run = parse::<CreateRunResponse>(resp)?.run;
        if run_name.as_ref().is_empty() {
            info!(
                "Run name '{}' has been automatically generated",
                run.info.run_name
            );
        }
        MlflowTrackingRecorder::new(self.api.clone(), &run)
    }
}
