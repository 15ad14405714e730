use serde::Deserialize;

/// Run as returned by `runs/create`.
#[derive(Debug, Deserialize)]
pub struct Run {
    pub info: RunInfo,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    status: Option<String>,
    start_time: Option<i64>,
    artifact_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRunResponse {
    pub(crate) run: Run,
}
