use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ExperimentTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
/// Experiment as returned by `experiments/get-by-name`.
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: Option<String>,
    pub lifecycle_stage: Option<String>,
    pub tags: Option<Vec<ExperimentTag>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetExperimentResponse {
    pub(crate) experiment: Experiment,
}
