//! Configuration of [`Runner`](super::Runner).
use crate::{base::VecEnvSpec, buffer::RolloutBufferConfig, error::ConfigError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`Runner`](super::Runner).
///
/// Intervals are counted in environment steps summed over all threads.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RunnerConfig {
    /// Name of the environment, used in checkpoint file names.
    pub env_name: String,

    /// Name of the algorithm, used in checkpoint file names.
    pub algorithm_name: String,

    /// Name of the experiment.
    pub experiment_name: String,

    /// Random seed of the training environment.
    pub seed: i64,

    /// Number of steps in a rollout window.
    pub episode_length: usize,

    /// Number of threads of the training environment.
    pub n_rollout_threads: usize,

    /// Number of threads of the evaluation environment.
    pub n_eval_rollout_threads: usize,

    /// Number of agents in each thread.
    pub num_agents: usize,

    /// Budget of environment steps.
    pub num_env_steps: usize,

    /// Interval of saving checkpoints.
    pub save_interval: usize,

    /// Interval of writing training and environment records.
    pub log_interval: usize,

    /// Interval of evaluation.
    pub eval_interval: usize,

    /// Whether to evaluate during training.
    pub use_eval: bool,

    /// Number of episodes in an evaluation.
    pub eval_episodes: usize,

    /// Whether actions are taken deterministically in evaluation.
    pub eval_deterministic: bool,

    /// Whether to decay the learning rate linearly over the run.
    pub use_linear_lr_decay: bool,

    /// Checkpoint to restore before training.
    pub model_dir: Option<PathBuf>,

    /// Directory of checkpoints.
    pub save_dir: PathBuf,

    /// Directory of run outputs like GIF files.
    pub run_dir: PathBuf,

    /// Number of stacked recurrent layers.
    pub recurrent_n: usize,

    /// Size of a recurrent hidden state.
    pub hidden_size: usize,

    /// Number of episodes to render.
    pub render_episodes: usize,

    /// Whether rendered episodes are saved as GIF files.
    pub save_gifs: bool,

    /// Interval between frames of GIF files in seconds.
    pub ifi: f32,

    /// Scalar info fields averaged over each log interval.
    pub scalar_info_keys: Vec<String>,

    /// Per-node info fields averaged over each log interval, one metric per node.
    pub array_info_keys: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            env_name: "ring_patrol".to_string(),
            algorithm_name: "rmappo".to_string(),
            experiment_name: "check".to_string(),
            seed: 1,
            episode_length: 200,
            n_rollout_threads: 1,
            n_eval_rollout_threads: 1,
            num_agents: 1,
            num_env_steps: 10_000_000,
            save_interval: 100_000,
            log_interval: 10_000,
            eval_interval: 100_000,
            use_eval: false,
            eval_episodes: 32,
            eval_deterministic: true,
            use_linear_lr_decay: false,
            model_dir: None,
            save_dir: PathBuf::from("./models"),
            run_dir: PathBuf::from("./runs"),
            recurrent_n: 1,
            hidden_size: 64,
            render_episodes: 5,
            save_gifs: false,
            ifi: 0.1,
            scalar_info_keys: vec!["total_state".to_string(), "agent_count".to_string()],
            array_info_keys: vec!["node_visits".to_string()],
        }
    }
}

impl RunnerConfig {
    /// Sets the name of the environment.
    pub fn env_name(mut self, v: impl Into<String>) -> Self {
        self.env_name = v.into();
        self
    }

    /// Sets the name of the algorithm.
    pub fn algorithm_name(mut self, v: impl Into<String>) -> Self {
        self.algorithm_name = v.into();
        self
    }

    /// Sets the name of the experiment.
    pub fn experiment_name(mut self, v: impl Into<String>) -> Self {
        self.experiment_name = v.into();
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the number of steps in a rollout window.
    pub fn episode_length(mut self, v: usize) -> Self {
        self.episode_length = v;
        self
    }

    /// Sets the number of training threads.
    pub fn n_rollout_threads(mut self, v: usize) -> Self {
        self.n_rollout_threads = v;
        self
    }

    /// Sets the number of evaluation threads.
    pub fn n_eval_rollout_threads(mut self, v: usize) -> Self {
        self.n_eval_rollout_threads = v;
        self
    }

    /// Sets the number of agents.
    pub fn num_agents(mut self, v: usize) -> Self {
        self.num_agents = v;
        self
    }

    /// Sets the budget of environment steps.
    pub fn num_env_steps(mut self, v: usize) -> Self {
        self.num_env_steps = v;
        self
    }

    /// Sets the interval of saving checkpoints.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of writing records.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    /// Sets the interval of evaluation.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Enables or disables evaluation.
    pub fn use_eval(mut self, v: bool) -> Self {
        self.use_eval = v;
        self
    }

    /// Sets the number of episodes in an evaluation.
    pub fn eval_episodes(mut self, v: usize) -> Self {
        self.eval_episodes = v;
        self
    }

    /// Sets whether evaluation is deterministic.
    pub fn eval_deterministic(mut self, v: bool) -> Self {
        self.eval_deterministic = v;
        self
    }

    /// Enables or disables linear decay of the learning rate.
    pub fn use_linear_lr_decay(mut self, v: bool) -> Self {
        self.use_linear_lr_decay = v;
        self
    }

    /// Sets the checkpoint to restore.
    pub fn model_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the directory of checkpoints.
    pub fn save_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.save_dir = v.into();
        self
    }

    /// Sets the directory of run outputs.
    pub fn run_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.run_dir = v.into();
        self
    }

    /// Sets the number of stacked recurrent layers.
    pub fn recurrent_n(mut self, v: usize) -> Self {
        self.recurrent_n = v;
        self
    }

    /// Sets the size of a recurrent hidden state.
    pub fn hidden_size(mut self, v: usize) -> Self {
        self.hidden_size = v;
        self
    }

    /// Sets the number of episodes to render.
    pub fn render_episodes(mut self, v: usize) -> Self {
        self.render_episodes = v;
        self
    }

    /// Sets whether rendered episodes are saved as GIF files.
    pub fn save_gifs(mut self, v: bool) -> Self {
        self.save_gifs = v;
        self
    }

    /// Sets the interval between GIF frames in seconds.
    pub fn ifi(mut self, v: f32) -> Self {
        self.ifi = v;
        self
    }

    /// Sets the scalar info fields to log.
    pub fn scalar_info_keys(mut self, v: Vec<String>) -> Self {
        self.scalar_info_keys = v;
        self
    }

    /// Sets the per-node info fields to log.
    pub fn array_info_keys(mut self, v: Vec<String>) -> Self {
        self.array_info_keys = v;
        self
    }

    /// Number of training iterations the step budget allows.
    pub fn n_iterations(&self) -> usize {
        self.num_env_steps / self.episode_length / self.n_rollout_threads
    }

    /// Path of GIF files.
    pub fn gif_dir(&self) -> PathBuf {
        self.run_dir.join("gifs")
    }

    /// Checks the sizes the runner divides by or allocates with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut sizes = vec![
            ("episode_length", self.episode_length),
            ("n_rollout_threads", self.n_rollout_threads),
            ("num_agents", self.num_agents),
            ("recurrent_n", self.recurrent_n),
            ("hidden_size", self.hidden_size),
        ];
        if self.use_eval {
            sizes.push(("n_eval_rollout_threads", self.n_eval_rollout_threads));
        }
        for &(name, v) in sizes.iter() {
            if v == 0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        Ok(())
    }

    /// Checks the configuration against an environment.
    pub fn check_env(&self, n_threads: usize, spec: &VecEnvSpec) -> Result<(), ConfigError> {
        if n_threads != self.n_rollout_threads {
            return Err(ConfigError::EnvMismatch {
                name: "n_rollout_threads",
                expected: self.n_rollout_threads,
                actual: n_threads,
            });
        }
        if spec.n_agents != self.num_agents {
            return Err(ConfigError::EnvMismatch {
                name: "num_agents",
                expected: self.num_agents,
                actual: spec.n_agents,
            });
        }
        Ok(())
    }

    /// Configuration of the rollout buffer for an environment.
    pub fn buffer_config(&self, spec: &VecEnvSpec) -> RolloutBufferConfig {
        RolloutBufferConfig::default()
            .horizon(self.episode_length)
            .n_threads(self.n_rollout_threads)
            .recurrent_n(self.recurrent_n)
            .hidden_size(self.hidden_size)
            .env_spec(spec)
    }

    /// Constructs [`RunnerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RunnerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_runner_config() -> Result<()> {
        let config = RunnerConfig::default()
            .episode_length(25)
            .n_rollout_threads(4)
            .num_agents(3)
            .use_eval(true)
            .model_dir("some/model.ckpt")
            .array_info_keys(vec![]);

        let dir = TempDir::new("runner_config")?;
        let path = dir.path().join("runner_config.yaml");
        config.save(&path)?;
        let config_ = RunnerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_n_iterations() {
        let config = RunnerConfig::default()
            .num_env_steps(10_000)
            .episode_length(100)
            .n_rollout_threads(3);
        assert_eq!(config.n_iterations(), 33);
    }

    #[test]
    fn test_validate() {
        assert!(RunnerConfig::default().validate().is_ok());
        assert_eq!(
            RunnerConfig::default().episode_length(0).validate(),
            Err(ConfigError::NonPositive("episode_length"))
        );
        assert!(RunnerConfig::default()
            .n_eval_rollout_threads(0)
            .validate()
            .is_ok());
        assert_eq!(
            RunnerConfig::default()
                .use_eval(true)
                .n_eval_rollout_threads(0)
                .validate(),
            Err(ConfigError::NonPositive("n_eval_rollout_threads"))
        );
    }

    #[test]
    fn test_check_env() {
        let spec = VecEnvSpec {
            n_agents: 2,
            obs_dim: 1,
            share_obs_dim: 1,
            n_actions: 1,
            act_dim: 1,
        };
        let config = RunnerConfig::default().num_agents(2).n_rollout_threads(3);
        assert!(config.check_env(3, &spec).is_ok());
        assert!(matches!(
            config.check_env(2, &spec),
            Err(ConfigError::EnvMismatch { name: "n_rollout_threads", .. })
        ));
    }
}
