//! Configuration of [`RolloutBuffer`](super::RolloutBuffer).
use crate::{base::VecEnvSpec, error::ConfigError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`RolloutBuffer`](super::RolloutBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct RolloutBufferConfig {
    /// Number of steps in a rollout window.
    pub horizon: usize,

    /// Number of threads.
    pub n_threads: usize,

    /// Number of agents in each thread.
    pub n_agents: usize,

    /// Dimension of the local observation.
    pub obs_dim: usize,

    /// Dimension of the centralized observation.
    pub share_obs_dim: usize,

    /// Width of the available-action mask.
    pub n_actions: usize,

    /// Dimension of an action.
    pub act_dim: usize,

    /// Number of recurrent layers.
    pub recurrent_n: usize,

    /// Size of a recurrent hidden state.
    pub hidden_size: usize,
}

impl Default for RolloutBufferConfig {
    fn default() -> Self {
        Self {
            horizon: 200,
            n_threads: 1,
            n_agents: 1,
            obs_dim: 1,
            share_obs_dim: 1,
            n_actions: 1,
            act_dim: 1,
            recurrent_n: 1,
            hidden_size: 64,
        }
    }
}

impl RolloutBufferConfig {
    /// Sets the number of steps in a rollout window.
    pub fn horizon(mut self, v: usize) -> Self {
        self.horizon = v;
        self
    }

    /// Sets the number of threads.
    pub fn n_threads(mut self, v: usize) -> Self {
        self.n_threads = v;
        self
    }

    /// Sets the number of agents.
    pub fn n_agents(mut self, v: usize) -> Self {
        self.n_agents = v;
        self
    }

    /// Sets the dimension of the local observation.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.obs_dim = v;
        self
    }

    /// Sets the dimension of the centralized observation.
    pub fn share_obs_dim(mut self, v: usize) -> Self {
        self.share_obs_dim = v;
        self
    }

    /// Sets the width of the available-action mask.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Sets the dimension of an action.
    pub fn act_dim(mut self, v: usize) -> Self {
        self.act_dim = v;
        self
    }

    /// Sets the number of recurrent layers.
    pub fn recurrent_n(mut self, v: usize) -> Self {
        self.recurrent_n = v;
        self
    }

    /// Sets the size of a recurrent hidden state.
    pub fn hidden_size(mut self, v: usize) -> Self {
        self.hidden_size = v;
        self
    }

    /// Takes the number of agents and the feature dimensions from an environment.
    pub fn env_spec(mut self, spec: &VecEnvSpec) -> Self {
        self.n_agents = spec.n_agents;
        self.obs_dim = spec.obs_dim;
        self.share_obs_dim = spec.share_obs_dim;
        self.n_actions = spec.n_actions;
        self.act_dim = spec.act_dim;
        self
    }

    /// Checks that every size is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("horizon", self.horizon),
            ("n_threads", self.n_threads),
            ("n_agents", self.n_agents),
            ("obs_dim", self.obs_dim),
            ("share_obs_dim", self.share_obs_dim),
            ("n_actions", self.n_actions),
            ("act_dim", self.act_dim),
            ("recurrent_n", self.recurrent_n),
            ("hidden_size", self.hidden_size),
        ];
        for &(name, v) in sizes.iter() {
            if v == 0 {
                return Err(ConfigError::NonPositive(name));
            }
        }
        Ok(())
    }

    /// Constructs [`RolloutBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RolloutBufferConfig`].
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
    fn test_serde_rollout_buffer_config() -> Result<()> {
        let config = RolloutBufferConfig::default()
            .horizon(4)
            .n_threads(3)
            .n_agents(2)
            .recurrent_n(2)
            .hidden_size(8);

        let dir = TempDir::new("rollout_buffer_config")?;
        let path = dir.path().join("rollout_buffer_config.yaml");
        config.save(&path)?;
        let config_ = RolloutBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(RolloutBufferConfig::default().validate().is_ok());
        assert_eq!(
            RolloutBufferConfig::default().hidden_size(0).validate(),
            Err(ConfigError::NonPositive("hidden_size"))
        );
    }
}
