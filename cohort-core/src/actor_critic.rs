//! Selection of the actor-critic architecture.
//!
//! [`ActorCriticConfig`] mirrors the flags a user sets on the command line or in
//! a YAML file. [`ActorCriticConfig::validate`] resolves them into an
//! [`ActorCriticArch`], which is what [`Policy`](crate::Policy) implementations
//! match on when they build their networks. Combinations without an
//! implementation are rejected here, before any network or environment exists.
use crate::error::ConfigError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Feature extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Base {
    /// Convolutional, for image observations of rank 3.
    Cnn,

    /// Fully connected, for flat observations.
    Mlp,

    /// Graph network, optionally followed by a fully connected head.
    Gnn {
        /// Whether the graph features pass through a fully connected head.
        mlp_head: bool,
    },
}

/// Recurrent layer after the feature extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recurrence {
    /// No recurrent layer.
    None,

    /// A single recurrent cell without sequence chunking.
    Naive,

    /// A stacked recurrent layer.
    Recurrent {
        /// Number of stacked layers.
        layers: usize,
    },
}

/// Output head of the critic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueHead {
    /// Plain linear layer.
    Linear,

    /// Linear layer with adaptive value normalization.
    PopArt,
}

/// Resolved architecture of an actor-critic policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorCriticArch {
    /// Feature extractor of the actor.
    pub actor_base: Base,

    /// Feature extractor of the critic.
    pub critic_base: Base,

    /// Recurrent layer shared by the actor and the critic.
    pub recurrence: Recurrence,

    /// Output head of the critic.
    pub value_head: ValueHead,

    /// Size of hidden features and recurrent states.
    pub hidden_size: usize,
}

/// Configuration flags of an actor-critic policy.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct ActorCriticConfig {
    /// Shape of the local observation of an agent.
    pub obs_shape: Vec<usize>,

    /// Shape of the centralized observation.
    pub share_obs_shape: Vec<usize>,

    /// Size of hidden features and recurrent states.
    pub hidden_size: usize,

    /// Number of stacked recurrent layers.
    pub recurrent_n: usize,

    /// Use a stacked recurrent layer.
    pub use_recurrent_policy: bool,

    /// Use a single recurrent cell.
    pub use_naive_recurrent_policy: bool,

    /// Use a graph network in the actor.
    pub use_gnn_policy: bool,

    /// Put a fully connected head after the graph network of the actor.
    pub use_gnn_mlp_policy: bool,

    /// Use a graph network in the critic.
    pub use_gnn_critic: bool,

    /// Normalize values with PopArt.
    pub use_popart: bool,
}

impl Default for ActorCriticConfig {
    fn default() -> Self {
        Self {
            obs_shape: vec![1],
            share_obs_shape: vec![1],
            hidden_size: 64,
            recurrent_n: 1,
            use_recurrent_policy: true,
            use_naive_recurrent_policy: false,
            use_gnn_policy: false,
            use_gnn_mlp_policy: false,
            use_gnn_critic: false,
            use_popart: false,
        }
    }
}

fn base_for_shape(shape: &[usize]) -> Base {
    if shape.len() == 3 {
        Base::Cnn
    } else {
        Base::Mlp
    }
}

impl ActorCriticConfig {
    /// Sets the shape of the local observation.
    pub fn obs_shape(mut self, v: Vec<usize>) -> Self {
        self.obs_shape = v;
        self
    }

    /// Sets the shape of the centralized observation.
    pub fn share_obs_shape(mut self, v: Vec<usize>) -> Self {
        self.share_obs_shape = v;
        self
    }

    /// Sets the size of hidden features.
    pub fn hidden_size(mut self, v: usize) -> Self {
        self.hidden_size = v;
        self
    }

    /// Sets the number of stacked recurrent layers.
    pub fn recurrent_n(mut self, v: usize) -> Self {
        self.recurrent_n = v;
        self
    }

    /// Enables or disables the stacked recurrent layer.
    pub fn use_recurrent_policy(mut self, v: bool) -> Self {
        self.use_recurrent_policy = v;
        self
    }

    /// Enables or disables the single recurrent cell.
    pub fn use_naive_recurrent_policy(mut self, v: bool) -> Self {
        self.use_naive_recurrent_policy = v;
        self
    }

    /// Enables or disables the graph network of the actor.
    pub fn use_gnn_policy(mut self, v: bool) -> Self {
        self.use_gnn_policy = v;
        self
    }

    /// Enables or disables the fully connected head after the graph network.
    pub fn use_gnn_mlp_policy(mut self, v: bool) -> Self {
        self.use_gnn_mlp_policy = v;
        self
    }

    /// Enables or disables the graph network of the critic.
    pub fn use_gnn_critic(mut self, v: bool) -> Self {
        self.use_gnn_critic = v;
        self
    }

    /// Enables or disables PopArt.
    pub fn use_popart(mut self, v: bool) -> Self {
        self.use_popart = v;
        self
    }

    /// Resolves the flags into an architecture.
    pub fn validate(&self) -> Result<ActorCriticArch, ConfigError> {
        if self.use_gnn_critic {
            return Err(ConfigError::GraphCriticUnsupported);
        }
        if self.use_gnn_mlp_policy && !self.use_gnn_policy {
            return Err(ConfigError::GraphHeadWithoutGraphBase);
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::NonPositive("hidden_size"));
        }

        let recurrence = match (self.use_recurrent_policy, self.use_naive_recurrent_policy) {
            (true, true) => return Err(ConfigError::ConflictingRecurrence),
            (false, false) => Recurrence::None,
            (false, true) => Recurrence::Naive,
            (true, false) => {
                if self.recurrent_n == 0 {
                    return Err(ConfigError::NonPositive("recurrent_n"));
                }
                Recurrence::Recurrent {
                    layers: self.recurrent_n,
                }
            }
        };

        let actor_base = if self.use_gnn_policy {
            Base::Gnn {
                mlp_head: self.use_gnn_mlp_policy,
            }
        } else {
            base_for_shape(&self.obs_shape)
        };

        Ok(ActorCriticArch {
            actor_base,
            critic_base: base_for_shape(&self.share_obs_shape),
            recurrence,
            value_head: if self.use_popart {
                ValueHead::PopArt
            } else {
                ValueHead::Linear
            },
            hidden_size: self.hidden_size,
        })
    }

    /// Constructs [`ActorCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorCriticConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_arch() {
        let arch = ActorCriticConfig::default().validate().unwrap();
        assert_eq!(arch.actor_base, Base::Mlp);
        assert_eq!(arch.critic_base, Base::Mlp);
        assert_eq!(arch.recurrence, Recurrence::Recurrent { layers: 1 });
        assert_eq!(arch.value_head, ValueHead::Linear);
    }

    #[test]
    fn test_graph_actor_with_image_critic() {
        let arch = ActorCriticConfig::default()
            .share_obs_shape(vec![3, 32, 32])
            .use_gnn_policy(true)
            .use_gnn_mlp_policy(true)
            .use_recurrent_policy(false)
            .use_popart(true)
            .validate()
            .unwrap();
        assert_eq!(arch.actor_base, Base::Gnn { mlp_head: true });
        assert_eq!(arch.critic_base, Base::Cnn);
        assert_eq!(arch.recurrence, Recurrence::None);
        assert_eq!(arch.value_head, ValueHead::PopArt);
    }

    #[test]
    fn test_rejected_combinations() {
        let c = ActorCriticConfig::default();
        assert_eq!(
            c.clone().use_gnn_critic(true).validate(),
            Err(ConfigError::GraphCriticUnsupported)
        );
        assert_eq!(
            c.clone().use_gnn_mlp_policy(true).validate(),
            Err(ConfigError::GraphHeadWithoutGraphBase)
        );
        assert_eq!(
            c.clone().use_naive_recurrent_policy(true).validate(),
            Err(ConfigError::ConflictingRecurrence)
        );
        assert_eq!(
            c.recurrent_n(0).validate(),
            Err(ConfigError::NonPositive("recurrent_n"))
        );
    }
}
