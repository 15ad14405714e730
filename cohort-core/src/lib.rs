#![warn(missing_docs)]
//! Rollout orchestration for multi-agent on-policy reinforcement learning.
//!
//! A [`Runner`] drives a [`VecEnv`], a batch of simulation replicas ("threads")
//! each holding several agents, with the policy of a [`Trainer`]. Steps of all
//! threads and agents are stored in a [`RolloutBuffer`] and handed to the
//! trainer once a window of `episode_length` steps is complete. Recurrent states
//! are reset per agent at episode boundaries, see [`recurrent`]. Evaluation
//! spreads a fixed number of episodes over the threads of a separate environment
//! with [`EpisodeQuota`].
//!
//! Networks, losses and environments live outside of this crate, behind the
//! [`Policy`], [`Trainer`] and [`VecEnv`] traits.
pub mod dummy;
pub mod error;
pub mod evaluator;
pub mod record;
pub mod recurrent;
pub mod util;

mod actor_critic;
pub use actor_critic::{ActorCriticArch, ActorCriticConfig, Base, Recurrence, ValueHead};

mod base;
pub use base::{
    decompose, ActionEvaluation, CombinedObs, Policy, PolicyOutput, ThreadActions, Trainer,
    VecEnv, VecEnvSpec, VecStep,
};

mod buffer;
pub use buffer::{RolloutBuffer, RolloutBufferConfig, Transition};

mod checkpoint;
pub use checkpoint::Checkpoint;

pub use evaluator::{EpisodeQuota, EpisodeResult, EvalSummary, Evaluator, QuotaEvaluator};

mod runner;
pub use runner::{Runner, RunnerConfig};
