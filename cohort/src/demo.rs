//! A ring-graph patrolling environment with a policy and a trainer that do not
//! learn, enough to drive a [`Runner`](cohort_core::Runner) end to end.
mod ring_patrol;
mod uniform;
pub use ring_patrol::{RingPatrolConfig, RingPatrolEnv, BACKWARD, FORWARD, STAY};
pub use uniform::{FrozenTrainer, UniformPolicy};
