//! Interfaces of the collaborators driven by the runner.
mod env;
mod policy;
mod trainer;
pub use env::{decompose, CombinedObs, ThreadActions, VecEnv, VecEnvSpec, VecStep};
pub use policy::{ActionEvaluation, Policy, PolicyOutput};
pub use trainer::Trainer;
