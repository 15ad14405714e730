//! Trainer.
use super::Policy;
use crate::{record::Record, Checkpoint, RolloutBuffer};
use anyhow::Result;
use ndarray::ArrayView3;

/// Owns a [`Policy`] and updates its parameters from rollout windows.
///
/// The runner never touches the parameters of the policy: it runs inference
/// through [`Trainer::policy`] and hands complete windows of the
/// [`RolloutBuffer`] to [`Trainer::compute_returns`] and [`Trainer::train`].
pub trait Trainer {
    /// The policy being trained.
    type Policy: Policy;

    /// Returns the policy for inference.
    fn policy(&mut self) -> &mut Self::Policy;

    /// Switches the policy to rollout (inference) mode.
    fn prep_rollout(&mut self);

    /// Switches the policy to training mode.
    fn prep_training(&mut self);

    /// Computes returns and advantages over the full window of `buffer`.
    ///
    /// `next_values` is `[n_threads, n_agents, 1]`, the value predicted for the
    /// observation following the last step of the window.
    fn compute_returns(&mut self, buffer: &RolloutBuffer, next_values: ArrayView3<f32>)
        -> Result<()>;

    /// Updates the policy with the window and returns training statistics.
    fn train(&mut self, buffer: &RolloutBuffer) -> Result<Record>;

    /// Decays the learning rate linearly, `iteration` out of `total` iterations.
    fn lr_decay(&mut self, iteration: usize, total: usize);

    /// Snapshots the policy parameters and the optimizer state.
    fn checkpoint(&self) -> Result<Checkpoint>;

    /// Restores the policy parameters and the optimizer state.
    fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}
