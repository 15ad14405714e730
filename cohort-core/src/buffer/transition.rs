//! One step of all threads.
use ndarray::{Array3, Array4};

/// Data of one step across all threads and agents, as inserted into
/// [`RolloutBuffer`](super::RolloutBuffer).
///
/// Every array is laid out `[n_threads, n_agents, ...]`. The observation-like
/// fields describe the state *after* the step, the action-like fields the step
/// itself.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Local observations after the step, `[.., obs_dim]`.
    pub obs: Array3<f32>,

    /// Centralized observations after the step, `[.., share_obs_dim]`.
    pub share_obs: Array3<f32>,

    /// Available-action masks after the step, `[.., n_actions]`.
    pub available_actions: Array3<f32>,

    /// Actor recurrent states to use at the next step, `[.., recurrent_n, hidden_size]`.
    pub rnn_states: Array4<f32>,

    /// Critic recurrent states to use at the next step, `[.., recurrent_n, hidden_size]`.
    pub rnn_states_critic: Array4<f32>,

    /// Continuation masks for the next step, `[.., 1]`.
    pub masks: Array3<f32>,

    /// Steps each agent took since it was last ready, `[.., 1]`.
    pub delta_steps: Array3<f32>,

    /// Actions taken, `[.., act_dim]`.
    pub actions: Array3<f32>,

    /// Log-probabilities of the actions, `[.., act_dim]`.
    pub action_log_probs: Array3<f32>,

    /// Value predictions, `[.., 1]`.
    pub value_preds: Array3<f32>,

    /// Rewards, `[.., 1]`.
    pub rewards: Array3<f32>,
}
