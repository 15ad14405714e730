//! Policy.
use anyhow::Result;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// Output of [`Policy::get_actions`].
///
/// The leading axis of every array is the flattened `n_threads * n_agents` batch.
#[derive(Clone, Debug)]
pub struct PolicyOutput {
    /// Value predictions, `[batch, 1]`.
    pub values: Array2<f32>,

    /// Actions, `[batch, act_dim]`.
    pub actions: Array2<f32>,

    /// Log-probabilities of the actions, `[batch, act_dim]`.
    pub action_log_probs: Array2<f32>,

    /// Actor recurrent states after this step, `[batch, recurrent_n, hidden_size]`.
    pub rnn_states: Array3<f32>,

    /// Critic recurrent states after this step, `[batch, recurrent_n, hidden_size]`.
    pub rnn_states_critic: Array3<f32>,
}

/// Output of [`Policy::evaluate_actions`].
#[derive(Clone, Debug)]
pub struct ActionEvaluation {
    /// Value predictions, `[batch, 1]`.
    pub values: Array2<f32>,

    /// Log-probabilities of the given actions, `[batch, act_dim]`.
    pub action_log_probs: Array2<f32>,

    /// Mean entropy of the action distribution.
    pub entropy: f32,
}

/// An actor-critic policy with optional recurrent state.
///
/// Every method works on flattened batches: the first axis enumerates
/// `(thread, agent)` pairs thread-major, i.e., index `e * n_agents + a`.
/// The recurrent states returned by a method are the states to carry into the next
/// step, and callers must keep them even when they are not used right away.
///
/// Which network backbone sits behind the trait is decided when the policy is
/// built, see [`ActorCriticConfig`](crate::ActorCriticConfig).
pub trait Policy {
    /// Samples actions and predicts values.
    ///
    /// `masks` is `[batch, 1]`; 0 tells the recurrent layers to discard the given state.
    #[allow(clippy::too_many_arguments)]
    fn get_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        rnn_states_critic: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<PolicyOutput>;

    /// Predicts values, `[batch, 1]`.
    fn get_values(
        &mut self,
        share_obs: ArrayView2<f32>,
        rnn_states_critic: ArrayView3<f32>,
        masks: ArrayView2<f32>,
    ) -> Result<Array2<f32>>;

    /// Computes actions with the actor only.
    ///
    /// Returns the actions and the actor recurrent states after this step.
    fn act(
        &mut self,
        obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<(Array2<f32>, Array3<f32>)>;

    /// Evaluates given actions for the policy update.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        rnn_states_critic: ArrayView3<f32>,
        actions: ArrayView2<f32>,
        masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        active_masks: Option<ArrayView2<f32>>,
    ) -> Result<ActionEvaluation>;
}
