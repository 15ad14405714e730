//! Rollout buffer.
use super::{RolloutBufferConfig, Transition};
use crate::{error::CohortError, util::check_shape};
use anyhow::Result;
use ndarray::{s, Array4, Array5, ArrayView3, Axis};

/// Stores one rollout window of all threads and agents.
///
/// Observation-like fields (`obs`, `share_obs`, `available_actions`,
/// `rnn_states`, `rnn_states_critic`, `masks`, `delta_steps`) hold `horizon + 1`
/// slots: slot `t` is what the policy sees at step `t`. Action-like fields
/// (`actions`, `action_log_probs`, `value_preds`, `rewards`) hold `horizon`
/// slots, one per step. [`RolloutBuffer::insert`] at step `t` writes the former
/// at `t + 1` and the latter at `t`.
///
/// Every array is laid out `[t, thread, agent, ...]`.
pub struct RolloutBuffer {
    config: RolloutBufferConfig,
    obs: Array4<f32>,
    share_obs: Array4<f32>,
    available_actions: Array4<f32>,
    rnn_states: Array5<f32>,
    rnn_states_critic: Array5<f32>,
    masks: Array4<f32>,
    delta_steps: Array4<f32>,
    actions: Array4<f32>,
    action_log_probs: Array4<f32>,
    value_preds: Array4<f32>,
    rewards: Array4<f32>,
    written: usize,
}

impl RolloutBuffer {
    /// Constructs an empty buffer.
    pub fn build(config: &RolloutBufferConfig) -> Result<Self> {
        config.validate().map_err(CohortError::from)?;
        let c = config;
        let (h, n, a) = (c.horizon, c.n_threads, c.n_agents);
        let rnn_dim = (h + 1, n, a, c.recurrent_n, c.hidden_size);

        Ok(Self {
            config: config.clone(),
            obs: Array4::zeros((h + 1, n, a, c.obs_dim)),
            share_obs: Array4::zeros((h + 1, n, a, c.share_obs_dim)),
            available_actions: Array4::ones((h + 1, n, a, c.n_actions)),
            rnn_states: Array5::zeros(rnn_dim),
            rnn_states_critic: Array5::zeros(rnn_dim),
            masks: Array4::ones((h + 1, n, a, 1)),
            delta_steps: Array4::ones((h + 1, n, a, 1)),
            actions: Array4::zeros((h, n, a, c.act_dim)),
            action_log_probs: Array4::zeros((h, n, a, c.act_dim)),
            value_preds: Array4::zeros((h, n, a, 1)),
            rewards: Array4::zeros((h, n, a, 1)),
            written: 0,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RolloutBufferConfig {
        &self.config
    }

    /// Number of steps in a window.
    pub fn horizon(&self) -> usize {
        self.config.horizon
    }

    /// Number of steps written in the current window.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Returns `true` if every step of the current window was written.
    pub fn is_full(&self) -> bool {
        self.written == self.config.horizon
    }

    /// Fails unless the current window is full.
    pub fn ensure_full(&self) -> Result<(), CohortError> {
        if !self.is_full() {
            return Err(CohortError::IncompleteWindow {
                written: self.written,
                horizon: self.config.horizon,
            });
        }
        Ok(())
    }

    fn feature_shape(&self, dim: usize) -> [usize; 3] {
        [self.config.n_threads, self.config.n_agents, dim]
    }

    fn rnn_shape(&self) -> [usize; 4] {
        [
            self.config.n_threads,
            self.config.n_agents,
            self.config.recurrent_n,
            self.config.hidden_size,
        ]
    }

    /// Seeds slot 0 of a new window with observations from a reset.
    ///
    /// Recurrent states of slot 0 are set to zero and masks to one.
    pub fn initialize(
        &mut self,
        obs: ArrayView3<f32>,
        share_obs: ArrayView3<f32>,
        available_actions: ArrayView3<f32>,
    ) -> Result<(), CohortError> {
        let c = &self.config;
        check_shape("obs", &self.feature_shape(c.obs_dim), obs.shape())?;
        check_shape("share_obs", &self.feature_shape(c.share_obs_dim), share_obs.shape())?;
        check_shape(
            "available_actions",
            &self.feature_shape(c.n_actions),
            available_actions.shape(),
        )?;

        self.obs.index_axis_mut(Axis(0), 0).assign(&obs);
        self.share_obs.index_axis_mut(Axis(0), 0).assign(&share_obs);
        self.available_actions
            .index_axis_mut(Axis(0), 0)
            .assign(&available_actions);
        self.rnn_states.index_axis_mut(Axis(0), 0).fill(0.);
        self.rnn_states_critic.index_axis_mut(Axis(0), 0).fill(0.);
        self.masks.index_axis_mut(Axis(0), 0).fill(1.);
        self.delta_steps.index_axis_mut(Axis(0), 0).fill(1.);
        self.written = 0;
        Ok(())
    }

    fn check_transition(&self, tr: &Transition) -> Result<(), CohortError> {
        let c = &self.config;
        check_shape("obs", &self.feature_shape(c.obs_dim), tr.obs.shape())?;
        check_shape("share_obs", &self.feature_shape(c.share_obs_dim), tr.share_obs.shape())?;
        check_shape(
            "available_actions",
            &self.feature_shape(c.n_actions),
            tr.available_actions.shape(),
        )?;
        check_shape("rnn_states", &self.rnn_shape(), tr.rnn_states.shape())?;
        check_shape("rnn_states_critic", &self.rnn_shape(), tr.rnn_states_critic.shape())?;
        check_shape("masks", &self.feature_shape(1), tr.masks.shape())?;
        check_shape("delta_steps", &self.feature_shape(1), tr.delta_steps.shape())?;
        check_shape("actions", &self.feature_shape(c.act_dim), tr.actions.shape())?;
        check_shape(
            "action_log_probs",
            &self.feature_shape(c.act_dim),
            tr.action_log_probs.shape(),
        )?;
        check_shape("value_preds", &self.feature_shape(1), tr.value_preds.shape())?;
        check_shape("rewards", &self.feature_shape(1), tr.rewards.shape())?;
        Ok(())
    }

    /// Writes the transition of step `step`.
    ///
    /// # Panics
    ///
    /// Panics if `step >= horizon`.
    pub fn insert(&mut self, step: usize, tr: &Transition) -> Result<(), CohortError> {
        assert!(
            step < self.config.horizon,
            "step {} is out of the window of {} steps",
            step,
            self.config.horizon
        );
        self.check_transition(tr)?;

        let next = step + 1;
        self.obs.index_axis_mut(Axis(0), next).assign(&tr.obs);
        self.share_obs.index_axis_mut(Axis(0), next).assign(&tr.share_obs);
        self.available_actions
            .index_axis_mut(Axis(0), next)
            .assign(&tr.available_actions);
        self.rnn_states.index_axis_mut(Axis(0), next).assign(&tr.rnn_states);
        self.rnn_states_critic
            .index_axis_mut(Axis(0), next)
            .assign(&tr.rnn_states_critic);
        self.masks.index_axis_mut(Axis(0), next).assign(&tr.masks);
        self.delta_steps.index_axis_mut(Axis(0), next).assign(&tr.delta_steps);

        self.actions.index_axis_mut(Axis(0), step).assign(&tr.actions);
        self.action_log_probs
            .index_axis_mut(Axis(0), step)
            .assign(&tr.action_log_probs);
        self.value_preds.index_axis_mut(Axis(0), step).assign(&tr.value_preds);
        self.rewards.index_axis_mut(Axis(0), step).assign(&tr.rewards);

        self.written = (self.written + 1).min(self.config.horizon);
        log::trace!("Inserted step {} ({} written)", step, self.written);
        Ok(())
    }

    /// Carries the last slot of the window into slot 0 and marks the window empty.
    pub fn after_update(&mut self) {
        let h = self.config.horizon;
        copy_last_to_first(&mut self.obs, h);
        copy_last_to_first(&mut self.share_obs, h);
        copy_last_to_first(&mut self.available_actions, h);
        copy_last_to_first(&mut self.masks, h);
        copy_last_to_first(&mut self.delta_steps, h);

        copy_last_to_first_rnn(&mut self.rnn_states, h);
        copy_last_to_first_rnn(&mut self.rnn_states_critic, h);

        self.written = 0;
    }

    /// Mean reward per step scaled by the horizon.
    pub fn average_episode_rewards(&self) -> f32 {
        self.rewards.mean().unwrap_or(0.) * self.config.horizon as f32
    }

    /// Local observations, `[horizon + 1, n_threads, n_agents, obs_dim]`.
    pub fn obs(&self) -> &Array4<f32> {
        &self.obs
    }

    /// Centralized observations, `[horizon + 1, n_threads, n_agents, share_obs_dim]`.
    pub fn share_obs(&self) -> &Array4<f32> {
        &self.share_obs
    }

    /// Available-action masks, `[horizon + 1, n_threads, n_agents, n_actions]`.
    pub fn available_actions(&self) -> &Array4<f32> {
        &self.available_actions
    }

    /// Actor recurrent states, `[horizon + 1, n_threads, n_agents, recurrent_n, hidden_size]`.
    pub fn rnn_states(&self) -> &Array5<f32> {
        &self.rnn_states
    }

    /// Critic recurrent states, `[horizon + 1, n_threads, n_agents, recurrent_n, hidden_size]`.
    pub fn rnn_states_critic(&self) -> &Array5<f32> {
        &self.rnn_states_critic
    }

    /// Continuation masks, `[horizon + 1, n_threads, n_agents, 1]`.
    pub fn masks(&self) -> &Array4<f32> {
        &self.masks
    }

    /// Steps since each agent was last ready, `[horizon + 1, n_threads, n_agents, 1]`.
    pub fn delta_steps(&self) -> &Array4<f32> {
        &self.delta_steps
    }

    /// Actions, `[horizon, n_threads, n_agents, act_dim]`.
    pub fn actions(&self) -> &Array4<f32> {
        &self.actions
    }

    /// Log-probabilities of the actions, `[horizon, n_threads, n_agents, act_dim]`.
    pub fn action_log_probs(&self) -> &Array4<f32> {
        &self.action_log_probs
    }

    /// Value predictions, `[horizon, n_threads, n_agents, 1]`.
    pub fn value_preds(&self) -> &Array4<f32> {
        &self.value_preds
    }

    /// Rewards, `[horizon, n_threads, n_agents, 1]`.
    pub fn rewards(&self) -> &Array4<f32> {
        &self.rewards
    }
}

fn copy_last_to_first(x: &mut Array4<f32>, h: usize) {
    let (mut first, last) = x.multi_slice_mut((s![0, .., .., ..], s![h, .., .., ..]));
    first.assign(&last);
}

fn copy_last_to_first_rnn(x: &mut Array5<f32>, h: usize) {
    let (mut first, last) = x.multi_slice_mut((s![0, .., .., .., ..], s![h, .., .., .., ..]));
    first.assign(&last);
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{Array3, Array4};

    fn config() -> RolloutBufferConfig {
        RolloutBufferConfig::default()
            .horizon(4)
            .n_threads(1)
            .n_agents(2)
            .obs_dim(3)
            .share_obs_dim(6)
            .n_actions(5)
            .act_dim(1)
            .recurrent_n(1)
            .hidden_size(2)
    }

    fn transition(c: &RolloutBufferConfig, v: f32) -> Transition {
        let (n, a) = (c.n_threads, c.n_agents);
        let rnn = (n, a, c.recurrent_n, c.hidden_size);
        Transition {
            obs: Array3::from_elem((n, a, c.obs_dim), v),
            share_obs: Array3::from_elem((n, a, c.share_obs_dim), v),
            available_actions: Array3::ones((n, a, c.n_actions)),
            rnn_states: Array4::from_elem(rnn, v),
            rnn_states_critic: Array4::from_elem(rnn, -v),
            masks: Array3::ones((n, a, 1)),
            delta_steps: Array3::ones((n, a, 1)),
            actions: Array3::from_elem((n, a, c.act_dim), v),
            action_log_probs: Array3::zeros((n, a, c.act_dim)),
            value_preds: Array3::from_elem((n, a, 1), v),
            rewards: Array3::from_elem((n, a, 1), 1.),
        }
    }

    fn initialized(c: &RolloutBufferConfig) -> RolloutBuffer {
        let mut buffer = RolloutBuffer::build(c).unwrap();
        let (n, a) = (c.n_threads, c.n_agents);
        buffer
            .initialize(
                Array3::from_elem((n, a, c.obs_dim), -1.).view(),
                Array3::from_elem((n, a, c.share_obs_dim), -1.).view(),
                Array3::ones((n, a, c.n_actions)).view(),
            )
            .unwrap();
        buffer
    }

    #[test]
    fn test_full_window_without_dones() {
        let c = config();
        let mut buffer = initialized(&c);
        for t in 0..c.horizon {
            assert!(!buffer.is_full());
            buffer.insert(t, &transition(&c, t as f32 + 1.)).unwrap();
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.obs().shape(), &[5, 1, 2, 3]);
        assert_eq!(buffer.actions().shape(), &[4, 1, 2, 1]);
        assert!(buffer.masks().iter().all(|&m| m == 1.));

        // Observation of step t lands at t + 1, its action at t
        for t in 0..c.horizon {
            assert_eq!(buffer.obs()[[t + 1, 0, 1, 0]], t as f32 + 1.);
            assert_eq!(buffer.actions()[[t, 0, 1, 0]], t as f32 + 1.);
        }
        assert_eq!(buffer.obs()[[0, 0, 0, 0]], -1.);
        assert_eq!(buffer.average_episode_rewards(), 4.);
    }

    #[test]
    fn test_after_update_carries_last_slot() {
        let c = config();
        let mut buffer = initialized(&c);
        for t in 0..c.horizon {
            buffer.insert(t, &transition(&c, t as f32 + 1.)).unwrap();
        }
        buffer.after_update();
        assert_eq!(buffer.written(), 0);
        assert!(buffer.ensure_full().is_err());
        assert_eq!(buffer.obs().index_axis(Axis(0), 0), buffer.obs().index_axis(Axis(0), 4));
        assert_eq!(buffer.rnn_states()[[0, 0, 1, 0, 1]], 4.);
        assert_eq!(buffer.rnn_states_critic()[[0, 0, 0, 0, 0]], -4.);
        assert_eq!(buffer.share_obs()[[0, 0, 0, 5]], 4.);
    }

    #[test]
    fn test_initialize_resets_recurrent_slot() {
        let c = config();
        let mut buffer = initialized(&c);
        for t in 0..c.horizon {
            buffer.insert(t, &transition(&c, 2.)).unwrap();
        }
        buffer.after_update();
        buffer
            .initialize(
                Array3::zeros((1, 2, 3)).view(),
                Array3::zeros((1, 2, 6)).view(),
                Array3::ones((1, 2, 5)).view(),
            )
            .unwrap();
        assert!(buffer
            .rnn_states()
            .index_axis(Axis(0), 0)
            .iter()
            .all(|&x| x == 0.));
        assert!(buffer.masks().index_axis(Axis(0), 0).iter().all(|&m| m == 1.));
    }

    #[test]
    fn test_shape_mismatch() {
        let c = config();
        let mut buffer = initialized(&c);
        let mut tr = transition(&c, 1.);
        tr.rewards = Array3::zeros((2, 2, 1));
        assert!(matches!(
            buffer.insert(0, &tr),
            Err(CohortError::ShapeMismatch { .. })
        ));
        assert_eq!(buffer.written(), 0);

        assert!(buffer
            .initialize(
                Array3::zeros((1, 3, 3)).view(),
                Array3::zeros((1, 2, 6)).view(),
                Array3::ones((1, 2, 5)).view(),
            )
            .is_err());
    }

    #[test]
    #[should_panic]
    fn test_step_out_of_window() {
        let c = config();
        let mut buffer = initialized(&c);
        let _ = buffer.insert(c.horizon, &transition(&c, 1.));
    }
}
