//! Test doubles of the collaborators of the runner.
//!
//! [`DummyVecEnv`] runs episodes of fixed length per thread and reports every
//! info field the runner and the evaluator read. [`DummyPolicy`] computes
//! nothing: its actions are zero, its values copy the first feature of the
//! observation, and its recurrent states count the steps since the last reset.
//! [`DummyTrainer`] counts what it was asked to do.
use crate::{
    base::{
        ActionEvaluation, CombinedObs, Policy, PolicyOutput, ThreadActions, Trainer, VecEnv,
        VecEnvSpec, VecStep,
    },
    buffer::RolloutBuffer,
    checkpoint::Checkpoint,
    record::{Record, RecordValue},
};
use anyhow::{bail, Result};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Configuration of [`DummyVecEnv`].
#[derive(Clone, Debug)]
pub struct DummyVecEnvConfig {
    /// Length of the episodes of each thread; its length is the number of threads.
    pub episode_steps: Vec<usize>,

    /// Number of agents.
    pub n_agents: usize,

    /// Dimension of the local observation.
    pub obs_dim: usize,

    /// Dimension of the centralized observation.
    pub share_obs_dim: usize,

    /// Width of the available-action mask.
    pub n_actions: usize,

    /// Number of nodes reported in `node_visits`.
    pub n_nodes: usize,

    /// Info field left out of every step.
    pub omit_info: Option<String>,
}

impl Default for DummyVecEnvConfig {
    fn default() -> Self {
        Self {
            episode_steps: vec![3],
            n_agents: 2,
            obs_dim: 3,
            share_obs_dim: 6,
            n_actions: 4,
            n_nodes: 3,
            omit_info: None,
        }
    }
}

impl DummyVecEnvConfig {
    /// Sets the episode length of each thread.
    pub fn episode_steps(mut self, v: Vec<usize>) -> Self {
        self.episode_steps = v;
        self
    }

    /// Sets the number of agents.
    pub fn n_agents(mut self, v: usize) -> Self {
        self.n_agents = v;
        self
    }

    /// Leaves an info field out of every step.
    pub fn omit_info(mut self, v: impl Into<String>) -> Self {
        self.omit_info = Some(v.into());
        self
    }
}

/// Vectorized environment whose thread `e` ends an episode every
/// `episode_steps[e]` steps, all agents at once.
///
/// The observation of every agent is the number of steps taken in the current
/// episode. At the end of an episode thread `e` reports a score of `e`.
pub struct DummyVecEnv {
    config: DummyVecEnvConfig,
    t: Vec<usize>,
    total_steps: usize,
}

impl DummyVecEnv {
    fn observe(&self, e: usize) -> CombinedObs {
        let a = self.config.n_agents;
        let v = self.t[e] as f32;
        CombinedObs {
            obs: Array2::from_elem((a, self.config.obs_dim), v),
            share_obs: Array2::from_elem((a, self.config.share_obs_dim), v),
            available_actions: Array2::ones((a, self.config.n_actions)),
        }
    }

    /// Total number of steps taken by each thread since the construction.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

/// A 2x2 RGB frame filled with the step count.
fn dummy_frame(t: usize) -> RecordValue {
    RecordValue::Array3(vec![t as f32; 2 * 2 * 3], [2, 2, 3])
}

impl VecEnv for DummyVecEnv {
    type Config = DummyVecEnvConfig;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            t: vec![0; config.episode_steps.len()],
            total_steps: 0,
        })
    }

    fn n_threads(&self) -> usize {
        self.config.episode_steps.len()
    }

    fn spec(&self) -> VecEnvSpec {
        VecEnvSpec {
            n_agents: self.config.n_agents,
            obs_dim: self.config.obs_dim,
            share_obs_dim: self.config.share_obs_dim,
            n_actions: self.config.n_actions,
            act_dim: 1,
        }
    }

    fn reset(&mut self) -> Result<Vec<CombinedObs>> {
        self.t.iter_mut().for_each(|t| *t = 0);
        Ok((0..self.n_threads()).map(|e| self.observe(e)).collect())
    }

    fn frame(&self, thread: usize) -> Option<RecordValue> {
        self.t.get(thread).map(|&t| dummy_frame(t))
    }

    fn step(&mut self, actions: &[ThreadActions]) -> Result<VecStep> {
        let n = self.n_threads();
        let a = self.config.n_agents;
        if actions.len() != n {
            bail!("Got actions for {} threads instead of {}", actions.len(), n);
        }
        self.total_steps += 1;

        let mut dones = Array2::from_elem((n, a), false);
        let mut infos = Vec::with_capacity(n);
        for e in 0..n {
            let max_steps = self.config.episode_steps[e];
            self.t[e] += 1;
            let done = self.t[e] >= max_steps;
            dones.row_mut(e).fill(done);

            let mut info = Record::empty();
            info.insert("delta_steps", RecordValue::Array1(vec![1.; a]));
            info.insert("total_state", RecordValue::Scalar(self.t[e] as f32));
            info.insert("agent_count", RecordValue::Scalar(a as f32));
            let mut visits = vec![0.; self.config.n_nodes];
            if let Some(v) = visits.get_mut(self.t[e] % self.config.n_nodes.max(1)) {
                *v = 1.;
            }
            info.insert("node_visits", RecordValue::Array1(visits));
            info.insert("score_reward", RecordValue::Scalar(e as f32));
            info.insert("max_steps", RecordValue::Scalar(max_steps as f32));
            info.insert(
                "steps_left",
                RecordValue::Scalar(max_steps.saturating_sub(self.t[e]) as f32),
            );
            info.insert("frame", dummy_frame(self.t[e]));
            if let Some(key) = self.config.omit_info.as_ref() {
                info = Record::from_slice(
                    &info
                        .iter()
                        .filter(|(k, _)| *k != key)
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Vec<_>>(),
                );
            }
            infos.push(info);

            if done {
                self.t[e] = 0;
            }
        }

        Ok(VecStep {
            obs: (0..n).map(|e| self.observe(e)).collect(),
            rewards: Array2::ones((n, a)),
            dones,
            infos,
        })
    }
}

/// Policy returning zero actions.
///
/// Its recurrent states after a step are the given states, zeroed where the
/// mask is 0, plus one.
pub struct DummyPolicy {
    act_dim: usize,

    /// Number of calls of [`Policy::get_actions`].
    pub n_get_actions: usize,

    /// Number of calls of [`Policy::act`].
    pub n_act: usize,

    /// `deterministic` of the last call of [`Policy::act`].
    pub last_deterministic: Option<bool>,
}

impl DummyPolicy {
    /// Constructs the policy.
    pub fn new(act_dim: usize) -> Self {
        Self {
            act_dim,
            n_get_actions: 0,
            n_act: 0,
            last_deterministic: None,
        }
    }
}

fn next_states(states: ArrayView3<f32>, masks: ArrayView2<f32>) -> Array3<f32> {
    let m = masks.insert_axis(Axis(2));
    &states * &m + 1.
}

fn first_feature(x: ArrayView2<f32>) -> Array2<f32> {
    x.column(0).to_owned().insert_axis(Axis(1))
}

impl Policy for DummyPolicy {
    fn get_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        _obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        rnn_states_critic: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        _available_actions: ArrayView2<f32>,
        _deterministic: bool,
    ) -> Result<PolicyOutput> {
        self.n_get_actions += 1;
        let b = share_obs.nrows();
        Ok(PolicyOutput {
            values: first_feature(share_obs),
            actions: Array2::zeros((b, self.act_dim)),
            action_log_probs: Array2::zeros((b, self.act_dim)),
            rnn_states: next_states(rnn_states, masks),
            rnn_states_critic: next_states(rnn_states_critic, masks),
        })
    }

    fn get_values(
        &mut self,
        share_obs: ArrayView2<f32>,
        _rnn_states_critic: ArrayView3<f32>,
        _masks: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        Ok(first_feature(share_obs))
    }

    fn act(
        &mut self,
        obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        _available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<(Array2<f32>, Array3<f32>)> {
        self.n_act += 1;
        self.last_deterministic = Some(deterministic);
        Ok((
            Array2::zeros((obs.nrows(), self.act_dim)),
            next_states(rnn_states, masks),
        ))
    }

    fn evaluate_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        _obs: ArrayView2<f32>,
        _rnn_states: ArrayView3<f32>,
        _rnn_states_critic: ArrayView3<f32>,
        actions: ArrayView2<f32>,
        _masks: ArrayView2<f32>,
        _available_actions: ArrayView2<f32>,
        _active_masks: Option<ArrayView2<f32>>,
    ) -> Result<ActionEvaluation> {
        Ok(ActionEvaluation {
            values: first_feature(share_obs),
            action_log_probs: Array2::zeros(actions.raw_dim()),
            entropy: 0.,
        })
    }
}

/// Trainer recording the calls it receives.
pub struct DummyTrainer {
    policy: DummyPolicy,

    /// Number of updates.
    pub n_train: usize,

    /// Values passed to the last [`Trainer::compute_returns`].
    pub next_values: Option<Array3<f32>>,

    /// Arguments of every [`Trainer::lr_decay`].
    pub lr_decays: Vec<(usize, usize)>,

    /// Checkpoint of the last [`Trainer::restore`].
    pub restored: Option<Checkpoint>,

    /// Rewards of every window handed to [`Trainer::train`], summed.
    pub reward_sums: Vec<f32>,
}

impl DummyTrainer {
    /// Constructs the trainer.
    pub fn new(act_dim: usize) -> Self {
        Self {
            policy: DummyPolicy::new(act_dim),
            n_train: 0,
            next_values: None,
            lr_decays: vec![],
            restored: None,
            reward_sums: vec![],
        }
    }
}

impl Trainer for DummyTrainer {
    type Policy = DummyPolicy;

    fn policy(&mut self) -> &mut Self::Policy {
        &mut self.policy
    }

    fn prep_rollout(&mut self) {}

    fn prep_training(&mut self) {}

    fn compute_returns(&mut self, buffer: &RolloutBuffer, next_values: ArrayView3<f32>) -> Result<()> {
        if !buffer.is_full() {
            bail!("Window is not full");
        }
        self.next_values = Some(next_values.to_owned());
        Ok(())
    }

    fn train(&mut self, buffer: &RolloutBuffer) -> Result<Record> {
        self.n_train += 1;
        self.reward_sums.push(buffer.rewards().sum());
        let mut record = Record::from_scalar("value_loss", 1. / self.n_train as f32);
        record.insert("dist_entropy", RecordValue::Scalar(0.));
        Ok(record)
    }

    fn lr_decay(&mut self, iteration: usize, total: usize) {
        self.lr_decays.push((iteration, total));
    }

    fn checkpoint(&self) -> Result<Checkpoint> {
        Ok(Checkpoint::new(
            (self.n_train as u32).to_le_bytes().to_vec(),
            vec![],
        ))
    }

    fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.restored = Some(checkpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dummy_env_episodes() {
        let config = DummyVecEnvConfig::default().episode_steps(vec![2, 3]);
        let mut env = DummyVecEnv::build(&config, 0).unwrap();
        env.reset().unwrap();
        let actions = vec![Array2::zeros((2, 1)); 2];

        let step = env.step(&actions).unwrap();
        assert_eq!(step.thread_dones(), vec![false, false]);
        let step = env.step(&actions).unwrap();
        assert_eq!(step.thread_dones(), vec![true, false]);
        assert_eq!(step.infos[0].get_scalar("steps_left").unwrap(), 0.);
        assert_eq!(step.obs[0].obs[[0, 0]], 0.);
        let step = env.step(&actions).unwrap();
        assert_eq!(step.thread_dones(), vec![false, true]);
        assert_eq!(step.infos[1].get_scalar("score_reward").unwrap(), 1.);
    }

    #[test]
    fn test_dummy_policy_states() {
        let mut policy = DummyPolicy::new(1);
        let states = Array3::from_elem((2, 1, 3), 5.);
        let masks = ndarray::array![[1.], [0.]];
        let obs = Array2::zeros((2, 3));
        let (actions, next) = policy
            .act(obs.view(), states.view(), masks.view(), obs.view(), true)
            .unwrap();
        assert_eq!(actions.shape(), &[2, 1]);
        assert_eq!(next[[0, 0, 0]], 6.);
        assert_eq!(next[[1, 0, 0]], 1.);
        assert_eq!(policy.last_deterministic, Some(true));
    }

    #[test]
    fn test_omit_info() {
        let config = DummyVecEnvConfig::default().omit_info("delta_steps");
        let mut env = DummyVecEnv::build(&config, 0).unwrap();
        let step = env.step(&[Array2::zeros((2, 1))]).unwrap();
        assert!(!step.infos[0].contains_key("delta_steps"));
        assert!(step.infos[0].contains_key("total_state"));
    }
}
