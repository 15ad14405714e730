//! A policy without parameters and a trainer that never changes it.
use anyhow::{bail, Result};
use cohort_core::{
    record::{Record, RecordValue},
    ActionEvaluation, ActorCriticArch, ActorCriticConfig, Checkpoint, Policy, PolicyOutput,
    RolloutBuffer, Trainer,
};
use log::info;
use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, Axis};
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Picks one of the available actions uniformly at random.
///
/// A deterministic policy picks the first available action instead. Values are
/// zero. The recurrent states it returns are the given states, reset where the
/// mask is 0.
pub struct UniformPolicy {
    arch: ActorCriticArch,
    seed: u64,
    rng: SmallRng,
}

impl UniformPolicy {
    /// Builds the policy, rejecting unsupported configurations.
    pub fn build(config: &ActorCriticConfig, seed: u64) -> Result<Self> {
        let arch = config.validate()?;
        info!("Uniform policy stands in for {:?}", arch);
        Ok(Self {
            arch,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Architecture the policy stands in for.
    pub fn arch(&self) -> &ActorCriticArch {
        &self.arch
    }

    fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Actions and their log-probabilities, `[batch, 1]` each.
    fn sample(
        &mut self,
        available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let b = available_actions.nrows();
        let mut actions = Array2::zeros((b, 1));
        let mut log_probs = Array2::zeros((b, 1));
        for (i, row) in available_actions.outer_iter().enumerate() {
            let choices: Vec<usize> = row
                .iter()
                .enumerate()
                .filter(|(_, &m)| m > 0.)
                .map(|(k, _)| k)
                .collect();
            if choices.is_empty() {
                bail!("No action is available for row {}", i);
            }
            let k = if deterministic {
                0
            } else {
                self.rng.gen_range(0..choices.len())
            };
            actions[[i, 0]] = choices[k] as f32;
            log_probs[[i, 0]] = -(choices.len() as f32).ln();
        }
        Ok((actions, log_probs))
    }
}

fn carry(states: ArrayView3<f32>, masks: ArrayView2<f32>) -> Array3<f32> {
    &states * &masks.insert_axis(Axis(2))
}

impl Policy for UniformPolicy {
    fn get_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        _obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        rnn_states_critic: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<PolicyOutput> {
        let (actions, action_log_probs) = self.sample(available_actions, deterministic)?;
        Ok(PolicyOutput {
            values: Array2::zeros((share_obs.nrows(), 1)),
            actions,
            action_log_probs,
            rnn_states: carry(rnn_states, masks),
            rnn_states_critic: carry(rnn_states_critic, masks),
        })
    }

    fn get_values(
        &mut self,
        share_obs: ArrayView2<f32>,
        _rnn_states_critic: ArrayView3<f32>,
        _masks: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        Ok(Array2::zeros((share_obs.nrows(), 1)))
    }

    fn act(
        &mut self,
        _obs: ArrayView2<f32>,
        rnn_states: ArrayView3<f32>,
        masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        deterministic: bool,
    ) -> Result<(Array2<f32>, Array3<f32>)> {
        let (actions, _) = self.sample(available_actions, deterministic)?;
        Ok((actions, carry(rnn_states, masks)))
    }

    fn evaluate_actions(
        &mut self,
        share_obs: ArrayView2<f32>,
        _obs: ArrayView2<f32>,
        _rnn_states: ArrayView3<f32>,
        _rnn_states_critic: ArrayView3<f32>,
        _actions: ArrayView2<f32>,
        _masks: ArrayView2<f32>,
        available_actions: ArrayView2<f32>,
        _active_masks: Option<ArrayView2<f32>>,
    ) -> Result<ActionEvaluation> {
        let n_choices = available_actions.map_axis(Axis(1), |row| {
            row.iter().filter(|&&m| m > 0.).count().max(1) as f32
        });
        let entropy = n_choices.mapv(f32::ln);
        Ok(ActionEvaluation {
            values: Array2::zeros((share_obs.nrows(), 1)),
            action_log_probs: (-&entropy).insert_axis(Axis(1)),
            entropy: entropy.mean().unwrap_or(0.),
        })
    }
}

/// Trainer whose update only reports statistics of the window.
///
/// The checkpoint holds the seed of the policy.
pub struct FrozenTrainer {
    policy: UniformPolicy,
    returns: Option<Array4<f32>>,
    gamma: f32,
}

impl FrozenTrainer {
    /// Constructs the trainer; `gamma` discounts the returns it reports.
    pub fn new(policy: UniformPolicy, gamma: f32) -> Self {
        Self {
            policy,
            returns: None,
            gamma,
        }
    }
}

impl Trainer for FrozenTrainer {
    type Policy = UniformPolicy;

    fn policy(&mut self) -> &mut Self::Policy {
        &mut self.policy
    }

    fn prep_rollout(&mut self) {}

    fn prep_training(&mut self) {}

    /// Discounted returns bootstrapped from `next_values`, reset at episode ends.
    fn compute_returns(
        &mut self,
        buffer: &RolloutBuffer,
        next_values: ArrayView3<f32>,
    ) -> Result<()> {
        let rewards = buffer.rewards();
        let masks = buffer.masks();
        let horizon = buffer.horizon();
        let mut returns = Array4::zeros(rewards.raw_dim());
        let mut next = next_values.to_owned();
        for t in (0..horizon).rev() {
            next = &rewards.index_axis(Axis(0), t)
                + &(&next * &masks.index_axis(Axis(0), t + 1) * self.gamma);
            returns.index_axis_mut(Axis(0), t).assign(&next);
        }
        self.returns = Some(returns);
        Ok(())
    }

    fn train(&mut self, _buffer: &RolloutBuffer) -> Result<Record> {
        let returns = match self.returns.take() {
            Some(returns) => returns,
            None => bail!("Returns have not been computed for this window"),
        };
        let value_loss = returns.mapv(|r| r * r).mean().unwrap_or(0.);
        let mut record = Record::from_scalar("value_loss", value_loss);
        record.insert("policy_loss", RecordValue::Scalar(0.));
        record.insert(
            "average_return",
            RecordValue::Scalar(returns.mean().unwrap_or(0.)),
        );
        Ok(record)
    }

    fn lr_decay(&mut self, _iteration: usize, _total: usize) {}

    fn checkpoint(&self) -> Result<Checkpoint> {
        Ok(Checkpoint::new(self.policy.seed.to_le_bytes().to_vec(), vec![]))
    }

    fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        let mut bytes = [0u8; 8];
        if checkpoint.model_state_dict.len() != bytes.len() {
            bail!(
                "Expected an 8-byte seed, got {} bytes",
                checkpoint.model_state_dict.len()
            );
        }
        bytes.copy_from_slice(&checkpoint.model_state_dict);
        self.policy.reseed(u64::from_le_bytes(bytes));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cohort_core::error::ConfigError;
    use ndarray::array;

    fn policy() -> UniformPolicy {
        UniformPolicy::build(&ActorCriticConfig::default(), 3).unwrap()
    }

    #[test]
    fn test_samples_available_actions() -> Result<()> {
        let mut policy = policy();
        let avail = array![[0., 1., 1.], [0., 0., 1.]];
        let states = Array3::from_elem((2, 1, 4), 2.);
        let masks = array![[1.], [0.]];
        for _ in 0..20 {
            let (actions, next) =
                policy.act(avail.view(), states.view(), masks.view(), avail.view(), false)?;
            assert!(actions[[0, 0]] == 1. || actions[[0, 0]] == 2.);
            assert_eq!(actions[[1, 0]], 2.);
            assert_eq!(next[[0, 0, 0]], 2.);
            assert_eq!(next[[1, 0, 0]], 0.);
        }
        let (actions, _) =
            policy.act(avail.view(), states.view(), masks.view(), avail.view(), true)?;
        assert_eq!(actions, array![[1.], [2.]]);
        Ok(())
    }

    #[test]
    fn test_no_available_action() {
        let avail = array![[0., 0.]];
        let states = Array3::zeros((1, 1, 1));
        let masks = array![[1.]];
        assert!(policy()
            .act(avail.view(), states.view(), masks.view(), avail.view(), false)
            .is_err());
    }

    #[test]
    fn test_rejects_graph_critic() {
        let config = ActorCriticConfig::default().use_gnn_critic(true);
        let err = UniformPolicy::build(&config, 0).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::GraphCriticUnsupported)
        ));
    }

    #[test]
    fn test_checkpoint() -> Result<()> {
        let trainer = FrozenTrainer::new(policy(), 0.99);
        let checkpoint = trainer.checkpoint()?;

        let other = UniformPolicy::build(&ActorCriticConfig::default(), 7)?;
        let mut restored = FrozenTrainer::new(other, 0.99);
        restored.restore(&checkpoint)?;
        assert_eq!(restored.policy.seed, 3);
        assert!(restored.restore(&Checkpoint::new(vec![1], vec![])).is_err());
        Ok(())
    }
}
