//! Evaluator running a fixed number of episodes over a vectorized environment.
use super::{EpisodeQuota, EpisodeResult, Evaluator};
use crate::{
    base::{decompose, Policy, ThreadActions, VecEnv},
    record::Record,
    recurrent,
    util::{check_shape, flatten_threads, unflatten_threads},
};
use anyhow::{Context, Result};
use log::{info, warn};
use ndarray::{Array3, Array4};

/// Evaluates a policy on `n_episodes` episodes spread over the threads of an
/// evaluation environment with [`EpisodeQuota`].
///
/// An evaluation runs at most `horizon` steps. If fewer episodes than requested
/// end within that budget, the reduction covers the recorded episodes only.
pub struct QuotaEvaluator<E: VecEnv> {
    env: E,
    n_episodes: usize,
    horizon: usize,
    recurrent_n: usize,
    hidden_size: usize,
    deterministic: bool,
}

impl<E: VecEnv> QuotaEvaluator<E> {
    /// Builds the evaluation environment.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize, horizon: usize) -> Result<Self> {
        Ok(Self {
            env: E::build(config, seed)?,
            n_episodes,
            horizon,
            recurrent_n: 1,
            hidden_size: 64,
            deterministic: true,
        })
    }

    /// Number of threads of the evaluation environment.
    pub fn n_threads(&self) -> usize {
        self.env.n_threads()
    }

    /// Sets the shape of the recurrent state of an agent.
    pub fn recurrent_state(mut self, recurrent_n: usize, hidden_size: usize) -> Self {
        self.recurrent_n = recurrent_n;
        self.hidden_size = hidden_size;
        self
    }

    /// Sets whether actions are taken deterministically.
    pub fn deterministic(mut self, v: bool) -> Self {
        self.deterministic = v;
        self
    }

    /// Runs the evaluation and returns the filled quota.
    pub fn run<P: Policy>(&mut self, policy: &mut P) -> Result<EpisodeQuota> {
        let n = self.env.n_threads();
        let spec = self.env.spec();
        let a = spec.n_agents;
        let rnn_shape = [n, a, self.recurrent_n, self.hidden_size];
        let mut quota = EpisodeQuota::new(self.n_episodes, n);

        let combined = self.env.reset()?;
        let (mut obs, _, mut available_actions) = decompose(&combined, n, &spec)?;
        let mut rnn_states = Array4::<f32>::zeros(rnn_shape);
        let mut masks = Array3::<f32>::ones((n, a, 1));

        let mut step = 0;
        while !quota.is_complete() && step < self.horizon {
            let (actions, next_rnn_states) = policy.act(
                flatten_threads(obs.view())?.view(),
                flatten_threads(rnn_states.view())?.view(),
                flatten_threads(masks.view())?.view(),
                flatten_threads(available_actions.view())?.view(),
                self.deterministic,
            )?;
            let actions = unflatten_threads(actions.view(), n)?;
            check_shape("actions", &[n, a, spec.act_dim], actions.shape())?;
            rnn_states = unflatten_threads(next_rnn_states.view(), n)?;
            check_shape("rnn_states", &rnn_shape, rnn_states.shape())?;

            let actions: Vec<ThreadActions> = actions.outer_iter().map(|x| x.to_owned()).collect();
            let res = self.env.step(&actions)?;
            res.validate(n, a)?;

            for (e, &done) in res.thread_dones().iter().enumerate() {
                if done && quota.is_active(e) {
                    let result = EpisodeResult::from_info(&res.infos[e], e)
                        .with_context(|| format!("Evaluation step {}", step))?;
                    quota.record(e, result);
                    log::debug!(
                        "Episode {} done by thread {}: {}",
                        quota.num_done(),
                        e,
                        result.score
                    );
                }
            }

            recurrent::reset_done_states(res.dones.view(), &mut rnn_states)?;
            masks = recurrent::continuation_masks(res.dones.view());
            let (o, _, av) = decompose(&res.obs, n, &spec)?;
            obs = o;
            available_actions = av;
            step += 1;
        }

        if quota.num_done() < quota.n_episodes() {
            warn!(
                "Only {} of {} evaluation episodes ended within {} steps",
                quota.num_done(),
                quota.n_episodes(),
                self.horizon
            );
        }
        Ok(quota)
    }
}

impl<E: VecEnv> Evaluator for QuotaEvaluator<E> {
    fn evaluate<P: Policy>(&mut self, policy: &mut P) -> Result<Record> {
        let summary = self.run(policy)?.summary();
        if let Some(goal) = summary.eval_goal {
            info!("eval expected goal is {}", goal);
        }
        Ok(summary.into())
    }
}
