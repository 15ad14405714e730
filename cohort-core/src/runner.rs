//! Rollout orchestration.
mod config;
mod render;
use crate::{
    base::{decompose, Policy, ThreadActions, Trainer, VecEnv, VecEnvSpec},
    buffer::{RolloutBuffer, Transition},
    checkpoint::Checkpoint,
    error::ConfigError,
    evaluator::{Evaluator, QuotaEvaluator},
    record::{InfoAccumulator, Record, RecordValue::Scalar, Recorder, STEP_KEY},
    recurrent,
    util::{check_shape, crosses_interval, flatten_threads, info_array1, info_scalar, unflatten_threads},
};
use anyhow::{Context, Result};
pub use config::RunnerConfig;
use log::info;
use ndarray::{Array3, Axis};
use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Drives a vectorized environment and hands rollout windows to a [`Trainer`].
///
/// # Training loop
///
/// [`Runner::run`] repeats the following for
/// `num_env_steps / episode_length / n_rollout_threads` iterations:
///
/// 1. If `use_linear_lr_decay`, decay the learning rate with [`Trainer::lr_decay`].
/// 2. Collect `episode_length` steps with [`Runner::collect_step`].
/// 3. Compute returns over the window with [`Runner::compute`].
/// 4. Update the policy with [`Runner::train`] and advance the window.
/// 5. `env_steps += episode_length * n_rollout_threads`
/// 6. If `env_steps` crossed a multiple of `save_interval`, or this is the last
///    iteration, save a checkpoint.
/// 7. If `env_steps` crossed a multiple of `log_interval`, flush the training
///    records, the environment information and `average_episode_rewards` to the
///    recorder. With `log_interval` 0 neither is kept.
/// 8. If `use_eval` and `env_steps` crossed a multiple of `eval_interval`,
///    evaluate the policy and write the summary to the recorder.
///
/// The environment is reset only once, in [`Runner::warmup`]; threads whose
/// episode ends are reset by the environment itself.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[VecEnv]-->|CombinedObs|B[Runner]
///     B -->|flattened batch|C[Policy]
///     C -->|PolicyOutput|B
///     B -->|ThreadActions|A
///     B -->|Transition|D[RolloutBuffer]
///     D -->|full window|E[Trainer]
/// ```
pub struct Runner<E: VecEnv> {
    config: RunnerConfig,
    env: E,
    spec: VecEnvSpec,
    buffer: RolloutBuffer,
    evaluator: Option<QuotaEvaluator<E>>,
    env_infos: InfoAccumulator,
    checkpoint_path: PathBuf,
    env_steps: usize,
}

impl<E: VecEnv> Runner<E> {
    /// Constructs a runner.
    ///
    /// The evaluation environment is built from `eval_env_config`, or from
    /// `env_config` if it is `None`, only when `use_eval` is set.
    pub fn build(
        config: RunnerConfig,
        env_config: &E::Config,
        eval_env_config: Option<&E::Config>,
    ) -> Result<Self> {
        config.validate()?;
        let env = E::build(env_config, config.seed)?;
        let spec = env.spec();
        config.check_env(env.n_threads(), &spec)?;
        let buffer = RolloutBuffer::build(&config.buffer_config(&spec))?;

        let evaluator = if config.use_eval {
            let eval_env_config = eval_env_config.unwrap_or(env_config);
            let evaluator = QuotaEvaluator::new(
                eval_env_config,
                config.seed.wrapping_mul(50000),
                config.eval_episodes,
                config.episode_length,
            )?
            .recurrent_state(config.recurrent_n, config.hidden_size)
            .deterministic(config.eval_deterministic);
            if evaluator.n_threads() != config.n_eval_rollout_threads {
                return Err(ConfigError::EnvMismatch {
                    name: "n_eval_rollout_threads",
                    expected: config.n_eval_rollout_threads,
                    actual: evaluator.n_threads(),
                }
                .into());
            }
            Some(evaluator)
        } else {
            None
        };

        let checkpoint_path =
            Checkpoint::default_path(&config.save_dir, &config.env_name, &config.algorithm_name);

        Ok(Self {
            config,
            env,
            spec,
            buffer,
            evaluator,
            env_infos: InfoAccumulator::new(),
            checkpoint_path,
            env_steps: 0,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the rollout buffer.
    pub fn buffer(&self) -> &RolloutBuffer {
        &self.buffer
    }

    /// Returns the training environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Path the checkpoints of this run are saved to.
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Environment steps taken so far, summed over threads.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Resets the environment and seeds slot 0 of the buffer.
    pub fn warmup(&mut self) -> Result<()> {
        let n = self.config.n_rollout_threads;
        let combined = self.env.reset()?;
        let (obs, share_obs, available_actions) = decompose(&combined, n, &self.spec)?;
        self.buffer
            .initialize(obs.view(), share_obs.view(), available_actions.view())?;
        Ok(())
    }

    /// Collects step `step` of the current window.
    pub fn collect_step<T: Trainer>(&mut self, trainer: &mut T, step: usize) -> Result<()> {
        let n = self.config.n_rollout_threads;
        let a = self.spec.n_agents;
        let rnn_shape = [n, a, self.config.recurrent_n, self.config.hidden_size];

        trainer.prep_rollout();
        let out = {
            let b = &self.buffer;
            trainer.policy().get_actions(
                flatten_threads(b.share_obs().index_axis(Axis(0), step))?.view(),
                flatten_threads(b.obs().index_axis(Axis(0), step))?.view(),
                flatten_threads(b.rnn_states().index_axis(Axis(0), step))?.view(),
                flatten_threads(b.rnn_states_critic().index_axis(Axis(0), step))?.view(),
                flatten_threads(b.masks().index_axis(Axis(0), step))?.view(),
                flatten_threads(b.available_actions().index_axis(Axis(0), step))?.view(),
                false,
            )?
        };
        let values = unflatten_threads(out.values.view(), n)?;
        let actions = unflatten_threads(out.actions.view(), n)?;
        let action_log_probs = unflatten_threads(out.action_log_probs.view(), n)?;
        let mut rnn_states = unflatten_threads(out.rnn_states.view(), n)?;
        let mut rnn_states_critic = unflatten_threads(out.rnn_states_critic.view(), n)?;
        check_shape("actions", &[n, a, self.spec.act_dim], actions.shape())?;
        check_shape("rnn_states", &rnn_shape, rnn_states.shape())?;
        check_shape("rnn_states_critic", &rnn_shape, rnn_states_critic.shape())?;

        let thread_actions: Vec<ThreadActions> =
            actions.outer_iter().map(|x| x.to_owned()).collect();
        let res = self.env.step(&thread_actions)?;
        res.validate(n, a)?;
        let (obs, share_obs, available_actions) = decompose(&res.obs, n, &self.spec)?;

        let mut delta_steps = Array3::<f32>::zeros((n, a, 1));
        for (e, info) in res.infos.iter().enumerate() {
            let d = info_array1(info, "delta_steps", e)?;
            check_shape("delta_steps", &[a], &[d.len()])?;
            for (i, v) in d.into_iter().enumerate() {
                delta_steps[[e, i, 0]] = v;
            }
        }
        if self.config.log_interval > 0 {
            self.accumulate_infos(&res.infos)?;
        }

        let masks = recurrent::apply_dones(res.dones.view(), &mut rnn_states, &mut rnn_states_critic)?;

        let tr = Transition {
            obs,
            share_obs,
            available_actions,
            rnn_states,
            rnn_states_critic,
            masks,
            delta_steps,
            actions,
            action_log_probs,
            value_preds: values,
            rewards: res.rewards.insert_axis(Axis(2)),
        };
        self.buffer.insert(step, &tr)?;
        Ok(())
    }

    fn accumulate_infos(&mut self, infos: &[Record]) -> Result<()> {
        for (e, info) in infos.iter().enumerate() {
            for key in self.config.scalar_info_keys.iter() {
                self.env_infos.push(key.as_str(), info_scalar(info, key, e)?);
            }
            for key in self.config.array_info_keys.iter() {
                for (i, v) in info_array1(info, key, e)?.into_iter().enumerate() {
                    self.env_infos.push(format!("{}/node_{}", key, i), v);
                }
            }
        }
        Ok(())
    }

    /// Computes returns over the full window.
    ///
    /// The values of the observation after the last step are predicted here and
    /// passed to [`Trainer::compute_returns`] as `[n_threads, n_agents, 1]`.
    pub fn compute<T: Trainer>(&mut self, trainer: &mut T) -> Result<()> {
        self.buffer.ensure_full()?;
        let n = self.config.n_rollout_threads;
        let h = self.buffer.horizon();

        trainer.prep_rollout();
        let next_values = {
            let b = &self.buffer;
            trainer.policy().get_values(
                flatten_threads(b.share_obs().index_axis(Axis(0), h))?.view(),
                flatten_threads(b.rnn_states_critic().index_axis(Axis(0), h))?.view(),
                flatten_threads(b.masks().index_axis(Axis(0), h))?.view(),
            )?
        };
        let next_values = unflatten_threads(next_values.view(), n)?;
        check_shape("next_values", &[n, self.spec.n_agents, 1], next_values.shape())?;
        trainer.compute_returns(&self.buffer, next_values.view())
    }

    /// Updates the policy with the full window, then carries its last slot over
    /// to the next window.
    pub fn train<T: Trainer>(&mut self, trainer: &mut T) -> Result<Record> {
        self.buffer.ensure_full()?;
        trainer.prep_training();
        let record = trainer.train(&self.buffer)?;
        self.buffer.after_update();
        Ok(record)
    }

    /// Saves a checkpoint of the trainer.
    pub fn save<T: Trainer>(&self, trainer: &T) -> Result<()> {
        trainer.checkpoint()?.save(&self.checkpoint_path)?;
        info!("Saved the model in {:?}", &self.checkpoint_path);
        Ok(())
    }

    /// Restores the trainer from a checkpoint.
    pub fn restore<T: Trainer>(&self, trainer: &mut T, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checkpoint =
            Checkpoint::load(path).with_context(|| format!("Failed to restore from {:?}", path))?;
        trainer.restore(&checkpoint)?;
        info!("Restored the model from {:?}", path);
        Ok(())
    }

    /// Evaluates the policy of the trainer.
    ///
    /// Returns `None` if evaluation is disabled.
    pub fn eval<T: Trainer>(&mut self, trainer: &mut T) -> Result<Option<Record>> {
        match self.evaluator.as_mut() {
            None => Ok(None),
            Some(evaluator) => {
                info!("Starts evaluation of the trained model");
                trainer.prep_rollout();
                let record = evaluator.evaluate(trainer.policy())?;
                Ok(Some(record))
            }
        }
    }

    /// Trains until the step budget is exhausted.
    pub fn run<T: Trainer>(&mut self, trainer: &mut T, recorder: &mut dyn Recorder) -> Result<()> {
        if let Some(path) = self.config.model_dir.clone() {
            self.restore(trainer, path)?;
        }
        self.warmup()?;

        let c = self.config.clone();
        let episodes = c.n_iterations();
        let steps_per_iteration = c.episode_length * c.n_rollout_threads;
        let timer = SystemTime::now();
        let steps_at_start = self.env_steps;
        info!(
            "Starts training: {} iterations of {} steps",
            episodes, steps_per_iteration
        );

        for episode in 0..episodes {
            if c.use_linear_lr_decay {
                trainer.lr_decay(episode, episodes);
            }

            for step in 0..c.episode_length {
                self.collect_step(trainer, step)
                    .with_context(|| format!("Iteration {}, step {}", episode, step))?;
            }

            self.compute(trainer)?;
            let train_record = self.train(trainer)?;
            let prev_steps = self.env_steps;
            self.env_steps += steps_per_iteration;
            let env_steps = self.env_steps;

            if crosses_interval(prev_steps, env_steps, c.save_interval) || episode == episodes - 1 {
                self.save(trainer)?;
            }

            if c.log_interval > 0 && !train_record.is_empty() {
                recorder.store(train_record);
            }

            if crosses_interval(prev_steps, env_steps, c.log_interval) {
                let elapsed = timer
                    .elapsed()
                    .unwrap_or_default()
                    .as_secs_f32()
                    .max(f32::EPSILON);
                let fps = (env_steps - steps_at_start) as f32 / elapsed;
                info!(
                    "Env {} Algo {} Exp {} updates {}/{} episodes, total num timesteps {}/{}, FPS {}",
                    c.env_name,
                    c.algorithm_name,
                    c.experiment_name,
                    episode,
                    episodes,
                    env_steps,
                    c.num_env_steps,
                    fps as usize
                );
                let average_episode_rewards = self.buffer.average_episode_rewards();
                info!("average episode rewards is {}", average_episode_rewards);

                let mut record = self.env_infos.flush();
                record.insert("average_episode_rewards", Scalar(average_episode_rewards));
                record.insert("fps", Scalar(fps));
                recorder.store(record);
                recorder.flush(env_steps as _);
            }

            if c.use_eval && crosses_interval(prev_steps, env_steps, c.eval_interval) {
                if let Some(mut record) = self.eval(trainer)? {
                    record.insert(STEP_KEY, Scalar(env_steps as _));
                    recorder.write(record);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dummy::{DummyTrainer, DummyVecEnv, DummyVecEnvConfig};
    use tempdir::TempDir;
    use test_log::test;

    #[derive(Default)]
    struct CountingRecorder {
        n_written: usize,
        n_stored: usize,
        n_flushed: usize,
    }

    impl Recorder for CountingRecorder {
        fn write(&mut self, _record: Record) {
            self.n_written += 1;
        }

        fn store(&mut self, _record: Record) {
            self.n_stored += 1;
        }

        fn flush(&mut self, _step: i64) {
            self.n_flushed += 1;
        }
    }

    fn config(dir: &TempDir) -> RunnerConfig {
        RunnerConfig::default()
            .episode_length(4)
            .n_rollout_threads(2)
            .num_agents(2)
            .hidden_size(4)
            .save_dir(dir.path().join("models"))
            .run_dir(dir.path().join("runs"))
    }

    #[test]
    fn test_nothing_kept_without_logging() -> Result<()> {
        let dir = TempDir::new("runner")?;
        // Logged info keys are not even required when logging is off
        let env_config = DummyVecEnvConfig::default()
            .episode_steps(vec![3, 5])
            .omit_info("total_state");
        let config = config(&dir).num_env_steps(400).log_interval(0);
        let mut runner = Runner::<DummyVecEnv>::build(config, &env_config, None)?;
        let mut trainer = DummyTrainer::new(1);
        let mut recorder = CountingRecorder::default();

        runner.run(&mut trainer, &mut recorder)?;

        assert_eq!(runner.env_steps(), 400);
        assert!(runner.env_infos.is_empty());
        assert_eq!(recorder.n_stored, 0);
        assert_eq!(recorder.n_flushed, 0);
        assert_eq!(recorder.n_written, 0);
        Ok(())
    }

    #[test]
    fn test_infos_drained_at_log_interval() -> Result<()> {
        let dir = TempDir::new("runner")?;
        let env_config = DummyVecEnvConfig::default().episode_steps(vec![3, 5]);
        // One iteration is 8 steps; the last flush is at 48
        let config = config(&dir).num_env_steps(48).log_interval(16);
        let mut runner = Runner::<DummyVecEnv>::build(config, &env_config, None)?;
        let mut trainer = DummyTrainer::new(1);
        let mut recorder = CountingRecorder::default();

        runner.run(&mut trainer, &mut recorder)?;

        assert!(runner.env_infos.is_empty());
        assert_eq!(recorder.n_flushed, 3);
        Ok(())
    }

    #[test]
    fn test_large_seed() -> Result<()> {
        let dir = TempDir::new("runner")?;
        let env_config = DummyVecEnvConfig::default().episode_steps(vec![3, 5]);
        let config = config(&dir)
            .seed(i64::MAX / 2)
            .use_eval(true)
            .n_eval_rollout_threads(2)
            .eval_episodes(2);
        let mut runner = Runner::<DummyVecEnv>::build(config, &env_config, None)?;
        let mut trainer = DummyTrainer::new(1);
        assert!(runner.eval(&mut trainer)?.is_some());
        Ok(())
    }
}
