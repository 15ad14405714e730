//! Vectorized environment.
use crate::{
    error::CohortError,
    record::{Record, RecordValue},
    util::check_shape,
};
use anyhow::Result;
use ndarray::{stack, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Actions of all agents in one thread, `[n_agents, act_dim]`.
pub type ThreadActions = Array2<f32>;

/// Observation of one thread as reported by the environment.
///
/// Each field is `[n_agents, dim]`.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedObs {
    /// Local observation of each agent.
    pub obs: Array2<f32>,

    /// Centralized observation fed to the critic.
    pub share_obs: Array2<f32>,

    /// Mask of the actions available to each agent (1 if available).
    pub available_actions: Array2<f32>,
}

/// Shapes shared by every thread of a vectorized environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VecEnvSpec {
    /// Number of agents in each thread.
    pub n_agents: usize,

    /// Dimension of the local observation.
    pub obs_dim: usize,

    /// Dimension of the centralized observation.
    pub share_obs_dim: usize,

    /// Number of discrete actions, i.e., the width of the available-action mask.
    pub n_actions: usize,

    /// Dimension of an action as stored in the rollout buffer.
    pub act_dim: usize,
}

/// Response of [`VecEnv::step`].
#[derive(Clone, Debug)]
pub struct VecStep {
    /// Observations after the step, one per thread.
    pub obs: Vec<CombinedObs>,

    /// Rewards, `[n_threads, n_agents]`.
    pub rewards: Array2<f32>,

    /// Done flags, `[n_threads, n_agents]`.
    pub dones: Array2<bool>,

    /// Information of each thread.
    pub infos: Vec<Record>,
}

/// A batch of simulation replicas ("threads") advanced in lock-step.
///
/// [`VecEnv::step`] returns only after every thread has advanced one step.
/// A thread whose episode ended is reset by the environment itself, so the
/// observations returned by [`VecEnv::step`] are always the ones the next actions
/// should be computed from.
pub trait VecEnv {
    /// Configurations.
    type Config: Clone;

    /// Builds the environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Number of threads.
    fn n_threads(&self) -> usize;

    /// Shapes of observations and actions.
    fn spec(&self) -> VecEnvSpec;

    /// Resets all threads.
    fn reset(&mut self) -> Result<Vec<CombinedObs>>;

    /// Applies one list of actions per thread.
    fn step(&mut self, actions: &[ThreadActions]) -> Result<VecStep>;

    /// Current frame of a thread as `[height, width, channels]`, if it renders.
    ///
    /// Frames after a step are reported in the `frame` info; this gives the one
    /// right after [`VecEnv::reset`].
    fn frame(&self, _thread: usize) -> Option<RecordValue> {
        None
    }
}

fn stack_field<'a>(
    name: &str,
    views: Vec<ArrayView2<'a, f32>>,
    expected: [usize; 2],
) -> Result<Array3<f32>, CohortError> {
    for v in views.iter() {
        check_shape(name, &expected, v.shape())?;
    }
    stack(Axis(0), &views).map_err(|_| CohortError::ShapeMismatch {
        name: name.to_string(),
        expected: expected.to_vec(),
        actual: vec![],
    })
}

/// Splits combined observations into per-field arrays `[n_threads, n_agents, dim]`.
///
/// Returns `(obs, share_obs, available_actions)`.
pub fn decompose(
    combined: &[CombinedObs],
    n_threads: usize,
    spec: &VecEnvSpec,
) -> Result<(Array3<f32>, Array3<f32>, Array3<f32>), CohortError> {
    if combined.len() != n_threads {
        return Err(CohortError::ThreadCountMismatch {
            expected: n_threads,
            actual: combined.len(),
        });
    }
    let a = spec.n_agents;
    let obs = stack_field(
        "obs",
        combined.iter().map(|c| c.obs.view()).collect(),
        [a, spec.obs_dim],
    )?;
    let share_obs = stack_field(
        "share_obs",
        combined.iter().map(|c| c.share_obs.view()).collect(),
        [a, spec.share_obs_dim],
    )?;
    let available_actions = stack_field(
        "available_actions",
        combined.iter().map(|c| c.available_actions.view()).collect(),
        [a, spec.n_actions],
    )?;
    Ok((obs, share_obs, available_actions))
}

impl VecStep {
    /// Checks the response against the number of threads and agents.
    pub fn validate(&self, n_threads: usize, n_agents: usize) -> Result<(), CohortError> {
        for (name, len) in [("obs", self.obs.len()), ("infos", self.infos.len())].iter() {
            if *len != n_threads {
                log::error!("{} holds {} threads instead of {}", name, len, n_threads);
                return Err(CohortError::ThreadCountMismatch {
                    expected: n_threads,
                    actual: *len,
                });
            }
        }
        check_shape("rewards", &[n_threads, n_agents], self.rewards.shape())?;
        check_shape("dones", &[n_threads, n_agents], self.dones.shape())?;
        Ok(())
    }

    /// Returns, for each thread, whether all of its agents are done.
    pub fn thread_dones(&self) -> Vec<bool> {
        self.dones
            .outer_iter()
            .map(|row| row.iter().all(|&d| d))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{array, Array2};

    fn spec() -> VecEnvSpec {
        VecEnvSpec {
            n_agents: 2,
            obs_dim: 3,
            share_obs_dim: 4,
            n_actions: 5,
            act_dim: 1,
        }
    }

    fn combined(v: f32) -> CombinedObs {
        CombinedObs {
            obs: Array2::from_elem((2, 3), v),
            share_obs: Array2::from_elem((2, 4), v),
            available_actions: Array2::ones((2, 5)),
        }
    }

    #[test]
    fn test_decompose() {
        let (obs, share_obs, avail) = decompose(&[combined(0.), combined(1.)], 2, &spec()).unwrap();
        assert_eq!(obs.shape(), &[2, 2, 3]);
        assert_eq!(share_obs.shape(), &[2, 2, 4]);
        assert_eq!(avail.shape(), &[2, 2, 5]);
        assert_eq!(obs[[1, 0, 2]], 1.);
        assert_eq!(share_obs[[0, 1, 3]], 0.);
    }

    #[test]
    fn test_decompose_rejects_bad_shapes() {
        let mut bad = combined(0.);
        bad.share_obs = Array2::zeros((2, 7));
        assert!(matches!(
            decompose(&[combined(0.), bad], 2, &spec()),
            Err(CohortError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            decompose(&[combined(0.)], 2, &spec()),
            Err(CohortError::ThreadCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_thread_dones() {
        let step = VecStep {
            obs: vec![combined(0.), combined(0.)],
            rewards: Array2::zeros((2, 2)),
            dones: array![[true, true], [true, false]],
            infos: vec![Record::empty(), Record::empty()],
        };
        step.validate(2, 2).unwrap();
        assert_eq!(step.thread_dones(), vec![true, false]);
        assert!(step.validate(3, 2).is_err());
    }
}
