//! Patrolling a ring graph.
use anyhow::{bail, Result};
use cohort_core::{
    record::{Record, RecordValue},
    CombinedObs, ThreadActions, VecEnv, VecEnvSpec, VecStep,
};
use ndarray::Array2;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Stay on the current node.
pub const STAY: usize = 0;

/// Move to the next node clockwise.
pub const FORWARD: usize = 1;

/// Move to the next node counterclockwise.
pub const BACKWARD: usize = 2;

const PIXELS_PER_NODE: usize = 4;

/// Configuration of [`RingPatrolEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RingPatrolConfig {
    /// Number of threads.
    pub n_threads: usize,

    /// Number of agents in each thread.
    pub n_agents: usize,

    /// Number of nodes of the ring.
    pub n_nodes: usize,

    /// Number of steps of an episode.
    pub episode_length: usize,

    /// Emit a `frame` info at every step.
    pub frames: bool,
}

impl Default for RingPatrolConfig {
    fn default() -> Self {
        Self {
            n_threads: 1,
            n_agents: 2,
            n_nodes: 6,
            episode_length: 50,
            frames: false,
        }
    }
}

impl RingPatrolConfig {
    pub fn n_threads(mut self, v: usize) -> Self {
        self.n_threads = v;
        self
    }

    pub fn n_agents(mut self, v: usize) -> Self {
        self.n_agents = v;
        self
    }

    pub fn n_nodes(mut self, v: usize) -> Self {
        self.n_nodes = v;
        self
    }

    pub fn episode_length(mut self, v: usize) -> Self {
        self.episode_length = v;
        self
    }

    pub fn frames(mut self, v: bool) -> Self {
        self.frames = v;
        self
    }
}

#[derive(Clone, Debug)]
struct Ring {
    positions: Vec<usize>,

    /// Steps since the last visit of each node.
    idleness: Vec<f32>,

    /// Visits of each node in the current episode.
    visits: Vec<f32>,

    t: usize,
}

/// Agents walking on a ring of nodes, rewarded for keeping every node recently
/// visited.
///
/// Each step, every node not occupied by an agent gets one step idler. All agents
/// of a thread share the reward `-mean(idleness) / episode_length`. An episode
/// ends after `episode_length` steps for all agents at once and scores 1 if every
/// node was visited, 0 otherwise.
///
/// The observation of an agent is the one-hot encoding of its node followed by the
/// idleness of every node; the centralized observation replaces the one-hot part
/// by the fraction of agents on each node. Actions are [`STAY`], [`FORWARD`] and
/// [`BACKWARD`], all of them always available.
pub struct RingPatrolEnv {
    config: RingPatrolConfig,
    rings: Vec<Ring>,
    rng: SmallRng,
}

impl RingPatrolEnv {
    fn new_ring(&mut self) -> Ring {
        let n_nodes = self.config.n_nodes;
        let positions: Vec<usize> = (0..self.config.n_agents)
            .map(|_| self.rng.gen_range(0..n_nodes))
            .collect();
        let mut visits = vec![0f32; n_nodes];
        positions.iter().for_each(|&p| visits[p] += 1.);
        Ring {
            positions,
            idleness: vec![0.; n_nodes],
            visits,
            t: 0,
        }
    }

    fn observe(&self, e: usize) -> CombinedObs {
        let ring = &self.rings[e];
        let n_nodes = self.config.n_nodes;
        let a = self.config.n_agents;
        let horizon = self.config.episode_length as f32;
        let idleness = |j: usize| ring.idleness[j - n_nodes] / horizon;

        let obs = Array2::from_shape_fn((a, 2 * n_nodes), |(i, j)| {
            if j < n_nodes {
                (ring.positions[i] == j) as i32 as f32
            } else {
                idleness(j)
            }
        });
        let share_obs = Array2::from_shape_fn((a, 2 * n_nodes), |(_, j)| {
            if j < n_nodes {
                ring.positions.iter().filter(|&&p| p == j).count() as f32 / a as f32
            } else {
                idleness(j)
            }
        });
        CombinedObs {
            obs,
            share_obs,
            available_actions: Array2::ones((a, 3)),
        }
    }

    /// Red for idleness, green for occupied nodes, `[height, width, 3]`.
    fn draw(&self, ring: &Ring) -> RecordValue {
        let (h, w) = (PIXELS_PER_NODE, PIXELS_PER_NODE * self.config.n_nodes);
        let horizon = self.config.episode_length as f32;
        let mut data = Vec::with_capacity(h * w * 3);
        for _ in 0..h {
            for x in 0..w {
                let node = x / PIXELS_PER_NODE;
                data.push((ring.idleness[node] / horizon).min(1.) * 255.);
                data.push(if ring.positions.contains(&node) { 255. } else { 0. });
                data.push(0.);
            }
        }
        RecordValue::Array3(data, [h, w, 3])
    }

    fn step_ring(&mut self, e: usize, actions: &ThreadActions) -> Result<(f32, bool, Record)> {
        let n_nodes = self.config.n_nodes;
        let a = self.config.n_agents;
        let max_steps = self.config.episode_length;
        let ring = &mut self.rings[e];

        ring.t += 1;
        ring.idleness.iter_mut().for_each(|x| *x += 1.);
        for (i, p) in ring.positions.iter_mut().enumerate() {
            *p = match actions[[i, 0]].round() as usize {
                STAY => *p,
                FORWARD => (*p + 1) % n_nodes,
                BACKWARD => (*p + n_nodes - 1) % n_nodes,
                act => bail!("Unknown action {} of agent {} in thread {}", act, i, e),
            };
            ring.idleness[*p] = 0.;
            ring.visits[*p] += 1.;
        }

        let mean_idleness = ring.idleness.iter().sum::<f32>() / n_nodes as f32;
        let reward = -mean_idleness / max_steps as f32;
        let done = ring.t >= max_steps;
        let covered = ring.visits.iter().all(|&v| v > 0.);

        let mut info = Record::empty();
        info.insert("delta_steps", RecordValue::Array1(vec![1.; a]));
        info.insert("total_state", RecordValue::Scalar(ring.idleness.iter().sum()));
        info.insert("agent_count", RecordValue::Scalar(a as f32));
        info.insert("node_visits", RecordValue::Array1(ring.visits.clone()));
        info.insert(
            "score_reward",
            RecordValue::Scalar(if covered { 1. } else { 0. }),
        );
        info.insert("max_steps", RecordValue::Scalar(max_steps as f32));
        info.insert(
            "steps_left",
            RecordValue::Scalar(max_steps.saturating_sub(ring.t) as f32),
        );
        if self.config.frames {
            let ring = self.rings[e].clone();
            info.insert("frame", self.draw(&ring));
        }

        if done {
            self.rings[e] = self.new_ring();
        }
        Ok((reward, done, info))
    }
}

impl VecEnv for RingPatrolEnv {
    type Config = RingPatrolConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.n_nodes == 0 || config.n_agents == 0 || config.n_threads == 0 {
            bail!("Ring patrol needs nodes, agents and threads: {:?}", config);
        }
        let mut env = Self {
            config: config.clone(),
            rings: vec![],
            rng: SmallRng::seed_from_u64(seed as u64),
        };
        env.rings = (0..config.n_threads).map(|_| env.new_ring()).collect();
        Ok(env)
    }

    fn n_threads(&self) -> usize {
        self.config.n_threads
    }

    fn spec(&self) -> VecEnvSpec {
        VecEnvSpec {
            n_agents: self.config.n_agents,
            obs_dim: 2 * self.config.n_nodes,
            share_obs_dim: 2 * self.config.n_nodes,
            n_actions: 3,
            act_dim: 1,
        }
    }

    fn reset(&mut self) -> Result<Vec<CombinedObs>> {
        self.rings = (0..self.config.n_threads).map(|_| self.new_ring()).collect();
        Ok((0..self.config.n_threads).map(|e| self.observe(e)).collect())
    }

    fn frame(&self, thread: usize) -> Option<RecordValue> {
        match self.rings.get(thread) {
            Some(ring) if self.config.frames => Some(self.draw(ring)),
            _ => None,
        }
    }

    fn step(&mut self, actions: &[ThreadActions]) -> Result<VecStep> {
        let n = self.config.n_threads;
        let a = self.config.n_agents;
        if actions.len() != n {
            bail!("Got actions for {} threads instead of {}", actions.len(), n);
        }

        let mut rewards = Array2::zeros((n, a));
        let mut dones = Array2::from_elem((n, a), false);
        let mut infos = Vec::with_capacity(n);
        for (e, actions) in actions.iter().enumerate() {
            if actions.dim() != (a, 1) {
                bail!("Actions of thread {} have shape {:?}", e, actions.shape());
            }
            let (reward, done, info) = self.step_ring(e, actions)?;
            rewards.row_mut(e).fill(reward);
            dones.row_mut(e).fill(done);
            infos.push(info);
        }

        Ok(VecStep {
            obs: (0..n).map(|e| self.observe(e)).collect(),
            rewards,
            dones,
            infos,
        })
    }
}
