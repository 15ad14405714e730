//! Distribution of evaluation episodes over threads.
use crate::{
    error::CohortError,
    record::{Record, RecordValue},
    util::info_scalar,
};

/// Result of one evaluation episode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeResult {
    /// Terminal score.
    pub score: f32,

    /// 1 if the score is positive, 0 otherwise.
    pub win: f32,

    /// Number of steps the episode took.
    pub steps: f32,
}

impl EpisodeResult {
    /// Reads the result from the info of a thread whose episode just ended.
    ///
    /// The info must carry `score_reward`, `max_steps` and `steps_left`.
    pub fn from_info(info: &Record, thread: usize) -> Result<Self, CohortError> {
        let score = info_scalar(info, "score_reward", thread)?;
        let max_steps = info_scalar(info, "max_steps", thread)?;
        let steps_left = info_scalar(info, "steps_left", thread)?;
        Ok(Self {
            score,
            win: if score > 0. { 1. } else { 0. },
            steps: max_steps - steps_left,
        })
    }
}

/// Reduction of the recorded evaluation episodes.
///
/// The means are `None` when no episode was recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalSummary {
    /// Number of recorded episodes.
    pub eval_episodes: usize,

    /// Mean terminal score.
    pub eval_goal: Option<f32>,

    /// Fraction of episodes with a positive score.
    pub eval_win_rate: Option<f32>,

    /// Mean episode length.
    pub eval_step: Option<f32>,
}

impl From<EvalSummary> for Record {
    fn from(s: EvalSummary) -> Self {
        let mut record = Record::from_scalar("eval_episodes", s.eval_episodes as f32);
        let means = [
            ("eval_goal", s.eval_goal),
            ("eval_win_rate", s.eval_win_rate),
            ("eval_step", s.eval_step),
        ];
        for (k, v) in means.iter() {
            if let Some(v) = v {
                record.insert(*k, RecordValue::Scalar(*v));
            }
        }
        record
    }
}

/// Exactly-once accounting of `n_episodes` evaluation episodes over threads.
///
/// Thread `e` is assigned `q + 1` episodes if `e < r` and `q` otherwise, where
/// `q` and `r` are the quotient and remainder of `n_episodes / n_threads`.
/// A thread is active while it has completed fewer episodes than assigned;
/// episodes completed by an inactive thread are discarded. Results are kept in
/// the order they were recorded and are never overwritten.
///
/// ```rust
/// use cohort_core::evaluator::{EpisodeQuota, EpisodeResult};
///
/// let mut quota = EpisodeQuota::new(10, 4);
/// assert_eq!(quota.quotas(), &[3, 3, 2, 2]);
///
/// let result = EpisodeResult { score: 1.0, win: 1.0, steps: 12.0 };
/// for _ in 0..5 {
///     quota.record(0, result);
/// }
/// assert_eq!(quota.num_done(), 3);
/// assert!(!quota.is_active(0));
/// ```
#[derive(Clone, Debug)]
pub struct EpisodeQuota {
    quotas: Vec<usize>,
    completed: Vec<usize>,
    results: Vec<EpisodeResult>,
}

impl EpisodeQuota {
    /// Distributes `n_episodes` over `n_threads` threads.
    ///
    /// # Panics
    ///
    /// Panics if `n_threads` is 0.
    pub fn new(n_episodes: usize, n_threads: usize) -> Self {
        assert!(n_threads > 0, "at least one thread is required");
        let (q, r) = (n_episodes / n_threads, n_episodes % n_threads);
        let quotas = (0..n_threads).map(|e| if e < r { q + 1 } else { q }).collect();
        Self {
            quotas,
            completed: vec![0; n_threads],
            results: Vec::with_capacity(n_episodes),
        }
    }

    /// Number of episodes assigned to each thread.
    pub fn quotas(&self) -> &[usize] {
        &self.quotas
    }

    /// Number of episodes recorded for each thread.
    pub fn completed(&self) -> &[usize] {
        &self.completed
    }

    /// Total number of episodes to evaluate.
    pub fn n_episodes(&self) -> usize {
        self.quotas.iter().sum()
    }

    /// Returns `true` if `thread` has not reached its quota yet.
    pub fn is_active(&self, thread: usize) -> bool {
        self.completed[thread] < self.quotas[thread]
    }

    /// Number of recorded episodes.
    pub fn num_done(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if every episode was recorded.
    pub fn is_complete(&self) -> bool {
        self.num_done() == self.n_episodes()
    }

    /// Recorded results in the order they were recorded.
    pub fn results(&self) -> &[EpisodeResult] {
        &self.results
    }

    /// Records an episode completed by `thread`.
    ///
    /// Returns `false` and discards the result if the thread already reached its quota.
    pub fn record(&mut self, thread: usize, result: EpisodeResult) -> bool {
        if !self.is_active(thread) {
            log::trace!("Discarded an episode of thread {}", thread);
            return false;
        }
        self.results.push(result);
        self.completed[thread] += 1;
        true
    }

    /// Reduces the recorded results.
    pub fn summary(&self) -> EvalSummary {
        let n = self.results.len();
        let mean = |f: fn(&EpisodeResult) -> f32| {
            if n == 0 {
                None
            } else {
                Some(self.results.iter().map(f).sum::<f32>() / n as f32)
            }
        };
        EvalSummary {
            eval_episodes: n,
            eval_goal: mean(|r| r.score),
            eval_win_rate: mean(|r| r.win),
            eval_step: mean(|r| r.steps),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn result(score: f32) -> EpisodeResult {
        EpisodeResult {
            score,
            win: if score > 0. { 1. } else { 0. },
            steps: 10.,
        }
    }

    #[test]
    fn test_quotas_are_balanced() {
        for n_threads in 1..9 {
            for n_episodes in 0..40 {
                let quota = EpisodeQuota::new(n_episodes, n_threads);
                let q = quota.quotas();
                assert_eq!(q.iter().sum::<usize>(), n_episodes);
                let max = *q.iter().max().unwrap();
                let min = *q.iter().min().unwrap();
                assert!(max - min <= 1);
                // The larger quotas come first
                assert!(q.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn test_thread_stops_counting_at_quota() {
        let mut quota = EpisodeQuota::new(10, 4);
        assert_eq!(quota.quotas(), &[3, 3, 2, 2]);

        let accepted: Vec<bool> = (0..5).map(|i| quota.record(0, result(i as f32))).collect();
        assert_eq!(accepted, vec![true, true, true, false, false]);
        assert_eq!(quota.num_done(), 3);
        assert_eq!(quota.completed(), &[3, 0, 0, 0]);

        // Discovery order is kept
        let scores: Vec<f32> = quota.results().iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0., 1., 2.]);
    }

    #[test]
    fn test_complete() {
        let mut quota = EpisodeQuota::new(3, 2);
        quota.record(1, result(1.));
        quota.record(0, result(-1.));
        assert!(!quota.is_complete());
        quota.record(0, result(1.));
        assert!(quota.is_complete());
        assert!(!quota.record(1, result(1.)));

        let summary = quota.summary();
        assert_eq!(summary.eval_episodes, 3);
        assert_eq!(summary.eval_goal, Some(1. / 3.));
        assert_eq!(summary.eval_win_rate, Some(2. / 3.));
        assert_eq!(summary.eval_step, Some(10.));
    }

    #[test]
    fn test_empty_summary() {
        let quota = EpisodeQuota::new(5, 2);
        let summary = quota.summary();
        assert_eq!(summary.eval_episodes, 0);
        assert_eq!(summary.eval_goal, None);

        let record = Record::from(summary);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_scalar("eval_episodes").unwrap(), 0.);
    }

    #[test]
    fn test_result_from_info() {
        let mut info = Record::from_scalar("score_reward", 0.);
        info.insert("max_steps", RecordValue::Scalar(100.));
        info.insert("steps_left", RecordValue::Scalar(37.));
        let r = EpisodeResult::from_info(&info, 0).unwrap();
        assert_eq!(r.win, 0.);
        assert_eq!(r.steps, 63.);

        let info = Record::from_scalar("score_reward", 1.);
        assert!(matches!(
            EpisodeResult::from_info(&info, 2),
            Err(CohortError::MissingInfo { thread: 2, .. })
        ));
    }
}
