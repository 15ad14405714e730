//! Evaluation of a [`Policy`].
use crate::{base::Policy, record::Record};
use anyhow::Result;
mod quota;
mod quota_evaluator;
pub use quota::{EpisodeQuota, EpisodeResult, EvalSummary};
pub use quota_evaluator::QuotaEvaluator;

/// Evaluates a [`Policy`].
pub trait Evaluator {
    /// Evaluates the policy and returns the reduced metrics.
    ///
    /// The caller of this method needs to handle the internal state of the
    /// policy, like training/evaluation mode.
    fn evaluate<P: Policy>(&mut self, policy: &mut P) -> Result<Record>;
}
