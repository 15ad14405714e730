use anyhow::Result;
use cohort_core::{
    dummy::{DummyPolicy, DummyVecEnv, DummyVecEnvConfig},
    error::CohortError,
    Evaluator, QuotaEvaluator,
};
use test_log::test;

fn evaluator(
    episode_steps: Vec<usize>,
    n_episodes: usize,
    horizon: usize,
) -> Result<QuotaEvaluator<DummyVecEnv>> {
    let config = DummyVecEnvConfig::default().episode_steps(episode_steps);
    Ok(QuotaEvaluator::new(&config, 0, n_episodes, horizon)?.recurrent_state(1, 4))
}

#[test]
fn test_fast_thread_is_capped_at_its_quota() -> Result<()> {
    // Thread 0 ends an episode every step, the others never within the budget
    let mut evaluator = evaluator(vec![1, 100, 100, 100], 10, 8)?;
    let mut policy = DummyPolicy::new(1);
    let quota = evaluator.run(&mut policy)?;

    assert_eq!(quota.quotas(), &[3, 3, 2, 2]);
    assert_eq!(quota.completed(), &[3, 0, 0, 0]);
    assert_eq!(quota.num_done(), 3);
    assert_eq!(policy.n_act, 8);

    let summary = quota.summary();
    assert_eq!(summary.eval_episodes, 3);
    assert_eq!(summary.eval_goal, Some(0.));
    assert_eq!(summary.eval_win_rate, Some(0.));
    assert_eq!(summary.eval_step, Some(1.));
    Ok(())
}

#[test]
fn test_evaluation_stops_when_every_episode_is_recorded() -> Result<()> {
    let mut evaluator = evaluator(vec![1, 1, 1, 1], 10, 100)?;
    let mut policy = DummyPolicy::new(1);
    let quota = evaluator.run(&mut policy)?;

    assert!(quota.is_complete());
    assert_eq!(policy.n_act, 3);
    let threads: Vec<f32> = quota.results().iter().map(|r| r.score).collect();
    assert_eq!(threads, vec![0., 1., 2., 3., 0., 1., 2., 3., 0., 1.]);
    Ok(())
}

#[test]
fn test_no_episode_within_budget() -> Result<()> {
    let mut evaluator = evaluator(vec![50, 50], 4, 5)?;
    let record = evaluator.evaluate(&mut DummyPolicy::new(1))?;
    assert_eq!(record.get_scalar("eval_episodes")?, 0.);
    assert!(record.get("eval_goal").is_none());
    Ok(())
}

#[test]
fn test_missing_score_is_fatal() -> Result<()> {
    let config = DummyVecEnvConfig::default()
        .episode_steps(vec![1])
        .omit_info("score_reward");
    let mut evaluator = QuotaEvaluator::<DummyVecEnv>::new(&config, 0, 2, 10)?.recurrent_state(1, 4);
    let err = evaluator.run(&mut DummyPolicy::new(1)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CohortError>(),
        Some(CohortError::MissingInfo { .. })
    ));
    Ok(())
}
