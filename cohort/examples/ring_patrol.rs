use anyhow::Result;
use clap::Parser;
use cohort::{
    demo::{FrozenTrainer, RingPatrolConfig, RingPatrolEnv, UniformPolicy},
    RecorderConfig,
};
use cohort_core::{ActorCriticConfig, Runner, RunnerConfig};
use std::path::PathBuf;

const N_NODES: usize = 6;
const GAMMA: f32 = 0.99;

/// Run uniform agents patrolling a ring
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Runner configuration in YAML; overrides the options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of rollout threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Number of agents
    #[arg(long, default_value_t = 2)]
    agents: usize,

    /// Steps of an episode, also the rollout window
    #[arg(long, default_value_t = 50)]
    episode_length: usize,

    /// Total environment steps
    #[arg(long, default_value_t = 20_000)]
    steps: usize,

    /// Directory of checkpoints, logs and GIFs
    #[arg(long, default_value = "./ring_patrol")]
    dir: PathBuf,

    /// Render episodes and save GIFs after training
    #[arg(short, long, default_value_t = false)]
    render: bool,

    /// Log metrics with MLflow at the given URL instead of Tensorboard
    #[arg(short, long)]
    mlflow: Option<String>,
}

fn runner_config(args: &Args) -> Result<RunnerConfig> {
    match args.config.as_ref() {
        Some(path) => RunnerConfig::load(path),
        None => Ok(RunnerConfig::default()
            .env_name("ring_patrol")
            .algorithm_name("uniform")
            .episode_length(args.episode_length)
            .n_rollout_threads(args.threads)
            .n_eval_rollout_threads(args.threads)
            .num_agents(args.agents)
            .num_env_steps(args.steps)
            .log_interval(args.steps / 10)
            .save_interval(args.steps / 2)
            .use_eval(true)
            .eval_interval(args.steps / 4)
            .eval_episodes(args.threads)
            .render_episodes(2)
            .save_gifs(args.render)
            .save_dir(args.dir.join("models"))
            .run_dir(args.dir.join("runs"))),
    }
}

fn recorder_config(args: &Args, config: &RunnerConfig) -> RecorderConfig {
    match args.mlflow.as_ref() {
        Some(url) => RecorderConfig::Mlflow {
            url: url.clone(),
            experiment: config.env_name.clone(),
            run_name: "".to_string(),
        },
        None => RecorderConfig::Tensorboard {
            logdir: config.run_dir.join("logs"),
        },
    }
}

fn run(args: &Args) -> Result<()> {
    let config = runner_config(args)?;
    let env_config = RingPatrolConfig::default()
        .n_threads(config.n_rollout_threads)
        .n_agents(config.num_agents)
        .n_nodes(N_NODES)
        .episode_length(config.episode_length)
        .frames(config.save_gifs);
    let eval_env_config = env_config.clone().n_threads(config.n_eval_rollout_threads);

    let policy_config = ActorCriticConfig::default()
        .obs_shape(vec![2 * N_NODES])
        .share_obs_shape(vec![2 * N_NODES])
        .hidden_size(config.hidden_size)
        .recurrent_n(config.recurrent_n);
    let policy = UniformPolicy::build(&policy_config, config.seed as u64)?;
    let mut trainer = FrozenTrainer::new(policy, GAMMA);

    let mut recorder = recorder_config(args, &config).build_recorder(&config)?;
    let mut runner =
        Runner::<RingPatrolEnv>::build(config.clone(), &env_config, Some(&eval_env_config))?;
    std::fs::create_dir_all(&config.run_dir)?;
    config.save(config.run_dir.join("config.yaml"))?;

    runner.run(&mut trainer, recorder.as_mut())?;
    if config.save_gifs {
        let rewards = runner.render(&mut trainer)?;
        log::info!("Rewards of rendered episodes: {:?}", rewards);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::{run, Args};
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_ring_patrol() -> Result<()> {
        let tmp_dir = TempDir::new("ring_patrol")?;
        let args = Args {
            config: None,
            threads: 2,
            agents: 2,
            episode_length: 10,
            steps: 200,
            dir: tmp_dir.path().to_path_buf(),
            render: true,
            mlflow: None,
        };
        run(&args)?;

        let run_dir = tmp_dir.path().join("runs");
        assert!(run_dir.join("config.yaml").exists());
        assert!(run_dir.join("gifs/episode1.gif").exists());
        assert!(tmp_dir.path().join("models").read_dir()?.count() > 0);
        Ok(())
    }
}
