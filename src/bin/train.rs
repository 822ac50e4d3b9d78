#![recursion_limit = "256"]

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use arcade_rl::ai::{ActionHistogram, DqnAgent, EpsilonGreedy, RandomAgent, TrainableAgent};
use arcade_rl::bridge::{SimulationHost, StepBridge};
use arcade_rl::checkpoint::CheckpointManager;
use arcade_rl::config::AppConfig;
use arcade_rl::error::TrainingError;
use arcade_rl::logging;
use arcade_rl::sim::{Breakout, GameKind, Lander};
use arcade_rl::training::{Trainer, TrainingReport, TrainingUpdate};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Dqn,
    Random,
}

/// Train an RL agent on one of the arcade simulations.
#[derive(Parser)]
#[command(name = "train", about = "Train an RL agent on an arcade simulation")]
struct Cli {
    /// Game to train on (overrides simulation.game)
    #[arg(long, value_enum)]
    game: Option<GameKind>,

    /// Algorithm to train
    #[arg(long, value_enum, default_value_t = Algorithm::Dqn)]
    algorithm: Algorithm,

    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override training episodes per epoch
    #[arg(long)]
    games_per_epoch: Option<usize>,

    /// Override learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Override checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Resume training from the latest checkpoint
    #[arg(long)]
    resume: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    if cli.print_config {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    // Load configuration
    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(game) = cli.game {
        app_config.simulation.game = game;
    }
    if let Some(epochs) = cli.epochs {
        app_config.training.epochs = epochs;
    }
    if let Some(games) = cli.games_per_epoch {
        app_config.training.games_per_epoch = games;
    }
    if let Some(lr) = cli.lr {
        app_config.dqn.learning_rate = lr;
    }
    if let Some(dir) = cli.checkpoint_dir {
        app_config.checkpoint.checkpoint_dir = dir;
    }
    app_config.validate().context("invalid configuration after CLI overrides")?;

    let sim = &app_config.simulation;
    let (mut host, bridge) = match sim.game {
        GameKind::Breakout => SimulationHost::spawn(Breakout::new(sim.breakout.clone(), sim.seed)),
        GameKind::Lander => SimulationHost::spawn(Lander::new(sim.lander.clone())),
    };
    let input_size = bridge
        .observe()
        .context("reading initial observation")?
        .len();
    let action_count = bridge.action_count();
    info!(
        simulation = bridge.simulation_name(),
        input_size, action_count, "simulation host started"
    );

    let (mut agent, histogram) = build_agent(cli.algorithm, &app_config, input_size, action_count);

    let manager = CheckpointManager::new(app_config.checkpoint.clone());
    let mut start_epoch = 0;
    let mut best_rate = None;
    if cli.resume {
        match manager.restore_latest(agent.as_mut()) {
            Ok(data) => {
                start_epoch = data.metadata.epoch + 1;
                best_rate = manager.best_validation_win_rate().unwrap_or_else(|e| {
                    warn!(error = %e, "could not read earlier best checkpoints");
                    None
                });
                info!(
                    path = %data.path.display(),
                    epoch = data.metadata.epoch,
                    best_validation_win_rate = ?best_rate,
                    "resumed from checkpoint"
                );
            }
            Err(e) => warn!(error = %e, "no checkpoint restored, starting fresh"),
        }
    }

    let (update_tx, update_rx) = mpsc::channel::<TrainingUpdate>();
    let trainer = Trainer::new(app_config.training.clone())
        .with_updates(update_tx)
        .with_start_epoch(start_epoch)
        .with_best_validation_rate(best_rate);

    let training = spawn_trainer(trainer, agent, bridge, manager)?;

    // The channel closes once the trainer is dropped at the end of the run.
    for update in update_rx {
        print_update(&update);
    }

    let result = training
        .join()
        .map_err(|_| anyhow!("training thread panicked"))?;
    host.shutdown();
    let report = result.context("training failed")?;

    if let Some(histogram) = histogram {
        info!(actions = %histogram, "action histogram");
    }
    println!(
        "Training complete: {} epochs, {} faulted episodes, final checkpoint {}",
        report.epochs.len(),
        report.total_faults,
        report.final_checkpoint.display()
    );
    Ok(())
}

type BoxedAgent = Box<dyn TrainableAgent + Send>;

fn build_agent(
    algorithm: Algorithm,
    config: &AppConfig,
    input_size: usize,
    action_count: usize,
) -> (BoxedAgent, Option<Arc<ActionHistogram>>) {
    match algorithm {
        Algorithm::Dqn => {
            let dqn = DqnAgent::new(config.dqn.clone(), input_size, action_count);
            let policy = EpsilonGreedy::from_config(dqn, &config.exploration, action_count);
            let histogram = policy.histogram();
            (Box::new(policy), Some(histogram))
        }
        Algorithm::Random => {
            let agent = match config.exploration.seed {
                Some(seed) => RandomAgent::with_seed(action_count, seed),
                None => RandomAgent::new(action_count),
            };
            (Box::new(agent), None)
        }
    }
}

fn spawn_trainer(
    mut trainer: Trainer,
    mut agent: BoxedAgent,
    bridge: Arc<StepBridge>,
    mut manager: CheckpointManager,
) -> Result<thread::JoinHandle<Result<TrainingReport, TrainingError>>> {
    thread::Builder::new()
        .name("trainer".into())
        .spawn(move || trainer.train(agent.as_mut(), &bridge, &mut manager))
        .context("spawning training thread")
}

fn print_update(update: &TrainingUpdate) {
    match update {
        TrainingUpdate::Epoch(r) => println!(
            "Epoch {:>4} | train: {:>5.1}% | val: {:>5.1}% | loss: {:.4} | avg_len: {:.1} | faults: {}",
            r.epoch,
            r.train_win_rate * 100.0,
            r.validation_win_rate * 100.0,
            r.average_loss,
            r.average_episode_length,
            r.faults
        ),
        TrainingUpdate::CheckpointSaved { epoch, kind, path } => println!(
            "  >> {} checkpoint for epoch {}: {}",
            kind.as_str(),
            epoch,
            path.display()
        ),
        TrainingUpdate::Finished(report) => {
            if let Some(rate) = report.best_validation_win_rate {
                println!("  >> best validation win rate: {:.1}%", rate * 100.0);
            }
        }
    }
}
