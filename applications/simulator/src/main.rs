/// PulseTempo simulator - drives run sessions against a simulated strap and player
mod config;
mod error;
mod library;
mod player;
mod sensor;

use clap::{Parser, Subcommand};
use config::SimulatorConfig;
use library::SimulatedAnalyzer;
use player::SimulatedPlayer;
use pulse_core::Track;
use pulse_playback::{rank, scoring, BpmResolver, PlayedSet, RunSession, SessionSnapshot};
use sensor::SimulatedSensor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pulse-sim")]
#[command(about = "Drive PulseTempo run sessions against simulated hardware", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./pulse.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Track library as JSON (default: built-in demo pool)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a full run and print its summary as JSON
    Run {
        /// Simulated run length in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Seed for the simulated strap
        #[arg(long)]
        seed: Option<u64>,

        /// Leave unscored tracks unscored instead of analyzing them
        #[arg(long)]
        no_analysis: bool,
    },
    /// Print pool scores for a target heart rate
    Rank {
        /// Target heart rate (or cadence)
        #[arg(long)]
        heart_rate: u32,

        /// Analyze unscored tracks before ranking
        #[arg(long)]
        analyze: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_sim=info,pulse_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = SimulatorConfig::load(cli.config.as_deref())?;
    if cli.library.is_some() {
        config.library.path = cli.library;
    }

    match cli.command {
        Commands::Run {
            duration,
            seed,
            no_analysis,
        } => {
            if let Some(duration) = duration {
                config.simulation.duration_secs = duration;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            config.validate()?;
            run(config, !no_analysis).await?;
        }
        Commands::Rank {
            heart_rate,
            analyze,
        } => {
            config.validate()?;
            print_ranking(&config, heart_rate, analyze).await?;
        }
    }

    Ok(())
}

async fn load_pool(config: &SimulatorConfig, analyze: bool) -> anyhow::Result<Vec<Track>> {
    let pool = library::load_or_demo(config.library.path.as_deref())?;
    if !analyze {
        return Ok(pool);
    }

    let resolver = BpmResolver::with_policy(
        Arc::new(SimulatedAnalyzer),
        pool.len(),
        2,
        Duration::from_millis(50),
    );
    let pool = resolver.annotate_pool(pool).await;
    info!(
        scored = pool.iter().filter(|t| t.is_scored()).count(),
        total = pool.len(),
        "Track pool ready"
    );
    Ok(pool)
}

async fn run(config: SimulatorConfig, analyze: bool) -> anyhow::Result<()> {
    let pool = load_pool(&config, analyze).await?;
    let sim = &config.simulation;
    info!(
        simulated_secs = sim.duration_secs,
        real_secs = sim.real_duration().as_secs_f64(),
        metric = %config.session.metric,
        "Starting simulated run"
    );

    let sensor = Arc::new(SimulatedSensor::new(sim.clone()));
    let (player, mut now_playing) = SimulatedPlayer::new(&pool, sim.clone());
    let session = RunSession::new(config.session.clone(), pool, sensor, Arc::new(player));
    let reporter = tokio::spawn(report_progress(session.subscribe()));

    session.start().await?;

    let deadline = tokio::time::sleep(sim.real_duration());
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            Some(track) = now_playing.recv() => {
                session.now_playing_changed(track).await?;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Could not listen for Ctrl-C: {}", e);
                }
                warn!("Interrupted, ending run early");
                break;
            }
        }
    }

    let summary = session.stop().await?;
    reporter.abort();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Log track and lookahead changes as the run goes
async fn report_progress(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut last_track = None;
    let mut last_up_next = None;

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();

        let track_id = snapshot.current_track.as_ref().map(|t| t.id.clone());
        if track_id != last_track {
            if let Some(track) = &snapshot.current_track {
                info!(
                    title = %track.title,
                    artist = %track.artist,
                    bpm = ?track.bpm,
                    heart_rate = ?snapshot.current_heart_rate,
                    elapsed_secs = snapshot.elapsed.as_secs(),
                    "Now playing"
                );
            }
            last_track = track_id;
        }

        let up_next = snapshot.up_next.as_ref().map(|t| t.id.clone());
        if up_next != last_up_next {
            if let Some(track) = &snapshot.up_next {
                info!(title = %track.title, bpm = ?track.bpm, "Up next");
            }
            last_up_next = up_next;
        }
    }
}

async fn print_ranking(
    config: &SimulatorConfig,
    heart_rate: u32,
    analyze: bool,
) -> anyhow::Result<()> {
    let pool = load_pool(config, analyze).await?;
    let ranked = rank(&pool, &PlayedSet::new(), heart_rate);

    println!(
        "Target {} {} (zone tempo {})",
        heart_rate,
        config.session.metric.unit(),
        scoring::ideal_tempo(heart_rate)
    );
    println!("{:>6}  {:>4}  track", "score", "bpm");
    for (track, score) in ranked {
        let bpm = track
            .bpm
            .map_or_else(|| "-".to_string(), |bpm| bpm.to_string());
        println!(
            "{:>6.3}  {:>4}  {} - {}",
            score, bpm, track.title, track.artist
        );
    }
    Ok(())
}
