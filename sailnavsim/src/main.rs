mod advanced_hull;
mod celestial;
mod command;
mod config;
mod engine;
mod env;
mod error;
mod fleet;
mod geo;
mod logger;
mod netserver;
mod perf;
mod physics;
mod registry;
mod simloop;
mod vessel;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use advanced_hull::DefaultAdvancedHullSolver;
use command::CommandQueue;
use config::{Cli, EngineConfig};
use engine::Engine;
use env::MockEnv;
use fleet::InitialFleetSource;
use simloop::SimulationLoop;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sailnavsim=info")))
        .init();

    let config = EngineConfig::load(cli.config.as_deref())?;

    let env: Arc<dyn env::Env> = Arc::new(MockEnv::default());
    let hull_solver = Arc::new(DefaultAdvancedHullSolver);
    let engine = Engine::new(env, hull_solver, config.clone());

    load_initial_fleet(&engine)?;

    let (log_queue, _log_handle) = logger::spawn(config.log_dir.clone(), config.database_url.clone());

    if cli.perf {
        perf::run(engine);
        return Ok(());
    }

    {
        let fifo_path = config.fifo_path.clone();
        let commands: Arc<CommandQueue> = engine.commands.clone();
        std::thread::spawn(move || command::run_fifo_reader(fifo_path, commands));
    }

    if let Some(port) = cli.netport {
        let engine = engine.clone();
        let worker_count = config.net_worker_count;
        std::thread::spawn(move || {
            if let Err(e) = netserver::spawn(engine, "0.0.0.0", port, worker_count) {
                tracing::error!("net server failed to start: {e}");
            }
        });
    }

    tracing::info!("sailnavsim engine starting ({} boats loaded)", engine.registry.len());

    SimulationLoop::new(engine, log_queue).run()
}

/// Ingests the bootstrap fleet from whichever source is configured (§4.9).
fn load_initial_fleet(engine: &Arc<Engine>) -> anyhow::Result<()> {
    let csv_path = engine.config.initial_fleet_csv.clone()
        .unwrap_or_else(|| std::path::PathBuf::from("./initial-fleet.csv"));

    let source = fleet::select_source(engine.config.database_url.as_deref(), &csv_path);
    let records = source.load()?;
    for mut record in records {
        // Mirror the `add`/`add_g` command path (simloop::add_boat): a boat
        // whose initial position is on land must launch via the
        // moving-to-sea sequence (§4.3 step 3) rather than sit idle.
        record.vessel.moving_to_sea = !engine.env.is_water(record.vessel.position);
        match engine.registry.add(record.vessel, &record.name, record.group.as_deref(), record.alt_name.as_deref()) {
            registry::AddResult::Ok => {}
            registry::AddResult::Exists => {
                tracing::warn!("initial fleet record for {} duplicates an already-loaded boat", record.name);
            }
        }
    }
    Ok(())
}
