//! Process configuration: defaults, `--config <path>` TOML overrides, and
//! the CLI flags named in §6.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// §6: `-v|--version` prints the version and exits 0; any other unknown
/// token is a usage error (clap's default behavior, exit code 2).
#[derive(Debug, Parser)]
#[command(
    name = "sailnavsim",
    version,
    about = "SailNavSim fixed-tick sailing simulation engine",
    disable_version_flag = true
)]
pub struct Cli {
    /// Print version and exit.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: (),

    /// Path to a TOML config file overriding the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run the deterministic scripted performance-mode workload instead of
    /// serving commands, and report tick throughput.
    #[arg(long)]
    pub perf: bool,

    /// Enable the TCP request server on this port.
    #[arg(long)]
    pub netport: Option<u16>,
}

/// Engine-wide tunables. Data directory layout, the FIFO path, and the log
/// directory are implementation-defined (§1/§6 leave them out of scope);
/// these defaults are for local development and tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fifo_path: PathBuf,
    pub log_dir: PathBuf,
    pub initial_fleet_csv: Option<PathBuf>,
    pub net_worker_count: usize,
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fifo_path: PathBuf::from("./sailnavsim-commands.fifo"),
            log_dir: PathBuf::from("./logs"),
            initial_fleet_csv: None,
            net_worker_count: 5,
            database_url: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = toml::from_str(&text)?;
        Ok(cfg)
    }
}
