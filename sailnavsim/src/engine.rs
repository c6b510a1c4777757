//! The `Engine` aggregate (§9 design note): the registry, command queue,
//! `Env` provider, advanced-hull solver, and request counters as one owned
//! value shared (via `Arc`) between the Sim thread, the command reader, and
//! the NetServer worker pool — replacing the source's process-wide globals,
//! grounded on the teacher's `Arc<RwLock<RaceState>>` / `SharedEngine`
//! aggregate pattern (`state.rs`, `handlers.rs`).

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::advanced_hull::AdvancedHullSolver;
use crate::command::CommandQueue;
use crate::config::EngineConfig;
use crate::env::Env;
use crate::registry::BoatRegistry;

/// One cache line's worth of padding around each counter so that workers
/// incrementing different counters do not false-share a line (§4.8
/// "per-cache-line-aligned").
#[repr(align(64))]
#[derive(Default)]
pub struct PaddedCounter(pub AtomicU64);

impl PaddedCounter {
    pub fn inc(&self) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
    pub fn get(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// NetServer request/connection statistics (§4.8 Counters).
#[derive(Default)]
pub struct NetCounters {
    pub accept: PaddedCounter,
    pub accept_fail: PaddedCounter,
    pub read: PaddedCounter,
    pub read_fail: PaddedCounter,
    pub data_too_long: PaddedCounter,
    pub message: PaddedCounter,
    pub message_fail: PaddedCounter,
    pub req_bd_nc: PaddedCounter,
    pub req_wind: PaddedCounter,
    pub req_wind_c: PaddedCounter,
    pub req_wind_gust: PaddedCounter,
    pub req_wind_gust_c: PaddedCounter,
    pub req_ocean_current: PaddedCounter,
    pub req_sea_ice: PaddedCounter,
    pub req_wave_height: PaddedCounter,
    pub req_bd: PaddedCounter,
    pub req_boatcmd: PaddedCounter,
    pub req_boatgroupmembers: PaddedCounter,
    pub req_sys_req_counts: PaddedCounter,
    pub req_invalid: PaddedCounter,
}

impl NetCounters {
    /// Renders every counter as one CSV line for the `sys_req_counts`
    /// request, column order matching the field declaration order above.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.accept.get(),
            self.accept_fail.get(),
            self.read.get(),
            self.read_fail.get(),
            self.data_too_long.get(),
            self.message.get(),
            self.message_fail.get(),
            self.req_bd_nc.get(),
            self.req_wind.get(),
            self.req_wind_c.get(),
            self.req_wind_gust.get(),
            self.req_wind_gust_c.get(),
            self.req_ocean_current.get(),
            self.req_sea_ice.get(),
            self.req_wave_height.get(),
            self.req_bd.get(),
            self.req_boatcmd.get(),
            self.req_boatgroupmembers.get(),
            self.req_sys_req_counts.get(),
            self.req_invalid.get(),
        )
    }
}

/// The process-wide aggregate: everything a component needs, owned once and
/// shared by reference. Each field corresponds to one or more §4 components.
pub struct Engine {
    pub registry: Arc<BoatRegistry>,
    pub commands: Arc<CommandQueue>,
    pub env: Arc<dyn Env>,
    pub hull_solver: Arc<dyn AdvancedHullSolver>,
    pub config: EngineConfig,
    pub net_counters: Arc<NetCounters>,
}

impl Engine {
    pub fn new(
        env: Arc<dyn Env>,
        hull_solver: Arc<dyn AdvancedHullSolver>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(BoatRegistry::new()),
            commands: Arc::new(CommandQueue::new()),
            env,
            hull_solver,
            config,
            net_counters: Arc::new(NetCounters::default()),
        })
    }
}
