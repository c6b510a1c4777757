//! SimulationLoop (C8, §4.6): the fixed 1 Hz tick driver. Owns the
//! process-wide RNG (§5 — only the Sim thread ever draws from it) and
//! orchestrates, each second: the advance phase (registry write lock), the
//! log phase (lock released), and the command-drain phase (registry write
//! lock again).

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sailnavsim_types::{BoatFlags, BoatRunState, BoatType, CelestialSightRow, CommandAction, LocationState, LogRow};
use tracing::{info, warn};

use crate::celestial;
use crate::engine::Engine;
use crate::geo::LatLon;
use crate::logger::{LogBatch, LogQueue};
use crate::physics;
use crate::registry::AddResult;
use crate::vessel::Vessel;

const TICK: Duration = Duration::from_secs(1);

pub struct SimulationLoop {
    engine: Arc<Engine>,
    log_queue: LogQueue,
    rng: StdRng,
    last_iter: u32,
}

impl SimulationLoop {
    /// `rng` is seeded once from wall-clock time at bootstrap (§5 RNG).
    pub fn new(engine: Arc<Engine>, log_queue: LogQueue) -> Self {
        let seed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64;
        Self { engine, log_queue, rng: StdRng::seed_from_u64(seed), last_iter: 0 }
    }

    /// Runs the tick loop forever. Never returns under normal operation;
    /// the process exits with the thread still running (§5).
    pub fn run(mut self) -> ! {
        let mut next_wakeup = Instant::now() + TICK;
        loop {
            self.tick();

            let now = Instant::now();
            if now < next_wakeup {
                std::thread::sleep(next_wakeup - now);
            } else {
                warn!("simulation loop fell behind by {:?}; skipping sleep", now - next_wakeup);
            }
            next_wakeup += TICK;
        }
    }

    /// One tick: advance phase, log phase, command phase (§4.6).
    pub fn tick(&mut self) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        let iter = (now.rem_euclid(60)) as u32;
        let do_log = iter < self.last_iter;
        self.last_iter = iter;

        let mut rows = Vec::new();
        let mut sights = Vec::new();

        let registry = self.engine.registry.clone();
        let env = self.engine.env.clone();
        let hull_solver = self.engine.hull_solver.clone();
        let rng = &mut self.rng;

        registry.for_each_mut(|name, vessel| {
            let report = physics::advance(vessel, env.as_ref(), hull_solver.as_ref(), now, rng);
            if !do_log {
                return;
            }

            if vessel.flags.contains(BoatFlags::CELESTIAL_NAV) {
                if let Some(sight) = celestial::attempt_sight(vessel, env.as_ref(), report.wave, now, rng) {
                    sights.push(CelestialSightRow {
                        unix_time: now,
                        boat_name: name.to_string(),
                        object: sight.object,
                        azimuth_deg: sight.azimuth_deg,
                        altitude_deg: sight.altitude_deg,
                    });
                }
            }

            rows.push(build_log_row(name, vessel, &report, env.as_ref(), now));
        });

        if do_log {
            self.log_queue.push(LogBatch { rows, sights });
        }

        let commands = self.engine.commands.drain();
        for cmd in commands {
            apply_command(&self.engine, cmd);
        }
    }
}

fn build_log_row(
    name: &str,
    vessel: &Vessel,
    report: &physics::AdvanceReport,
    env: &dyn crate::env::Env,
    now: i64,
) -> LogRow {
    let ice = env.sea_ice_pct(vessel.position, now);
    LogRow {
        unix_time: now,
        boat_name: name.to_string(),
        lat: vessel.position.lat,
        lon: vessel.position.lon,
        course_deg: vessel.heading_deg,
        speed_ms: vessel.water_velocity.mag_ms,
        track_deg: vessel.ground_velocity.angle_deg,
        ground_speed_ms: vessel.ground_velocity.mag_ms,
        wind_dir_deg: report.weather.wind.angle_deg,
        wind_mag_ms: report.weather.wind.mag_ms,
        current_dir_deg: report.ocean.map(|o| o.current.angle_deg),
        current_mag_ms: report.ocean.map(|o| o.current.mag_ms),
        water_temp_c: report.ocean.map(|o| o.water_temp_c),
        air_temp_c: report.weather.air_temp_c,
        dewpoint_c: report.weather.dewpoint_c,
        pressure_hpa: report.weather.pressure_hpa,
        cloud_pct: report.weather.cloud_pct,
        visibility_m: report.weather.visibility_m,
        precip_rate: report.weather.precip_rate,
        precip_condition: report.weather.precip_condition.clone(),
        boat_state: match vessel.run_state() {
            crate::vessel::RunState::Sailing => BoatRunState::Sailing,
            crate::vessel::RunState::Stopped => BoatRunState::Stopped,
            crate::vessel::RunState::SailsDown => BoatRunState::SailsDown,
        },
        location_state: if report.on_water { LocationState::Water } else { LocationState::Land },
        salinity: report.ocean.map(|o| o.salinity),
        sea_ice_pct: ice,
        distance_m: vessel.distance_travelled_m,
        damage_pct: vessel.damage_pct,
        gust_ms: report.weather.wind_gust.mag_ms,
        wave_height_m: report.wave.map(|w| w.height_m),
        magdec_deg: report.magdec_deg,
        invisible: vessel.flags.contains(BoatFlags::HIDDEN_IN_GROUP),
    }
}

/// Applies one drained command to the registry (§4.6 step 5). Commands
/// targeting a boat that no longer exists are silently dropped, per §4.2.
pub fn apply_command(engine: &Engine, cmd: sailnavsim_types::Command) {
    match cmd.action {
        CommandAction::Stop => {
            engine.registry.with_vessel_mut(&cmd.target, |v| {
                v.stopped = true;
                v.water_velocity = crate::vessel::Bearing::zero();
            });
        }
        CommandAction::Start => {
            engine.registry.with_vessel_mut(&cmd.target, |v| {
                v.stopped = false;
            });
        }
        CommandAction::CourseTrue { degrees } => {
            engine.registry.with_vessel_mut(&cmd.target, |v| {
                v.desired_course_deg = degrees as f64;
                v.course_magnetic = false;
            });
        }
        CommandAction::CourseMag { degrees } => {
            engine.registry.with_vessel_mut(&cmd.target, |v| {
                v.desired_course_deg = degrees as f64;
                v.course_magnetic = true;
            });
        }
        CommandAction::SailArea { percent } => {
            engine.registry.with_vessel_mut(&cmd.target, |v| {
                v.sail_area_frac = (percent as f64 / 100.0).clamp(0.0, 1.0);
            });
        }
        CommandAction::AddBoat { lat, lon, boat_type, flags } => {
            add_boat(engine, &cmd.target, lat, lon, boat_type, flags, None, None);
        }
        CommandAction::AddBoatWithGroup { lat, lon, boat_type, flags, group, alt_name } => {
            let alt = (!alt_name.is_empty()).then_some(alt_name.as_str());
            add_boat(engine, &cmd.target, lat, lon, boat_type, flags, Some(group.as_str()), alt);
        }
        CommandAction::RemoveBoat => {
            engine.registry.remove(&cmd.target);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_boat(
    engine: &Engine,
    name: &str,
    lat: f64,
    lon: f64,
    boat_type: i32,
    flags: i32,
    group: Option<&str>,
    alt_name: Option<&str>,
) {
    let Some(boat_type) = BoatType::from_i32(boat_type) else {
        warn!("add command for {name} had an invalid boat type {boat_type}");
        return;
    };
    let Some(flags) = BoatFlags::from_raw(flags) else {
        warn!("add command for {name} had invalid flags {flags}");
        return;
    };
    let pos = LatLon::new(lat, lon);
    let on_water = engine.env.is_water(pos);
    let mut vessel = Vessel::new(pos, boat_type, flags);
    vessel.moving_to_sea = !on_water;

    match engine.registry.add(vessel, name, group, alt_name) {
        AddResult::Ok => info!("added boat {name} at ({lat}, {lon})"),
        AddResult::Exists => warn!("add command for {name} ignored: name already exists"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advanced_hull::DefaultAdvancedHullSolver;
    use crate::config::EngineConfig;
    use crate::env::MockEnv;
    use sailnavsim_types::Command;

    fn test_engine() -> Arc<Engine> {
        Engine::new(Arc::new(MockEnv::default()), Arc::new(DefaultAdvancedHullSolver), EngineConfig::default())
    }

    #[test]
    fn add_then_start_then_tick_moves_the_boat() {
        let engine = test_engine();
        apply_command(&engine, Command::parse("Boat0,add,10.0,10.0,0,0").unwrap());
        apply_command(&engine, Command::parse("Boat0,start").unwrap());
        apply_command(&engine, Command::parse("Boat0,course,90").unwrap());

        let mut sim = SimulationLoop::new(engine.clone(), spawn_discard_logger());
        for _ in 0..5 {
            sim.tick();
        }
        let v = engine.registry.get_clone("Boat0").unwrap();
        assert!(!v.stopped);
    }

    #[test]
    fn remove_command_drops_the_boat() {
        let engine = test_engine();
        apply_command(&engine, Command::parse("Boat0,add,0.0,0.0,0,0").unwrap());
        apply_command(&engine, Command::parse("Boat0,remove").unwrap());
        assert!(engine.registry.get_clone("Boat0").is_none());
    }

    #[test]
    fn command_for_unknown_boat_is_silently_dropped() {
        let engine = test_engine();
        // Must not panic.
        apply_command(&engine, Command::parse("Ghost,stop").unwrap());
    }

    fn spawn_discard_logger() -> LogQueue {
        let (q, _handle) = crate::logger::spawn(std::env::temp_dir().join("sailnavsim-simloop-test-logs"), None);
        q
    }
}
