//! Performance-mode (§4.6 "Performance-mode variant"): a deterministic
//! scripted workload replacing the command/logging steps, reporting tick
//! throughput in elapsed nanoseconds. Its wire protocol (if any) is out of
//! scope; only its existence and the three-independent-PRNGs name
//! generator (§5, last line) are preserved.

use std::sync::Arc;
use std::time::Instant;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sailnavsim_types::{BoatFlags, BoatType};
use tracing::info;

use crate::engine::Engine;
use crate::geo::LatLon;
use crate::vessel::Vessel;

const PERF_BOAT_COUNT: usize = 200;
const PERF_TICK_COUNT: usize = 600;

/// `PerfUtils`' "three independent PRNGs for name generation" (§5): one
/// each for boat names, group names, and alt-names, so that drawing one
/// doesn't perturb the others' sequences.
struct NameGenerators {
    boat: StdRng,
    group: StdRng,
    alt: StdRng,
}

impl NameGenerators {
    fn seeded(seed: u64) -> Self {
        Self {
            boat: StdRng::seed_from_u64(seed),
            group: StdRng::seed_from_u64(seed.wrapping_add(1)),
            alt: StdRng::seed_from_u64(seed.wrapping_add(2)),
        }
    }

    fn boat_name(&mut self, idx: usize) -> String {
        let suffix: String = (&mut self.boat).sample_iter(&Alphanumeric).take(4).map(char::from).collect();
        format!("PerfBoat{idx}-{suffix}")
    }

    fn group_name(&mut self, idx: usize) -> String {
        let suffix: String = (&mut self.group).sample_iter(&Alphanumeric).take(3).map(char::from).collect();
        format!("PerfGroup{}-{suffix}", idx % 8)
    }

    fn alt_name(&mut self) -> String {
        (&mut self.alt).sample_iter(&Alphanumeric).take(6).map(char::from).collect()
    }
}

/// Populates a scripted fleet, then runs `PERF_TICK_COUNT` ticks with no
/// command/logging phases, printing total and per-tick elapsed nanoseconds.
pub fn run(engine: Arc<Engine>) {
    let mut names = NameGenerators::seeded(0xA5A5_5A5A);
    for i in 0..PERF_BOAT_COUNT {
        let name = names.boat_name(i);
        let group = names.group_name(i);
        let alt = names.alt_name();
        let lat = -60.0 + (i as f64 % 120.0);
        let lon = -170.0 + ((i * 7) as f64 % 340.0);
        let mut vessel = Vessel::new(LatLon::new(lat, lon), BoatType::Basic, BoatFlags::TAKES_DAMAGE);
        vessel.stopped = false;
        vessel.desired_course_deg = (i as f64 * 37.0) % 360.0;
        engine.registry.add(vessel, &name, Some(&group), Some(&alt));
    }

    let mut rng = StdRng::seed_from_u64(1);
    let registry = engine.registry.clone();
    let env = engine.env.clone();
    let hull_solver = engine.hull_solver.clone();

    let start = Instant::now();
    for tick in 0..PERF_TICK_COUNT {
        let now = tick as i64;
        registry.for_each_mut(|_name, vessel| {
            crate::physics::advance(vessel, env.as_ref(), hull_solver.as_ref(), now, &mut rng);
        });
    }
    let elapsed = start.elapsed();

    info!(
        "perf mode: {PERF_BOAT_COUNT} boats x {PERF_TICK_COUNT} ticks in {} ns ({:.1} ns/boat-tick)",
        elapsed.as_nanos(),
        elapsed.as_nanos() as f64 / (PERF_BOAT_COUNT * PERF_TICK_COUNT) as f64
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_generators_are_independent_sequences() {
        let mut gens = NameGenerators::seeded(1);
        let boat0 = gens.boat_name(0);
        let group0 = gens.group_name(0);
        let alt0 = gens.alt_name();
        assert_ne!(boat0, group0);
        assert_ne!(group0, alt0);
    }

    #[test]
    fn run_completes_without_panicking() {
        let engine = Engine::new(
            Arc::new(crate::env::MockEnv::default()),
            Arc::new(crate::advanced_hull::DefaultAdvancedHullSolver),
            crate::config::EngineConfig::default(),
        );
        run(engine);
    }
}
