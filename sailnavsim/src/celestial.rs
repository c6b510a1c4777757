//! CelestialSight (C6, §4.4): a per-tick astronomical sight attempt for
//! vessels flagged `celestial-nav`, gated by cloud cover and twilight rules
//! and perturbed by wave action when the `celestial-wave-effect` flag is set.

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::env::{CelestialPosition, Env, WaveData, POLARIS_ID};
use crate::vessel::{boat_type_params, Vessel};
use sailnavsim_types::CelestialObject;

const CLOUD_OBSCURE_TOO_DARK_ALT_DEG: f64 = -12.0;
const TWILIGHT_TOO_BRIGHT_ALT_DEG: f64 = -6.0;
const STAR_RETRY_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct Sight {
    pub object: CelestialObject,
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

/// Attempts a celestial sight from `vessel`'s current position at `now`.
/// `None` covers every "no sight" outcome in §4.4: cloud-obscured, too dark,
/// twilight too bright, or a wave perturbation that drops the altitude below
/// the horizon.
pub fn attempt_sight(
    vessel: &Vessel,
    env: &dyn Env,
    wave: Option<WaveData>,
    now: i64,
    rng: &mut impl Rng,
) -> Option<Sight> {
    let weather = env.weather(vessel.position, now);
    let adjusted_cover = (weather.cloud_pct * 100.0).sqrt();
    if rng.gen_bool((adjusted_cover / 100.0).clamp(0.0, 1.0)) {
        return None;
    }

    let sun = env.sun_position(vessel.position, now);
    let raw = if sun.altitude_deg > 0.0 {
        Some(Sight { object: CelestialObject::Sun, azimuth_deg: sun.azimuth_deg, altitude_deg: sun.altitude_deg })
    } else if sun.altitude_deg < CLOUD_OBSCURE_TOO_DARK_ALT_DEG {
        None
    } else if sun.altitude_deg > TWILIGHT_TOO_BRIGHT_ALT_DEG {
        None
    } else {
        pick_visible_star(vessel, env, now, rng)
    }?;

    perturb_for_waves(vessel, raw, wave, rng)
}

fn pick_visible_star(
    vessel: &Vessel,
    env: &dyn Env,
    now: i64,
    rng: &mut impl Rng,
) -> Option<Sight> {
    for _ in 0..STAR_RETRY_LIMIT {
        let id = rng.gen_range(1..=POLARIS_ID);
        let star: CelestialPosition = env.star_position(id, vessel.position, now);
        if star.altitude_deg > 0.0 {
            return Some(Sight { object: CelestialObject::Star(id), azimuth_deg: star.azimuth_deg, altitude_deg: star.altitude_deg });
        }
    }
    None
}

fn perturb_for_waves(
    vessel: &Vessel,
    sight: Sight,
    wave: Option<WaveData>,
    rng: &mut impl Rng,
) -> Option<Sight> {
    if !vessel.flags.contains(sailnavsim_types::BoatFlags::CELESTIAL_WAVE_EFFECT) {
        return Some(sight);
    }
    let Some(wave) = wave else { return Some(sight) };

    let dist = Uniform::new(-1.0_f64, 1.0);
    let u1: f64 = dist.sample(rng);
    let u2: f64 = dist.sample(rng);
    let params = boat_type_params(vessel.boat_type);
    let factor = u1 * u2 * wave.height_m / params.wave_resistance;

    let mut az = sight.azimuth_deg + 100.0 * factor;
    az = crate::geo::normalize_bearing(az);
    let mut alt = sight.altitude_deg + (1.666_667) * factor;
    if alt > 90.0 {
        alt = 180.0 - alt;
    }
    if alt < 0.0 {
        return None;
    }
    Some(Sight { object: sight.object, azimuth_deg: az, altitude_deg: alt })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MockEnv;
    use crate::geo::LatLon;
    use sailnavsim_types::{BoatFlags, BoatType};

    fn nav_boat() -> Vessel {
        let mut v = Vessel::new(LatLon::new(0.0, 0.0), BoatType::Basic, BoatFlags::CELESTIAL_NAV);
        v.stopped = false;
        v
    }

    #[test]
    fn noon_sun_sight_has_positive_altitude() {
        let env = MockEnv::default();
        let v = nav_boat();
        let mut rng = rand::rngs::mock::StepRng::new(0, 1); // never obscures (gen_bool(0) false)
        let sight = attempt_sight(&v, &env, None, 43_200, &mut rng);
        if let Some(s) = sight {
            assert!(matches!(s.object, CelestialObject::Sun));
            assert!(s.altitude_deg > 0.0);
        }
    }

    #[test]
    fn full_cloud_cover_always_obscures() {
        let env_full_cloud = crate::env::MockEnv::default();
        let v = nav_boat();
        // cloud_pct is fixed at 30 in MockEnv, so adjusted cover = sqrt(3000) ~= 54.77;
        // a constant-max RNG (always returns the largest fraction) must never pass
        // the gen_bool threshold below 1.0, exercising the obscured branch.
        let mut rng = rand::rngs::mock::StepRng::new(u64::MAX, 0);
        let sight = attempt_sight(&v, &env_full_cloud, None, 43_200, &mut rng);
        assert!(sight.is_none());
    }
}
