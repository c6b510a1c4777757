//! VesselPhysics (C5, §4.3): the per-tick state advance for one vessel.

use rand::Rng;

use crate::advanced_hull::{polar_basic_response, AdvancedHullSolver};
use crate::env::{Env, OceanData, WaveData, WeatherReport};
use crate::geo::{compass_diff, is_approximately_near_visible_land, normalize_bearing, LatLon};
use crate::vessel::{boat_type_params, Bearing, Vessel};
use sailnavsim_types::BoatFlags;

/// Knots per metre/second, used by the damage model's rate constants (§4.3.1).
pub const KNOTS_PER_MS: f64 = 1.943_844;
/// Repair threshold: 25 knots in m/s.
pub const DAMAGE_REPAIR_THRESHOLD_MS: f64 = 12.8611;
const POLAR_PROBE_STEP_M: f64 = 10.0;
const POLAR_PROBE_MAX_M: f64 = 110.0;
const SAILS_DOWN_SPEED_FACTOR: f64 = 0.1;
const LAUNCH_SPEED_MS: f64 = 0.5;

/// Everything the advance produced that the SimulationLoop needs in order
/// to build a `LogRow` and, if applicable, a celestial sight (§4.6 step 3).
pub struct AdvanceReport {
    pub weather: WeatherReport,
    pub ocean: Option<OceanData>,
    pub wave: Option<WaveData>,
    pub magdec_deg: f64,
    pub on_water: bool,
}

/// Advances `vessel` by one tick. `now` is the wall-clock second used for
/// magnetic declination and (by the caller) celestial queries.
pub fn advance(
    vessel: &mut Vessel,
    env: &dyn Env,
    hull_solver: &dyn AdvancedHullSolver,
    now: i64,
    rng: &mut impl Rng,
) -> AdvanceReport {
    let magdec = env.magnetic_declination(vessel.position, now);

    // 1. Stopped: attempt a repair-only damage tick and stop.
    if vessel.stopped {
        let weather = env.weather(vessel.position, now);
        repair_damage(vessel, gust_magnitude(vessel, &weather));
        return AdvanceReport { weather, ocean: None, wave: None, magdec_deg: magdec, on_water: true };
    }

    // 2. Polar guard.
    if vessel.position.is_near_pole() {
        vessel.stopped = true;
        vessel.water_velocity = Bearing::zero();
        let weather = env.weather(vessel.position, now);
        return AdvanceReport { weather, ocean: None, wave: None, magdec_deg: magdec, on_water: true };
    }

    // 3. Moving-to-sea launch sequence.
    if vessel.moving_to_sea {
        if env.is_water(vessel.position) {
            vessel.moving_to_sea = false;
            if vessel.first_desired_course_immediate {
                vessel.heading_deg = vessel.desired_course_true(magdec);
                vessel.first_desired_course_immediate = false;
            }
        } else {
            let desired_true = vessel.desired_course_true(magdec);
            if is_heading_toward_water(env, vessel.position, desired_true) {
                vessel.heading_deg = desired_true;
                vessel.water_velocity = Bearing { angle_deg: desired_true, mag_ms: LAUNCH_SPEED_MS };
                vessel.leeway_ms = 0.0;
                vessel.position = vessel.position.step(desired_true, LAUNCH_SPEED_MS);
                vessel.distance_travelled_m += LAUNCH_SPEED_MS;
                let weather = env.weather(vessel.position, now);
                return AdvanceReport { weather, ocean: None, wave: None, magdec_deg: magdec, on_water: false };
            } else {
                vessel.stopped = true;
                vessel.water_velocity = Bearing::zero();
                let weather = env.weather(vessel.position, now);
                return AdvanceReport { weather, ocean: None, wave: None, magdec_deg: magdec, on_water: false };
            }
        }
    }

    // Main tick path.
    let mut weather = env.weather(vessel.position, now);
    let ocean = env.ocean(vessel.position, now);
    let wave = env.wave(vessel.position, now);

    if let Some(oc) = ocean {
        weather.wind = add_vectors(weather.wind_angle_mag(), oc.current_angle_mag());
        weather.wind_gust = add_vectors(weather.wind_gust_angle_mag(), oc.current_angle_mag());
    }

    if vessel.sails_down {
        // Sails-down drift: heading downwind, speed scaled by wind only;
        // damage may only be repaired this tick, never taken.
        vessel.heading_deg = normalize_bearing(weather.wind.angle_deg + 180.0);
        let ice = ice_factor(env.sea_ice_pct(vessel.position, now));
        let wave_f = wave_factor(vessel, wave);
        let speed = weather.wind.mag_ms * SAILS_DOWN_SPEED_FACTOR * ice * wave_f;
        vessel.water_velocity = Bearing { angle_deg: vessel.heading_deg, mag_ms: speed };
        repair_damage(vessel, gust_magnitude(vessel, &weather));
    } else {
        let params = boat_type_params(vessel.boat_type);
        let takes_damage = vessel.flags.contains(BoatFlags::TAKES_DAMAGE)
            && (!vessel.boat_type.is_advanced() || vessel.sail_area_frac > 0.0);
        update_damage(vessel, &weather, params.damage_take_threshold_ms, takes_damage);
        update_course(vessel, magdec, params.course_change_rate_deg_s, rng);
        update_velocity(vessel, env, hull_solver, &weather, wave, now);
    }

    // Ground vector.
    let mut ground = vessel.water_velocity;
    if let Some(oc) = ocean {
        let damping = (10.0 - vessel.starting_from_land_count as f64) / 10.0;
        let current = Bearing { angle_deg: oc.current.angle_deg, mag_ms: oc.current.mag_ms * damping };
        ground = ground.add(current);
    }
    if vessel.leeway_ms.abs() > 1e-9 {
        let leeway = Bearing { angle_deg: normalize_bearing(vessel.heading_deg + 90.0), mag_ms: vessel.leeway_ms };
        ground = ground.add(leeway);
    }
    vessel.ground_velocity = ground;

    if vessel.starting_from_land_count > 0 {
        vessel.starting_from_land_count -= 1;
    }

    vessel.position = vessel.position.step(ground.angle_deg, ground.mag_ms);
    vessel.distance_travelled_m += ground.mag_ms;

    let on_water = env.is_water(vessel.position);
    if !on_water {
        vessel.stopped = true;
        vessel.water_velocity = Bearing::zero();
        vessel.starting_from_land_count = 10;
    }

    AdvanceReport { weather, ocean, wave, magdec_deg: magdec, on_water }
}

trait WeatherVecExt {
    fn wind_angle_mag(&self) -> Bearing;
    fn wind_gust_angle_mag(&self) -> Bearing;
}

impl WeatherVecExt for WeatherReport {
    fn wind_angle_mag(&self) -> Bearing {
        Bearing { angle_deg: self.wind.angle_deg, mag_ms: self.wind.mag_ms }
    }
    fn wind_gust_angle_mag(&self) -> Bearing {
        Bearing { angle_deg: self.wind_gust.angle_deg, mag_ms: self.wind_gust.mag_ms }
    }
}

trait OceanVecExt {
    fn current_angle_mag(&self) -> Bearing;
}
impl OceanVecExt for OceanData {
    fn current_angle_mag(&self) -> Bearing {
        Bearing { angle_deg: self.current.angle_deg, mag_ms: self.current.mag_ms }
    }
}

fn add_vectors(a: Bearing, b: Bearing) -> crate::env::WindVector {
    let sum = a.add(b);
    crate::env::WindVector { angle_deg: sum.angle_deg, mag_ms: sum.mag_ms }
}

fn gust_magnitude(vessel: &Vessel, weather: &WeatherReport) -> f64 {
    if vessel.flags.contains(BoatFlags::DAMAGE_USES_APPARENT) {
        let mut gust = Bearing { angle_deg: weather.wind_gust.angle_deg, mag_ms: weather.wind_gust.mag_ms };
        gust = gust.add(vessel.water_velocity.at_angle(180.0, vessel.water_velocity.mag_ms));
        if vessel.leeway_ms.abs() > 1e-9 {
            let leeway = gust.at_angle(90.0, -vessel.leeway_ms);
            gust = gust.add(leeway);
        }
        gust.mag_ms
    } else {
        weather.wind_gust.mag_ms
    }
}

fn repair_damage(vessel: &mut Vessel, gust_ms: f64) {
    if gust_ms < DAMAGE_REPAIR_THRESHOLD_MS {
        let delta = (DAMAGE_REPAIR_THRESHOLD_MS - gust_ms) * 0.25 * KNOTS_PER_MS / 3600.0;
        vessel.damage_pct = (vessel.damage_pct - delta).max(0.0);
    }
}

fn update_damage(vessel: &mut Vessel, weather: &WeatherReport, take_threshold_ms: f64, takes_damage: bool) {
    let gust = gust_magnitude(vessel, weather);
    if gust < DAMAGE_REPAIR_THRESHOLD_MS {
        repair_damage(vessel, gust);
    } else if gust > take_threshold_ms && takes_damage && vessel.damage_pct < 100.0 {
        let over = gust - take_threshold_ms;
        let delta = (100.0 - vessel.damage_pct) * over * over * 0.25 * KNOTS_PER_MS * KNOTS_PER_MS / 360_000.0;
        vessel.damage_pct = (vessel.damage_pct + delta).min(100.0);
    }
}

fn update_course(vessel: &mut Vessel, magdec_deg: f64, rate_deg_s: f64, rng: &mut impl Rng) {
    let desired = vessel.desired_course_true(magdec_deg);
    let d = compass_diff(vessel.heading_deg, desired);
    let new_heading = if d.abs() <= rate_deg_s {
        desired
    } else if d > -180.0 && d < 0.0 {
        // heading trails desired (short way is increasing heading).
        vessel.heading_deg + rate_deg_s
    } else if d > 0.0 && d < 180.0 {
        // heading leads desired (short way is decreasing heading).
        vessel.heading_deg - rate_deg_s
    } else {
        // |d| essentially 180 degrees: tie-break with a coin flip.
        if rng.gen_bool(0.5) {
            vessel.heading_deg + rate_deg_s
        } else {
            vessel.heading_deg - rate_deg_s
        }
    };
    vessel.heading_deg = normalize_bearing(new_heading);
}

fn ice_factor(ice_pct: Option<f64>) -> f64 {
    ice_pct.map(|ice| 1.0 - ice / 100.0).unwrap_or(1.0)
}

fn wave_factor(vessel: &Vessel, wave: Option<WaveData>) -> f64 {
    if !vessel.flags.contains(BoatFlags::WAVE_SPEED_EFFECT) {
        return 1.0;
    }
    let Some(wave) = wave else { return 1.0 };
    let params = boat_type_params(vessel.boat_type);
    (-(wave.height_m * wave.height_m) / params.wave_resistance).exp()
}

fn update_velocity(
    vessel: &mut Vessel,
    env: &dyn Env,
    hull_solver: &dyn AdvancedHullSolver,
    weather: &WeatherReport,
    wave: Option<WaveData>,
    now: i64,
) {
    let angle_from_wind = compass_diff(weather.wind.angle_deg, vessel.heading_deg);
    let ice = ice_factor(env.sea_ice_pct(vessel.position, now));
    let wave_f = wave_factor(vessel, wave);
    let saf_common = ice * wave_f;
    let damage_factor = if vessel.flags.contains(BoatFlags::TAKES_DAMAGE) {
        1.0 - vessel.damage_pct / 100.0
    } else {
        1.0
    };

    match vessel.boat_type {
        sailnavsim_types::BoatType::Basic => {
            let params = boat_type_params(vessel.boat_type);
            let polar = polar_basic_response(weather.wind.mag_ms, angle_from_wind);
            let target_speed = polar * saf_common * damage_factor;
            let prev_speed = vessel.water_velocity.mag_ms;
            let inertia = params.speed_change_response;
            let new_speed = (inertia * prev_speed + target_speed) / (inertia + 1.0);
            vessel.water_velocity = Bearing { angle_deg: vessel.heading_deg, mag_ms: new_speed };
        }
        sailnavsim_types::BoatType::Advanced => {
            let saf_prime = if vessel.sail_area_frac > 0.0 { saf_common.max(0.01) } else { saf_common };
            let ahead_in = vessel.water_velocity.mag_ms / saf_prime.max(1e-6);
            let abeam_in = vessel.leeway_ms / saf_prime.max(1e-6);
            let input = sailnavsim_types::AdvancedHullInput {
                wind_angle_rad: (-angle_from_wind).to_radians() as f32,
                wind_speed_ms: weather.wind.mag_ms as f32,
                ahead_speed_ms: ahead_in as f32,
                abeam_speed_ms: abeam_in as f32,
                sail_area_frac: vessel.sail_area_frac as f32,
            };
            match hull_solver.update(input) {
                Ok(out) => {
                    let ahead = out.ahead_speed_ms as f64 * saf_prime;
                    let abeam = out.abeam_speed_ms as f64 * saf_prime;
                    vessel.water_velocity = Bearing { angle_deg: vessel.heading_deg, mag_ms: ahead };
                    vessel.leeway_ms = abeam;
                    vessel.heel_deg = out.heel_deg as f64;
                }
                Err(_) => {
                    vessel.water_velocity = Bearing { angle_deg: vessel.heading_deg, mag_ms: 0.0 };
                    vessel.leeway_ms = 0.0;
                    vessel.heel_deg = 0.0;
                }
            }
        }
    }
}

/// isHeadingTowardWater (§4.3.4): probes 10 m steps out to 110 m along
/// `course_true_deg`, returning true as soon as any sample is water.
pub fn is_heading_toward_water(env: &dyn Env, from: LatLon, course_true_deg: f64) -> bool {
    let mut dist = POLAR_PROBE_STEP_M;
    while dist <= POLAR_PROBE_MAX_M {
        let sample = from.step(course_true_deg, dist);
        if env.is_water(sample) {
            return true;
        }
        dist += POLAR_PROBE_STEP_M;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advanced_hull::DefaultAdvancedHullSolver;
    use crate::env::MockEnv;
    use sailnavsim_types::{BoatFlags, BoatType};

    fn started_boat(boat_type: BoatType) -> Vessel {
        let mut v = Vessel::new(LatLon::new(10.0, 10.0), boat_type, BoatFlags::empty());
        v.stopped = false;
        v.moving_to_sea = false;
        v
    }

    #[test]
    fn pole_guard_stops_vessel() {
        let env = MockEnv::default();
        let solver = DefaultAdvancedHullSolver;
        let mut v = started_boat(BoatType::Basic);
        v.position = LatLon::new(89.99995, 10.0);
        let mut rng = rand::thread_rng();
        advance(&mut v, &env, &solver, 0, &mut rng);
        assert!(v.stopped);
        assert_eq!(v.water_velocity.mag_ms, 0.0);
    }

    #[test]
    fn course_slews_toward_desired() {
        let env = MockEnv::default();
        let solver = DefaultAdvancedHullSolver;
        let mut v = started_boat(BoatType::Basic);
        v.heading_deg = 0.0;
        v.desired_course_deg = 90.0;
        let mut rng = rand::thread_rng();
        for _ in 0..30 {
            advance(&mut v, &env, &solver, 0, &mut rng);
        }
        assert!((v.heading_deg - 90.0).abs() < 1e-6);
    }

    #[test]
    fn damage_stays_within_bounds() {
        let env = MockEnv { gust_mag_ms: 30.0, ..MockEnv::default() };
        let solver = DefaultAdvancedHullSolver;
        let mut v = started_boat(BoatType::Basic);
        v.flags = BoatFlags::TAKES_DAMAGE;
        let mut rng = rand::thread_rng();
        for _ in 0..3600 {
            advance(&mut v, &env, &solver, 0, &mut rng);
            assert!(v.damage_pct >= 0.0 && v.damage_pct <= 100.0);
        }
        assert!(v.damage_pct > 0.0);
    }

    #[test]
    fn distance_travelled_is_nondecreasing() {
        let env = MockEnv::default();
        let solver = DefaultAdvancedHullSolver;
        let mut v = started_boat(BoatType::Basic);
        v.desired_course_deg = 45.0;
        let mut rng = rand::thread_rng();
        let mut prev = v.distance_travelled_m;
        for _ in 0..50 {
            advance(&mut v, &env, &solver, 0, &mut rng);
            assert!(v.distance_travelled_m >= prev);
            prev = v.distance_travelled_m;
        }
    }
}
