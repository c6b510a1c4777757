//! Geodesy primitives and the approximate near-visible-land sampler (§4.5).

use crate::env::Env;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METRES_PER_DEGREE: f64 = 60.0 * 1852.0;
const POLE_EPS_DEG: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat: normalize_lat(lat), lon: normalize_lon(lon) }
    }

    pub fn is_near_pole(&self) -> bool {
        self.lat.abs() >= 90.0 - POLE_EPS_DEG
    }

    /// Steps `distance_m` along bearing `bearing_deg` (true), great-circle.
    pub fn step(&self, bearing_deg: f64, distance_m: f64) -> LatLon {
        if distance_m <= 0.0 {
            return *self;
        }
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();
        let brng = bearing_deg.to_radians();
        let delta = distance_m / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * brng.cos()).asin();
        let lon2 = lon1
            + (brng.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

        LatLon::new(lat2.to_degrees(), lon2.to_degrees())
    }
}

fn normalize_lat(lat: f64) -> f64 {
    lat.clamp(-90.0, 90.0)
}

fn normalize_lon(lon: f64) -> f64 {
    let mut l = lon % 360.0;
    if l >= 180.0 {
        l -= 360.0;
    } else if l < -180.0 {
        l += 360.0;
    }
    l
}

/// Signed angular difference `a - b` normalized to `(-180, 180]`, as used by
/// the course-update and velocity-update logic (§4.3.2/§4.3.3).
pub fn compass_diff(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}

pub fn normalize_bearing(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

/// Offsets `center` by `(dlat_m, dlon_m)` in metres using an equirectangular
/// approximation, clamping latitude and wrapping longitude. A deliberately
/// coarse approximation per §4.5/§9 — very close to a pole, a wrapped
/// sample that still falls out of range is resolved as "water in the
/// north, land in the south", a documented hack rather than a bug.
fn offset_metres(center: LatLon, dlat_m: f64, dlon_m: f64) -> LatLon {
    let dlat_deg = dlat_m / METRES_PER_DEGREE;
    let cos_lat = center.lat.to_radians().cos().max(1e-6);
    let dlon_deg = dlon_m / (METRES_PER_DEGREE * cos_lat);

    let raw_lat = center.lat + dlat_deg;
    if raw_lat > 90.0 || raw_lat < -90.0 {
        // Pole-fallback hack (documented in the design notes): treat the
        // northern excursion as water, the southern as land, rather than
        // attempting to reflect longitude across the pole.
        return LatLon::new(if raw_lat > 90.0 { 89.9999 } else { -89.9999 }, center.lon);
    }
    LatLon::new(raw_lat, center.lon + dlon_deg)
}

/// Approximate test for "is land visible within `visibility_m` metres of
/// `pos`", per §4.5: concentric rings of growing radius and sample count,
/// early-exiting as soon as any sample lands on land.
pub fn is_approximately_near_visible_land(env: &dyn Env, pos: LatLon, visibility_m: f64) -> bool {
    if !env.is_water(pos) {
        return true;
    }

    let mut radius = 30.0_f64;
    let mut samples = 4_u32;
    while radius <= visibility_m.min(31_000.0) {
        if sample_ring_hits_land(env, pos, radius, samples) {
            return true;
        }
        radius *= 2.0;
        samples = (samples * 2).min(32);
    }

    if visibility_m > 30.0 && sample_ring_hits_land(env, pos, visibility_m, samples) {
        return true;
    }

    false
}

fn sample_ring_hits_land(env: &dyn Env, pos: LatLon, radius_m: f64, samples: u32) -> bool {
    for i in 0..samples {
        let theta = std::f64::consts::TAU * (i as f64) / (samples as f64);
        let dlat_m = radius_m * theta.cos();
        let dlon_m = radius_m * theta.sin();
        let sample = offset_metres(pos, dlat_m, dlon_m);
        if !env.is_water(sample) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MockEnv;

    #[test]
    fn compass_diff_handles_wraparound() {
        assert!((compass_diff(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((compass_diff(350.0, 10.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn step_moves_roughly_expected_distance() {
        let start = LatLon::new(0.0, 0.0);
        let moved = start.step(90.0, 111_320.0); // ~1 degree of longitude at equator
        assert!((moved.lon - 1.0).abs() < 0.05);
        assert!(moved.lat.abs() < 0.05);
    }

    #[test]
    fn land_detected_directly_under_point() {
        let env = MockEnv::default();
        let on_land = LatLon::new(0.0, 0.0);
        assert!(is_approximately_near_visible_land(&env, on_land, 1000.0));
    }

    #[test]
    fn far_open_ocean_reports_no_land() {
        let env = MockEnv::default();
        let open_water = LatLon::new(10.0, 10.0);
        assert!(!is_approximately_near_visible_land(&env, open_water, 1000.0));
    }
}
