//! The `Env` contract (C2): a read-only geophysical data provider answering
//! point queries for weather, ocean current, wave, land/water, magnetic
//! declination, and celestial position. The real data-file backed provider
//! is out of scope (§1) — only this interface and a deterministic in-memory
//! implementation for tests/local runs live here.

use crate::geo::LatLon;

#[derive(Debug, Clone, Copy)]
pub struct WindVector {
    pub angle_deg: f64,
    pub mag_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct WeatherReport {
    pub wind: WindVector,
    pub wind_gust: WindVector,
    pub air_temp_c: f64,
    pub dewpoint_c: f64,
    pub pressure_hpa: f64,
    pub cloud_pct: f64,
    pub visibility_m: f64,
    pub precip_rate: f64,
    pub precip_condition: String,
}

#[derive(Debug, Clone, Copy)]
pub struct OceanData {
    pub current: WindVector,
    pub water_temp_c: f64,
    pub salinity: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct WaveData {
    pub height_m: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CelestialPosition {
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

/// Thread-safe, read-only geophysical data provider. All methods are point
/// queries; the engine never mutates Env state.
pub trait Env: Send + Sync {
    fn weather(&self, pos: LatLon, now: i64) -> WeatherReport;
    /// `None` when no ocean-current model is available at this point.
    fn ocean(&self, pos: LatLon, now: i64) -> Option<OceanData>;
    /// `None` when no wave model is available at this point.
    fn wave(&self, pos: LatLon, now: i64) -> Option<WaveData>;
    fn sea_ice_pct(&self, pos: LatLon, now: i64) -> Option<f64>;
    fn is_water(&self, pos: LatLon) -> bool;
    fn magnetic_declination(&self, pos: LatLon, now: i64) -> f64;
    fn sun_position(&self, pos: LatLon, now: i64) -> CelestialPosition;
    /// Position of star `id` (`1..=POLARIS_ID`); a fixed catalog is assumed.
    fn star_position(&self, id: u16, pos: LatLon, now: i64) -> CelestialPosition;
}

pub const POLARIS_ID: u16 = 1;

/// Deterministic, in-memory `Env` used for tests and as the default when no
/// external data-file directories are configured. All oceans are flat,
/// uniform wind blows from the west, and the world is one big ocean except
/// for a single square "island" centered at the origin — enough to exercise
/// the land/water and damage/course logic without needing real data files.
pub struct MockEnv {
    pub wind_angle_deg: f64,
    pub wind_mag_ms: f64,
    pub gust_mag_ms: f64,
    pub island_half_width_deg: f64,
}

impl Default for MockEnv {
    fn default() -> Self {
        Self {
            wind_angle_deg: 270.0,
            wind_mag_ms: 6.0,
            gust_mag_ms: 8.0,
            island_half_width_deg: 0.01,
        }
    }
}

impl Env for MockEnv {
    fn weather(&self, _pos: LatLon, _now: i64) -> WeatherReport {
        WeatherReport {
            wind: WindVector { angle_deg: self.wind_angle_deg, mag_ms: self.wind_mag_ms },
            wind_gust: WindVector { angle_deg: self.wind_angle_deg, mag_ms: self.gust_mag_ms },
            air_temp_c: 18.0,
            dewpoint_c: 14.0,
            pressure_hpa: 1013.0,
            cloud_pct: 30.0,
            visibility_m: 20_000.0,
            precip_rate: 0.0,
            precip_condition: String::from("none"),
        }
    }

    fn ocean(&self, _pos: LatLon, _now: i64) -> Option<OceanData> {
        Some(OceanData {
            current: WindVector { angle_deg: 0.0, mag_ms: 0.1 },
            water_temp_c: 17.0,
            salinity: 35.0,
        })
    }

    fn wave(&self, _pos: LatLon, _now: i64) -> Option<WaveData> {
        Some(WaveData { height_m: 0.5 })
    }

    fn sea_ice_pct(&self, _pos: LatLon, _now: i64) -> Option<f64> {
        Some(0.0)
    }

    fn is_water(&self, pos: LatLon) -> bool {
        pos.lat.abs() > self.island_half_width_deg || pos.lon.abs() > self.island_half_width_deg
    }

    fn magnetic_declination(&self, _pos: LatLon, _now: i64) -> f64 {
        0.0
    }

    fn sun_position(&self, _pos: LatLon, now: i64) -> CelestialPosition {
        // A cheap diurnal approximation: altitude peaks at local noon UTC.
        let seconds_of_day = (now.rem_euclid(86_400)) as f64;
        let frac = seconds_of_day / 86_400.0;
        let alt = 60.0 * (std::f64::consts::TAU * (frac - 0.5)).cos();
        let az = (frac * 360.0).rem_euclid(360.0);
        CelestialPosition { azimuth_deg: az, altitude_deg: alt }
    }

    fn star_position(&self, id: u16, _pos: LatLon, now: i64) -> CelestialPosition {
        let seconds_of_day = (now.rem_euclid(86_400)) as f64;
        let frac = seconds_of_day / 86_400.0 + (id as f64) / 37.0;
        let alt = 45.0 * (std::f64::consts::TAU * frac).sin();
        let az = (frac * 360.0).rem_euclid(360.0);
        CelestialPosition { azimuth_deg: az, altitude_deg: alt }
    }
}
