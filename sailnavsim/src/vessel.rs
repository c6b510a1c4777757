//! The per-boat data model (§3).

use sailnavsim_types::{BoatFlags, BoatType};

use crate::geo::LatLon;

#[derive(Debug, Clone, Copy)]
pub struct Bearing {
    pub angle_deg: f64,
    pub mag_ms: f64,
}

impl Bearing {
    pub const fn zero() -> Self {
        Self { angle_deg: 0.0, mag_ms: 0.0 }
    }

    /// Vector sum, reflecting (negating magnitude, rotating 180°) if the
    /// resultant magnitude comes out negative (§3 invariant 3).
    pub fn add(self, other: Bearing) -> Bearing {
        let (x1, y1) = self.to_xy();
        let (x2, y2) = other.to_xy();
        let (x, y) = (x1 + x2, y1 + y2);
        Bearing::from_xy(x, y)
    }

    fn to_xy(self) -> (f64, f64) {
        let rad = self.angle_deg.to_radians();
        (self.mag_ms * rad.sin(), self.mag_ms * rad.cos())
    }

    fn from_xy(x: f64, y: f64) -> Bearing {
        let mag = (x * x + y * y).sqrt();
        if mag < 1e-12 {
            return Bearing::zero();
        }
        let angle = x.atan2(y).to_degrees();
        Bearing { angle_deg: crate::geo::normalize_bearing(angle), mag_ms: mag }
    }

    pub fn at_angle(self, offset_deg: f64, mag_ms: f64) -> Bearing {
        Bearing {
            angle_deg: crate::geo::normalize_bearing(self.angle_deg + offset_deg),
            mag_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Sailing,
    Stopped,
    SailsDown,
}

/// A single simulated vessel, owned by its `BoatEntry` in the registry.
#[derive(Debug, Clone)]
pub struct Vessel {
    pub position: LatLon,
    pub heading_deg: f64,
    pub desired_course_deg: f64,
    pub course_magnetic: bool,
    pub water_velocity: Bearing,
    pub ground_velocity: Bearing,
    pub leeway_ms: f64,
    pub heel_deg: f64,
    pub sail_area_frac: f64,
    pub distance_travelled_m: f64,
    pub damage_pct: f64,
    pub boat_type: BoatType,
    pub flags: BoatFlags,
    pub starting_from_land_count: u8,
    pub stopped: bool,
    pub sails_down: bool,
    pub moving_to_sea: bool,
    pub first_desired_course_immediate: bool,
}

impl Vessel {
    /// `moving_to_sea` starts `false`; callers that place a boat on land
    /// (bootstrap ingest, the `add`/`add_g` commands) must set it from an
    /// actual `Env::is_water` query once they have an `Env` to ask.
    pub fn new(position: LatLon, boat_type: BoatType, flags: BoatFlags) -> Self {
        Self {
            position,
            heading_deg: 0.0,
            desired_course_deg: 0.0,
            course_magnetic: false,
            water_velocity: Bearing::zero(),
            ground_velocity: Bearing::zero(),
            leeway_ms: 0.0,
            heel_deg: 0.0,
            sail_area_frac: 1.0,
            distance_travelled_m: 0.0,
            damage_pct: 0.0,
            boat_type,
            flags,
            starting_from_land_count: 0,
            stopped: true,
            sails_down: false,
            moving_to_sea: false,
            first_desired_course_immediate: true,
        }
    }

    pub fn run_state(&self) -> RunState {
        if self.stopped {
            RunState::Stopped
        } else if self.sails_down {
            RunState::SailsDown
        } else {
            RunState::Sailing
        }
    }

    pub fn desired_course_true(&self, magdec_deg: f64) -> f64 {
        if self.course_magnetic {
            crate::geo::normalize_bearing(self.desired_course_deg + magdec_deg)
        } else {
            self.desired_course_deg
        }
    }
}

/// Boat-type tuning constants referenced by the physics model.
#[derive(Debug, Clone, Copy)]
pub struct BoatTypeParams {
    pub damage_take_threshold_ms: f64,
    pub course_change_rate_deg_s: f64,
    pub wave_resistance: f64,
    pub speed_change_response: f64,
}

pub fn boat_type_params(boat_type: BoatType) -> BoatTypeParams {
    match boat_type {
        BoatType::Basic => BoatTypeParams {
            damage_take_threshold_ms: 15.43, // ~30 kt
            course_change_rate_deg_s: 3.0,
            wave_resistance: 4.0,
            speed_change_response: 5.0,
        },
        BoatType::Advanced => BoatTypeParams {
            damage_take_threshold_ms: 18.0, // ~35 kt
            course_change_rate_deg_s: 2.0,
            wave_resistance: 6.0,
            speed_change_response: 8.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_add_reflects_negative_magnitude() {
        let a = Bearing { angle_deg: 0.0, mag_ms: 1.0 };
        let b = Bearing { angle_deg: 180.0, mag_ms: 3.0 };
        let sum = a.add(b);
        assert!((sum.mag_ms - 2.0).abs() < 1e-9);
        assert!((sum.angle_deg - 180.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_add_zero_is_identity() {
        let a = Bearing { angle_deg: 45.0, mag_ms: 2.0 };
        let sum = a.add(Bearing::zero());
        assert!((sum.mag_ms - 2.0).abs() < 1e-9);
        assert!((sum.angle_deg - 45.0).abs() < 1e-6);
    }
}
