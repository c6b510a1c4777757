//! Wind-response polar lookup (basic hulls) and the advanced-hull solver
//! contract (§4.3.3, §9). The source's wind-response tables and advanced
//! hydrodynamic model are out of scope (§1) — opaque lookup functions the
//! engine only consumes. `AdvancedHullSolver` is the Rust expression of the
//! documented `sailnavsim_advancedboats_boat_update_v` C-ABI signature: it
//! stays plug-replaceable behind the trait while this crate ships one small
//! in-process default so the engine runs standalone.

use sailnavsim_types::{AdvancedHullInput, AdvancedHullOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HullSolverError;

/// The advanced-hull contract: wind angle/speed relative to heading, current
/// ahead/abeam speed and sail area in, new ahead/abeam speed and heel out.
/// Preserved as a trait per §9 so a numerically faithful external solver can
/// be swapped in without touching `VesselPhysics`.
pub trait AdvancedHullSolver: Send + Sync {
    fn update(&self, input: AdvancedHullInput) -> Result<AdvancedHullOutput, HullSolverError>;
}

/// A small polar-table-driven stand-in for the opaque external solver.
/// Ahead speed follows the same basic polar shape as [`polar_basic_response`]
/// scaled down for a cambered sail, heel grows with apparent wind angle and
/// speed, and abeam (leeway) speed is a fixed fraction of ahead speed that
/// falls off near dead-downwind, where leeway is negligible.
pub struct DefaultAdvancedHullSolver;

impl AdvancedHullSolver for DefaultAdvancedHullSolver {
    fn update(&self, input: AdvancedHullInput) -> Result<AdvancedHullOutput, HullSolverError> {
        if !input.wind_speed_ms.is_finite() || input.wind_speed_ms < 0.0 {
            return Err(HullSolverError);
        }
        let angle_from_wind_deg = input.wind_angle_rad.to_degrees() as f64;
        let wind_speed = input.wind_speed_ms as f64;

        let polar = polar_basic_response(wind_speed, angle_from_wind_deg) * 1.1;
        let prev_ahead = input.ahead_speed_ms as f64;
        let ahead = (prev_ahead * 3.0 + polar) / 4.0;

        let angle_rad = angle_from_wind_deg.to_radians();
        let abeam = ahead * 0.15 * angle_rad.sin().abs();
        let heel = (wind_speed * 2.2 * angle_rad.sin().abs()).min(45.0);

        Ok(AdvancedHullOutput {
            ahead_speed_ms: ahead as f32,
            abeam_speed_ms: abeam as f32,
            heel_deg: heel as f32,
        })
    }
}

/// Basic-hull wind-response polar (§4.3.3): dimensionless hull speed factor
/// as a function of true wind speed and angle-from-wind, applied as
/// `BoatWindResponse(windMag, angleFromWind, boatType)`. The real tables are
/// out of scope (§1); this is a smooth stand-in shaped like a typical
/// monohull polar — poor pointing dead upwind and dead downwind, best speed
/// on a reach.
pub fn polar_basic_response(wind_speed_ms: f64, angle_from_wind_deg: f64) -> f64 {
    if wind_speed_ms <= 0.0 {
        return 0.0;
    }
    let angle = angle_from_wind_deg.abs().min(180.0).to_radians();
    // No-go zone inside ~35 degrees of dead upwind.
    let upwind_gate = ((angle.to_degrees() - 35.0) / 15.0).clamp(0.0, 1.0);
    // Shape peaks around a close-to-beam reach and tapers running downwind.
    let shape = (angle * 0.72).sin().max(0.0) * 0.6 + (angle).sin().max(0.0) * 0.4;
    let boat_speed_factor = 0.85;
    wind_speed_ms * boat_speed_factor * shape * upwind_gate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_is_zero_dead_upwind() {
        assert_eq!(polar_basic_response(10.0, 0.0), 0.0);
    }

    #[test]
    fn polar_is_positive_on_a_reach() {
        assert!(polar_basic_response(10.0, 90.0) > 0.0);
    }

    #[test]
    fn polar_scales_with_wind() {
        let slow = polar_basic_response(5.0, 90.0);
        let fast = polar_basic_response(10.0, 90.0);
        assert!(fast > slow);
    }

    #[test]
    fn default_solver_rejects_bad_wind_speed() {
        let solver = DefaultAdvancedHullSolver;
        let input = AdvancedHullInput {
            wind_angle_rad: 0.0,
            wind_speed_ms: -1.0,
            ahead_speed_ms: 0.0,
            abeam_speed_ms: 0.0,
            sail_area_frac: 1.0,
        };
        assert!(solver.update(input).is_err());
    }

    #[test]
    fn default_solver_produces_finite_output() {
        let solver = DefaultAdvancedHullSolver;
        let input = AdvancedHullInput {
            wind_angle_rad: std::f32::consts::FRAC_PI_2,
            wind_speed_ms: 8.0,
            ahead_speed_ms: 2.0,
            abeam_speed_ms: 0.1,
            sail_area_frac: 1.0,
        };
        let out = solver.update(input).unwrap();
        assert!(out.ahead_speed_ms.is_finite());
        assert!(out.abeam_speed_ms.is_finite());
        assert!(out.heel_deg.is_finite());
    }
}
