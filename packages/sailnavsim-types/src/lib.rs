//! # sailnavsim-types
//!
//! Shared wire and domain types for the SailNavSim core engine.
//!
//! These types are used by:
//! - `sailnavsim`: the engine binary (registry, command ingress, logger, net server)
//! - any external advanced-hull solver linked against the
//!   `sailnavsim_advancedboats_boat_update_v` C-ABI contract, via the
//!   `#[repr(C)]` structs at the bottom of this crate.

use serde::{Deserialize, Serialize};

// ── Boat type & flags ──────────────────────────────────────────────────────

/// Hull model family. Basic hulls use a polar lookup table; advanced hulls
/// delegate ahead/abeam speed and heel to an `AdvancedHullSolver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoatType {
    Basic = 0,
    Advanced = 1,
}

impl BoatType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Basic),
            1 => Some(Self::Advanced),
            _ => None,
        }
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced)
    }
}

bitflags::bitflags! {
    /// Per-vessel behavior bitfield, bits 0..=5.
    #[derive(Serialize, Deserialize)]
    pub struct BoatFlags: u8 {
        const TAKES_DAMAGE            = 0b0000_0001;
        const WAVE_SPEED_EFFECT       = 0b0000_0010;
        const CELESTIAL_NAV           = 0b0000_0100;
        const CELESTIAL_WAVE_EFFECT   = 0b0000_1000;
        const DAMAGE_USES_APPARENT    = 0b0001_0000;
        const HIDDEN_IN_GROUP         = 0b0010_0000;
    }
}

impl BoatFlags {
    /// Parses the `flags` command/request argument, valid range `[0, 0x3f]`.
    pub fn from_raw(v: i32) -> Option<Self> {
        if !(0..=0x3f).contains(&v) {
            return None;
        }
        Self::from_bits(v as u8)
    }
}

// ── Command model (§4.2) ───────────────────────────────────────────────────

/// A fully parsed, validated command ready for delivery to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: String,
    pub action: CommandAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandAction {
    Stop,
    Start,
    CourseTrue { degrees: i32 },
    CourseMag { degrees: i32 },
    SailArea { percent: i32 },
    AddBoat { lat: f64, lon: f64, boat_type: i32, flags: i32 },
    AddBoatWithGroup { lat: f64, lon: f64, boat_type: i32, flags: i32, group: String, alt_name: String },
    RemoveBoat,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command line")]
    Empty,
    #[error("missing target name")]
    MissingTarget,
    #[error("missing action keyword")]
    MissingAction,
    #[error("unknown action keyword `{0}`")]
    UnknownAction(String),
    #[error("wrong argument count for `{0}`: expected {1}, got {2}")]
    WrongArgCount(&'static str, usize, usize),
    #[error("malformed value in argument {0}")]
    MalformedValue(usize),
    #[error("value out of range in argument {0}")]
    OutOfRange(usize),
}

impl Command {
    /// Parses one comma-separated, newline-stripped command line per §4.2.
    ///
    /// `<name>,<keyword>[,<v1>...]`
    pub fn parse(line: &str) -> Result<Command, CommandParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }
        let mut tokens = line.split(',');
        let target = tokens.next().filter(|s| !s.is_empty()).ok_or(CommandParseError::MissingTarget)?;
        let keyword = tokens.next().ok_or(CommandParseError::MissingAction)?;
        let rest: Vec<&str> = tokens.collect();

        let action = match keyword {
            "stop" => expect_argc(keyword, &rest, 0).map(|_| CommandAction::Stop)?,
            "start" => expect_argc(keyword, &rest, 0).map(|_| CommandAction::Start)?,
            "course" => {
                expect_argc(keyword, &rest, 1)?;
                let degrees = parse_int_range(&rest, 0, 0, 360)?;
                CommandAction::CourseTrue { degrees }
            }
            "course_m" => {
                expect_argc(keyword, &rest, 1)?;
                let degrees = parse_int_range(&rest, 0, 0, 360)?;
                CommandAction::CourseMag { degrees }
            }
            "sail_area" => {
                expect_argc(keyword, &rest, 1)?;
                let percent = parse_int_range(&rest, 0, 0, 100)?;
                CommandAction::SailArea { percent }
            }
            "add" => {
                expect_argc(keyword, &rest, 4)?;
                let lat = parse_f64_range(&rest, 0, -90.0, 90.0)?;
                let lon = parse_f64_range(&rest, 1, -180.0, 180.0)?;
                let boat_type = parse_int(&rest, 2)?;
                let flags = parse_int(&rest, 3)?;
                if BoatType::from_i32(boat_type).is_none() {
                    return Err(CommandParseError::OutOfRange(2));
                }
                if BoatFlags::from_raw(flags).is_none() {
                    return Err(CommandParseError::OutOfRange(3));
                }
                CommandAction::AddBoat { lat, lon, boat_type, flags }
            }
            "add_g" => {
                expect_argc(keyword, &rest, 6)?;
                let lat = parse_f64_range(&rest, 0, -90.0, 90.0)?;
                let lon = parse_f64_range(&rest, 1, -180.0, 180.0)?;
                let boat_type = parse_int(&rest, 2)?;
                let flags = parse_int(&rest, 3)?;
                if BoatType::from_i32(boat_type).is_none() {
                    return Err(CommandParseError::OutOfRange(2));
                }
                if BoatFlags::from_raw(flags).is_none() {
                    return Err(CommandParseError::OutOfRange(3));
                }
                let group = rest[4].to_string();
                if group.is_empty() {
                    return Err(CommandParseError::OutOfRange(4));
                }
                let alt_name = rest[5].to_string();
                CommandAction::AddBoatWithGroup { lat, lon, boat_type, flags, group, alt_name }
            }
            "remove" => expect_argc(keyword, &rest, 0).map(|_| CommandAction::RemoveBoat)?,
            other => return Err(CommandParseError::UnknownAction(other.to_string())),
        };

        Ok(Command { target: target.to_string(), action })
    }

    /// Canonical re-serialization, the inverse of `parse` (§8 invariant 10).
    pub fn to_line(&self) -> String {
        match &self.action {
            CommandAction::Stop => format!("{},stop", self.target),
            CommandAction::Start => format!("{},start", self.target),
            CommandAction::CourseTrue { degrees } => format!("{},course,{}", self.target, degrees),
            CommandAction::CourseMag { degrees } => format!("{},course_m,{}", self.target, degrees),
            CommandAction::SailArea { percent } => format!("{},sail_area,{}", self.target, percent),
            CommandAction::AddBoat { lat, lon, boat_type, flags } => {
                format!("{},add,{},{},{},{}", self.target, lat, lon, boat_type, flags)
            }
            CommandAction::AddBoatWithGroup { lat, lon, boat_type, flags, group, alt_name } => {
                format!(
                    "{},add_g,{},{},{},{},{},{}",
                    self.target, lat, lon, boat_type, flags, group, alt_name
                )
            }
            CommandAction::RemoveBoat => format!("{},remove", self.target),
        }
    }
}

fn expect_argc(keyword: &'static str, rest: &[&str], want: usize) -> Result<(), CommandParseError> {
    if rest.len() != want {
        return Err(CommandParseError::WrongArgCount(keyword, want, rest.len()));
    }
    Ok(())
}

fn parse_int(rest: &[&str], idx: usize) -> Result<i32, CommandParseError> {
    rest[idx].parse::<i32>().map_err(|_| CommandParseError::MalformedValue(idx))
}

fn parse_int_range(rest: &[&str], idx: usize, lo: i32, hi: i32) -> Result<i32, CommandParseError> {
    let v = parse_int(rest, idx)?;
    if v < lo || v > hi {
        return Err(CommandParseError::OutOfRange(idx));
    }
    Ok(v)
}

fn parse_f64_range(rest: &[&str], idx: usize, lo: f64, hi: f64) -> Result<f64, CommandParseError> {
    let v: f64 = rest[idx].parse().map_err(|_| CommandParseError::MalformedValue(idx))?;
    if !(lo..=hi).contains(&v) {
        return Err(CommandParseError::OutOfRange(idx));
    }
    Ok(v)
}

// ── Log row schema (§6) ─────────────────────────────────────────────────────

/// One row written to `<boat>.csv` and the `BoatLog` relational table per
/// logged minute. Optional fields are blank in CSV and NULL relationally
/// when the source data was invalid (`EnvUnavailable`, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRow {
    pub unix_time: i64,
    pub boat_name: String,
    pub lat: f64,
    pub lon: f64,
    pub course_deg: f64,
    pub speed_ms: f64,
    pub track_deg: f64,
    pub ground_speed_ms: f64,
    pub wind_dir_deg: f64,
    pub wind_mag_ms: f64,
    pub current_dir_deg: Option<f64>,
    pub current_mag_ms: Option<f64>,
    pub water_temp_c: Option<f64>,
    pub air_temp_c: f64,
    pub dewpoint_c: f64,
    pub pressure_hpa: f64,
    pub cloud_pct: f64,
    pub visibility_m: f64,
    pub precip_rate: f64,
    pub precip_condition: String,
    pub boat_state: BoatRunState,
    pub location_state: LocationState,
    pub salinity: Option<f64>,
    pub sea_ice_pct: Option<f64>,
    pub distance_m: f64,
    pub damage_pct: f64,
    pub gust_ms: f64,
    pub wave_height_m: Option<f64>,
    pub magdec_deg: f64,
    pub invisible: bool,
}

impl LogRow {
    /// Renders the row as one CSV line per §6's column list; blank fields
    /// for missing optional data.
    pub fn to_csv_line(&self) -> String {
        fn opt(v: Option<f64>, prec: usize) -> String {
            v.map(|x| format!("{:.*}", prec, x)).unwrap_or_default()
        }
        format!(
            "{},{:.6},{:.6},{:.1},{:.3},{:.1},{:.3},{:.1},{:.3},{},{},{},{:.1},{:.1},{:.1},{:.0},{:.0},{:.2},{},{:?},{:?},{},{},{:.1},{:.3},{:.3},{},{:.3},{}",
            self.unix_time,
            self.lat,
            self.lon,
            self.course_deg,
            self.speed_ms,
            self.track_deg,
            self.ground_speed_ms,
            self.wind_dir_deg,
            self.wind_mag_ms,
            opt(self.current_dir_deg, 1),
            opt(self.current_mag_ms, 3),
            opt(self.water_temp_c, 1),
            self.air_temp_c,
            self.dewpoint_c,
            self.pressure_hpa,
            self.cloud_pct,
            self.visibility_m,
            self.precip_rate,
            self.precip_condition,
            self.boat_state,
            self.location_state,
            opt(self.salinity, 3),
            opt(self.sea_ice_pct, 0),
            self.distance_m,
            self.damage_pct,
            self.gust_ms,
            opt(self.wave_height_m, 2),
            self.magdec_deg,
            self.invisible as u8,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoatRunState {
    Sailing,
    Stopped,
    SailsDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationState {
    Water,
    Land,
}

/// One row written to `<boat>-cs.csv` and the `CelestialSight` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelestialSightRow {
    pub unix_time: i64,
    pub boat_name: String,
    pub object: CelestialObject,
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CelestialObject {
    Sun,
    Star(u16),
}

// ── Advanced-hull FFI contract (§9) ─────────────────────────────────────────

/// Input to `sailnavsim_advancedboats_boat_update_v`. Wind angle and speed
/// relative to the vessel's heading, plus current ahead/abeam speed and
/// sail area fraction.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdvancedHullInput {
    pub wind_angle_rad: f32,
    pub wind_speed_ms: f32,
    pub ahead_speed_ms: f32,
    pub abeam_speed_ms: f32,
    pub sail_area_frac: f32,
}

/// Output of `sailnavsim_advancedboats_boat_update_v`: the new ahead/abeam
/// speed and heel angle for the next tick.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdvancedHullOutput {
    pub ahead_speed_ms: f32,
    pub abeam_speed_ms: f32,
    pub heel_deg: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_stop() {
        let cmd = Command::parse("Boat0,stop").unwrap();
        assert_eq!(cmd.target, "Boat0");
        assert_eq!(cmd.action, CommandAction::Stop);
    }

    #[test]
    fn round_trips_course() {
        let line = "Boat1,course,90";
        let cmd = Command::parse(line).unwrap();
        assert_eq!(cmd.to_line(), line);
    }

    #[test]
    fn round_trips_add_g() {
        let line = "Boat2,add_g,12.5,-70.25,0,3,fleetA,Alt";
        let cmd = Command::parse(line).unwrap();
        assert_eq!(cmd.to_line(), line);
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert_eq!(
            Command::parse("Boat0,frobnicate").unwrap_err(),
            CommandParseError::UnknownAction("frobnicate".to_string())
        );
    }

    #[test]
    fn rejects_out_of_range_course() {
        assert!(matches!(
            Command::parse("Boat0,course,720"),
            Err(CommandParseError::OutOfRange(0))
        ));
    }

    #[test]
    fn rejects_wrong_arg_count() {
        assert!(matches!(
            Command::parse("Boat0,course,10,20"),
            Err(CommandParseError::WrongArgCount("course", 1, 2))
        ));
    }

    #[test]
    fn flags_reject_out_of_range() {
        assert!(BoatFlags::from_raw(0x40).is_none());
        assert!(BoatFlags::from_raw(0x3f).is_some());
    }
}
