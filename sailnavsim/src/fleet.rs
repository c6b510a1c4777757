//! Bootstrap initial-fleet ingest (C11 ingest step, §4.9, SPEC_FULL §G). The
//! on-disk/relational formats for initial-state are out of scope (§1) —
//! only the contract matters: one record per boat, materializing a vessel
//! plus optional group membership and alt-name, optionally resuming
//! position/heading/speed/state from the most recent log row.

use std::path::Path;

use sailnavsim_types::{BoatFlags, BoatType};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::geo::LatLon;
use crate::vessel::Vessel;

/// One ingested initial-fleet record.
pub struct FleetRecord {
    pub name: String,
    pub group: Option<String>,
    pub alt_name: Option<String>,
    pub vessel: Vessel,
}

/// A source of initial-fleet records, consulted once at bootstrap. The
/// relational sink is "preferred" per §4.9 but its schema is out of scope
/// beyond the name; the CSV fallback is the one concrete implementation.
pub trait InitialFleetSource {
    fn load(&self) -> anyhow::Result<Vec<FleetRecord>>;
}

/// Reads a comma-separated "initial fleet" file, one record per line:
/// `name,lat,lon,boat_type,flags[,group[,alt_name]]`.
pub struct CsvFleetSource {
    pub path: std::path::PathBuf,
}

impl InitialFleetSource for CsvFleetSource {
    fn load(&self) -> anyhow::Result<Vec<FleetRecord>> {
        if !self.path.exists() {
            info!("no initial fleet CSV at {}; starting with an empty fleet", self.path.display());
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_fleet_line(line) {
                Ok(rec) => records.push(rec),
                Err(e) => warn!("initial fleet CSV {}:{}: {e}", self.path.display(), lineno + 1),
            }
        }
        Ok(records)
    }
}

/// Parses one fleet-CSV line, surfacing the §7 `ParseError`/`ValidationError`
/// taxonomy at this boundary (malformed fields vs. out-of-range/unknown
/// values) before `anyhow` takes over for the caller's per-line logging.
fn parse_fleet_line(line: &str) -> Result<FleetRecord, EngineError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 5 {
        return Err(EngineError::Parse(format!("expected at least 5 fields, got {}", fields.len())));
    }
    let name = fields[0].to_string();
    if name.is_empty() {
        return Err(EngineError::Parse("empty boat name".to_string()));
    }
    let lat: f64 = fields[1].parse().map_err(|_| EngineError::Parse(format!("bad latitude {:?}", fields[1])))?;
    let lon: f64 = fields[2].parse().map_err(|_| EngineError::Parse(format!("bad longitude {:?}", fields[2])))?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(EngineError::Validation(format!("latitude {lat} out of range")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(EngineError::Validation(format!("longitude {lon} out of range")));
    }
    let boat_type = fields[3].parse::<i32>().ok().and_then(BoatType::from_i32)
        .ok_or_else(|| EngineError::Validation(format!("invalid boat type {:?}", fields[3])))?;
    let flags = fields[4].parse::<i32>().ok().and_then(BoatFlags::from_raw)
        .ok_or_else(|| EngineError::Validation(format!("invalid flags {:?}", fields[4])))?;
    let group = fields.get(5).filter(|s| !s.is_empty()).map(|s| s.to_string());
    let alt_name = fields.get(6).filter(|s| !s.is_empty()).map(|s| s.to_string());

    let vessel = Vessel::new(LatLon::new(lat, lon), boat_type, flags);
    Ok(FleetRecord { name, group, alt_name, vessel })
}

/// The relational-sink-backed source is out of scope to actually implement
/// beyond its contract (§4.9 says "preferred", no schema for the initial
/// fleet query is specified) — this always reports "no initial fleet",
/// consistent with running standalone without a configured database.
pub struct RelationalFleetSource;

impl InitialFleetSource for RelationalFleetSource {
    fn load(&self) -> anyhow::Result<Vec<FleetRecord>> {
        info!("relational initial-fleet source is a documented stub; reporting an empty fleet");
        Ok(Vec::new())
    }
}

/// Picks the relational source when `database_url` is configured, else the
/// CSV fallback (§4.9: "preferred" relational, "fallback" CSV).
pub fn select_source(database_url: Option<&str>, csv_path: &Path) -> Box<dyn InitialFleetSource> {
    if database_url.is_some() {
        Box::new(RelationalFleetSource)
    } else {
        Box::new(CsvFleetSource { path: csv_path.to_path_buf() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_record() {
        let rec = parse_fleet_line("Boat0,10.0,20.0,0,0").unwrap();
        assert_eq!(rec.name, "Boat0");
        assert!(rec.group.is_none());
        assert!(rec.alt_name.is_none());
    }

    #[test]
    fn parses_record_with_group_and_alt_name() {
        let rec = parse_fleet_line("Boat1,10.0,20.0,1,3,fleetA,Alt").unwrap();
        assert_eq!(rec.group.as_deref(), Some("fleetA"));
        assert_eq!(rec.alt_name.as_deref(), Some("Alt"));
    }

    #[test]
    fn missing_csv_yields_empty_fleet() {
        let source = CsvFleetSource { path: std::path::PathBuf::from("/nonexistent/path/fleet.csv") };
        let records = source.load().unwrap();
        assert!(records.is_empty());
    }
}
