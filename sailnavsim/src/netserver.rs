//! NetServer (C10, §4.8): a TCP listener plus a bounded accept buffer and a
//! fixed worker pool, each worker owning one connection end-to-end and
//! serving the line-delimited request/response protocol. The accept loop's
//! "never crash on a transient error" idiom is grounded on `uwb_hub.rs`'s
//! `start_uwb_hub` accept/recv loop in the teacher crate.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};

use sailnavsim_types::BoatFlags;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::geo::LatLon;

const ACCEPT_BUFFER_CAPACITY: usize = 256;
const READ_BUFFER_BYTES: usize = 1024;
const INVALID_RESPONSE: &str = "error\n";

struct AcceptBuffer {
    queue: Mutex<VecDeque<TcpStream>>,
    condvar: Condvar,
}

/// Starts the accept thread and the fixed worker pool. Never returns; the
/// process exits with these threads still running (§5).
pub fn spawn(engine: Arc<Engine>, host: &str, port: u16, worker_count: usize) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port))?;
    info!("net server listening on {host}:{port}");

    let buffer = Arc::new(AcceptBuffer {
        queue: Mutex::new(VecDeque::with_capacity(ACCEPT_BUFFER_CAPACITY)),
        condvar: Condvar::new(),
    });

    {
        let buffer = buffer.clone();
        let counters = engine.net_counters.clone();
        std::thread::spawn(move || accept_loop(listener, buffer, counters));
    }

    for worker_id in 0..worker_count.max(1) {
        let buffer = buffer.clone();
        let engine = engine.clone();
        std::thread::spawn(move || worker_loop(worker_id, buffer, engine));
    }

    Ok(())
}

fn accept_loop(listener: TcpListener, buffer: Arc<AcceptBuffer>, counters: Arc<crate::engine::NetCounters>) {
    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                counters.accept.inc();
                let mut q = buffer.queue.lock().unwrap_or_else(|e| e.into_inner());
                if q.len() >= ACCEPT_BUFFER_CAPACITY {
                    // Buffer full: drop the oldest pending connection rather
                    // than block the accept thread (keeps `accept()` hot).
                    q.pop_front();
                }
                q.push_back(stream);
                buffer.condvar.notify_one();
            }
            Err(e) => {
                counters.accept_fail.inc();
                warn!("net server accept error: {e}");
            }
        }
    }
}

fn worker_loop(worker_id: usize, buffer: Arc<AcceptBuffer>, engine: Arc<Engine>) {
    loop {
        let stream = {
            let mut q = buffer.queue.lock().unwrap_or_else(|e| e.into_inner());
            while q.is_empty() {
                q = buffer.condvar.wait(q).unwrap_or_else(|e| e.into_inner());
            }
            q.pop_front().unwrap()
        };
        if let Err(e) = serve_connection(&engine, stream) {
            warn!("net server worker {worker_id}: connection error: {e}");
        }
    }
}

fn serve_connection(engine: &Engine, mut stream: TcpStream) -> std::io::Result<()> {
    let counters = &engine.net_counters;
    let read_stream = stream.try_clone()?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, read_stream);

    loop {
        let mut line = String::new();
        let n = match reader.read_line(&mut line) {
            Ok(n) => n,
            Err(e) => {
                counters.read_fail.inc();
                return Err(e);
            }
        };
        if n == 0 {
            return Ok(()); // peer closed
        }
        counters.read.inc();
        if line.len() > READ_BUFFER_BYTES {
            counters.data_too_long.inc();
            stream.write_all(INVALID_RESPONSE.as_bytes())?;
            return Ok(());
        }

        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }
        counters.message.inc();
        let response = dispatch(engine, trimmed);
        if response.is_none() {
            counters.message_fail.inc();
        }
        let body = response.unwrap_or_else(|| INVALID_RESPONSE.to_string());
        stream.write_all(body.as_bytes())?;
    }
}

/// Looks up the first comma-separated token against the known request
/// keywords (§4.8) and dispatches. `None` means "invalid", which the caller
/// renders as `error\n` and counts as `message_fail` plus `req_invalid`.
fn dispatch(engine: &Engine, line: &str) -> Option<String> {
    let mut parts = line.splitn(2, ',');
    let keyword = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");
    let counters = &engine.net_counters;

    match keyword {
        "bd_nc" => {
            counters.req_bd_nc.inc();
            Some(handle_boat_data(engine, rest, true))
        }
        "wind" => {
            counters.req_wind.inc();
            handle_point_query(engine, rest, QueryKind::Wind, false)
        }
        "wind_c" => {
            counters.req_wind_c.inc();
            handle_point_query(engine, rest, QueryKind::Wind, true)
        }
        "wind_gust" => {
            counters.req_wind_gust.inc();
            handle_point_query(engine, rest, QueryKind::WindGust, false)
        }
        "wind_gust_c" => {
            counters.req_wind_gust_c.inc();
            handle_point_query(engine, rest, QueryKind::WindGust, true)
        }
        "ocean_current" => {
            counters.req_ocean_current.inc();
            handle_point_query(engine, rest, QueryKind::OceanCurrent, false)
        }
        "sea_ice" => {
            counters.req_sea_ice.inc();
            handle_point_query(engine, rest, QueryKind::SeaIce, false)
        }
        "wave_height" => {
            counters.req_wave_height.inc();
            handle_point_query(engine, rest, QueryKind::WaveHeight, false)
        }
        "bd" => {
            counters.req_bd.inc();
            Some(handle_boat_data(engine, rest, false))
        }
        "boatcmd" => {
            counters.req_boatcmd.inc();
            engine.commands.submit_line(rest);
            Some("ok\n".to_string())
        }
        "boatgroupmembers" => {
            counters.req_boatgroupmembers.inc();
            Some(handle_group_members(engine, rest))
        }
        "sys_req_counts" => {
            counters.req_sys_req_counts.inc();
            Some(format!("sys_req_counts,{}\n", counters.to_csv_line()))
        }
        _ => {
            counters.req_invalid.inc();
            None
        }
    }
}

#[derive(Clone, Copy)]
enum QueryKind {
    Wind,
    WindGust,
    OceanCurrent,
    SeaIce,
    WaveHeight,
}

fn handle_point_query(engine: &Engine, rest: &str, kind: QueryKind, adjust_by_current: bool) -> Option<String> {
    let mut parts = rest.split(',');
    let lat: f64 = parts.next()?.parse().ok()?;
    let lon: f64 = parts.next()?.parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    let pos = LatLon::new(lat, lon);
    let now = now_unix();

    let label = match kind {
        QueryKind::Wind => "wind",
        QueryKind::WindGust => "wind_gust",
        QueryKind::OceanCurrent => "ocean_current",
        QueryKind::SeaIce => "sea_ice",
        QueryKind::WaveHeight => "wave_height",
    };

    match kind {
        QueryKind::Wind | QueryKind::WindGust => {
            let mut weather = engine.env.weather(pos, now);
            if adjust_by_current {
                if let Some(ocean) = engine.env.ocean(pos, now) {
                    let wind = crate::vessel::Bearing { angle_deg: weather.wind.angle_deg, mag_ms: weather.wind.mag_ms }
                        .add(crate::vessel::Bearing { angle_deg: ocean.current.angle_deg, mag_ms: ocean.current.mag_ms });
                    let gust = crate::vessel::Bearing { angle_deg: weather.wind_gust.angle_deg, mag_ms: weather.wind_gust.mag_ms }
                        .add(crate::vessel::Bearing { angle_deg: ocean.current.angle_deg, mag_ms: ocean.current.mag_ms });
                    weather.wind.angle_deg = wind.angle_deg;
                    weather.wind.mag_ms = wind.mag_ms;
                    weather.wind_gust.angle_deg = gust.angle_deg;
                    weather.wind_gust.mag_ms = gust.mag_ms;
                }
            }
            let v = if matches!(kind, QueryKind::Wind) { weather.wind } else { weather.wind_gust };
            Some(format!("{label},{lat},{lon},{:.1},{:.3}\n", v.angle_deg, v.mag_ms))
        }
        QueryKind::OceanCurrent => {
            let v = engine.env.ocean(pos, now).map(|o| o.current.mag_ms).unwrap_or(-999.0);
            Some(format!("{label},{lat},{lon},{v}\n"))
        }
        QueryKind::SeaIce => {
            let v = engine.env.sea_ice_pct(pos, now).unwrap_or(-999.0);
            Some(format!("{label},{lat},{lon},{v}\n"))
        }
        QueryKind::WaveHeight => {
            let v = engine.env.wave(pos, now).map(|w| w.height_m).unwrap_or(-999.0);
            Some(format!("{label},{lat},{lon},{v}\n"))
        }
    }
}

fn handle_boat_data(engine: &Engine, rest: &str, mask_celestial_nav: bool) -> String {
    let name = rest.trim();
    let Some(vessel) = engine.registry.get_clone(name) else {
        return format!("bd,{name},noboat\n");
    };
    if mask_celestial_nav && vessel.flags.contains(BoatFlags::CELESTIAL_NAV) {
        return format!("bd,{name},noboat\n");
    }
    format!(
        "bd,{name},ok,{:.6},{:.6},{:.1},{:.3},{:.1},{:.3},{:.3},{:.1}\n",
        vessel.position.lat,
        vessel.position.lon,
        vessel.heading_deg,
        vessel.water_velocity.mag_ms,
        vessel.ground_velocity.angle_deg,
        vessel.ground_velocity.mag_ms,
        vessel.leeway_ms,
        vessel.heel_deg,
    )
}

fn handle_group_members(engine: &Engine, rest: &str) -> String {
    let name_or_group = rest.trim();
    let Some(group) = engine.registry.entry_group(name_or_group) else {
        return "noboat\n".to_string();
    };
    let Some(group) = group else {
        return "nogroup\n".to_string();
    };
    if engine.registry.entry_flags_hidden_in_group(name_or_group) == Some(true) {
        return format!("ok\n{name_or_group},?\n\n");
    }
    let members = engine.registry.group_membership_response(&group);
    let mut out = String::from("ok\n");
    for (name, alt) in members {
        out.push_str(&name);
        out.push(',');
        out.push_str(alt.as_deref().unwrap_or("!"));
        out.push('\n');
    }
    out.push('\n');
    out
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advanced_hull::DefaultAdvancedHullSolver;
    use crate::config::EngineConfig;
    use crate::env::MockEnv;
    use std::sync::Arc;

    fn test_engine() -> Arc<Engine> {
        Engine::new(Arc::new(MockEnv::default()), Arc::new(DefaultAdvancedHullSolver), EngineConfig::default())
    }

    #[test]
    fn bd_reports_noboat_for_unknown_name() {
        let engine = test_engine();
        assert_eq!(handle_boat_data(&engine, "Ghost", false), "bd,Ghost,noboat\n");
    }

    #[test]
    fn unknown_keyword_dispatches_to_none() {
        let engine = test_engine();
        assert!(dispatch(&engine, "frobnicate,1,2").is_none());
        assert_eq!(engine.net_counters.req_invalid.get(), 1);
    }

    #[test]
    fn boatgroupmembers_reports_noboat_and_nogroup() {
        let engine = test_engine();
        assert_eq!(handle_group_members(&engine, "Ghost"), "noboat\n");

        crate::simloop::apply_command(&engine, sailnavsim_types::Command::parse("Solo,add,0.0,0.0,0,0").unwrap());
        assert_eq!(handle_group_members(&engine, "Solo"), "nogroup\n");
    }

    #[test]
    fn sea_ice_query_returns_sentinel_for_invalid_data() {
        struct NoIceEnv(MockEnv);
        impl crate::env::Env for NoIceEnv {
            fn weather(&self, p: LatLon, n: i64) -> crate::env::WeatherReport { self.0.weather(p, n) }
            fn ocean(&self, p: LatLon, n: i64) -> Option<crate::env::OceanData> { self.0.ocean(p, n) }
            fn wave(&self, p: LatLon, n: i64) -> Option<crate::env::WaveData> { self.0.wave(p, n) }
            fn sea_ice_pct(&self, _p: LatLon, _n: i64) -> Option<f64> { None }
            fn is_water(&self, p: LatLon) -> bool { self.0.is_water(p) }
            fn magnetic_declination(&self, p: LatLon, n: i64) -> f64 { self.0.magnetic_declination(p, n) }
            fn sun_position(&self, p: LatLon, n: i64) -> crate::env::CelestialPosition { self.0.sun_position(p, n) }
            fn star_position(&self, id: u16, p: LatLon, n: i64) -> crate::env::CelestialPosition { self.0.star_position(id, p, n) }
        }
        let engine = Engine::new(Arc::new(NoIceEnv(MockEnv::default())), Arc::new(DefaultAdvancedHullSolver), EngineConfig::default());
        let resp = handle_point_query(&engine, "10.0,10.0", QueryKind::SeaIce, false).unwrap();
        assert!(resp.contains("-999"));
    }
}
