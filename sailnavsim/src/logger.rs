//! Logger (C9, §4.7): a single consumer thread draining a mutex+condvar
//! FIFO of `LogBatch`es to append-only per-boat CSV files and a transactional
//! relational sink. The relational sink (`sqlx`/Postgres, matching the
//! teacher's dependency stack) is optional — when no `database_url` is
//! configured the logger writes CSV only, which is the expected steady
//! state for a standalone/local run (§1 treats persistence formats as an
//! external collaborator; CSV is this crate's always-available fallback).

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use sailnavsim_types::{CelestialSightRow, LogRow};
use tracing::{debug, error, warn};

/// One tick-minute's worth of logged rows, handed off by the Sim thread at
/// the end of the log phase (§4.6 step 4).
#[derive(Debug, Clone, Default)]
pub struct LogBatch {
    pub rows: Vec<LogRow>,
    pub sights: Vec<CelestialSightRow>,
}

struct Shared {
    queue: Mutex<VecDeque<LogBatch>>,
    condvar: Condvar,
}

/// Producer handle held by the Sim thread.
pub struct LogQueue {
    shared: Arc<Shared>,
}

impl LogQueue {
    pub fn push(&self, batch: LogBatch) {
        let mut q = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        q.push_back(batch);
        self.shared.condvar.notify_one();
    }
}

/// Spawns the Logger consumer thread and returns the producer handle plus
/// its `JoinHandle` (callers generally do not join it; the process exits
/// with it still running, per §5 "no explicit cancellation protocol").
pub fn spawn(log_dir: PathBuf, database_url: Option<String>) -> (LogQueue, std::thread::JoinHandle<()>) {
    let shared = Arc::new(Shared { queue: Mutex::new(VecDeque::new()), condvar: Condvar::new() });
    let worker_shared = shared.clone();
    let handle = std::thread::spawn(move || consumer_loop(worker_shared, log_dir, database_url));
    (LogQueue { shared }, handle)
}

fn consumer_loop(shared: Arc<Shared>, log_dir: PathBuf, database_url: Option<String>) {
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        error!("logger: could not create log directory {}: {e}", log_dir.display());
    }

    // The relational sink is async-only (`sqlx`); the Logger thread owns a
    // small current-thread runtime and `block_on`s each batch's
    // transactions, bridging the spec's blocking-thread model (§5) onto an
    // async-only dependency (see DESIGN.md).
    let rt = database_url.as_ref().map(|_| {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build logger's current-thread tokio runtime")
    });

    loop {
        let batch = {
            let mut q = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            while q.is_empty() {
                q = shared.condvar.wait(q).unwrap_or_else(|e| e.into_inner());
            }
            // Drain fully before waiting again (§4.7).
            let batches: Vec<LogBatch> = q.drain(..).collect();
            drop(q);
            batches
        };

        for b in batch {
            write_csv(&log_dir, &b);
            if let (Some(rt), Some(url)) = (&rt, &database_url) {
                rt.block_on(write_relational(url, &b));
            }
        }
    }
}

fn write_csv(log_dir: &std::path::Path, batch: &LogBatch) {
    for row in &batch.rows {
        let path = log_dir.join(format!("{}.csv", row.boat_name));
        append_line(&path, &row.to_csv_line());
    }
    for sight in &batch.sights {
        let path = log_dir.join(format!("{}-cs.csv", sight.boat_name));
        let line = format!(
            "{},{:?},{:.3},{:.3}",
            sight.unix_time, sight.object, sight.azimuth_deg, sight.altitude_deg
        );
        append_line(&path, &line);
    }
}

fn append_line(path: &std::path::Path, line: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{line}"));
    if let Err(e) = result {
        warn!("logger: failed to append to {}: {e}", path.display());
    }
}

/// Inserts `batch`'s rows via two transactions (`BoatLog` then
/// `CelestialSight`, §4.7 step 1/2). Transient "busy" errors retry after a
/// 1 s sleep (§7 `BusyRetryable`); any other failure rolls back, logs, and
/// moves on rather than aborting the Logger thread (§7 `BusyFatal`).
async fn write_relational(database_url: &str, batch: &LogBatch) {
    use sqlx::postgres::PgPoolOptions;

    let pool = match PgPoolOptions::new().max_connections(1).connect(database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!("logger: could not connect to relational sink: {e}");
            return;
        }
    };

    loop {
        match insert_boat_log_rows(&pool, &batch.rows).await {
            Ok(()) => break,
            Err(e) if is_busy(&e) => {
                warn!("logger: relational sink busy, retrying in 1s");
                std::thread::sleep(Duration::from_secs(1));
            }
            Err(e) => {
                error!("logger: BoatLog transaction failed, rolling back and skipping batch: {e}");
                break;
            }
        }
    }

    match insert_celestial_sight_rows(&pool, &batch.sights).await {
        Ok(()) => debug!("logger: wrote {} celestial sight rows", batch.sights.len()),
        Err(e) => error!("logger: CelestialSight transaction failed, rolling back and skipping: {e}"),
    }
}

async fn insert_boat_log_rows(pool: &sqlx::PgPool, rows: &[LogRow]) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO \"BoatLog\" (unix_time, boat_name, lat, lon, course_deg, speed_ms, \
             track_deg, ground_speed_ms, wind_dir_deg, wind_mag_ms, current_dir_deg, \
             current_mag_ms, water_temp_c, air_temp_c, dewpoint_c, pressure_hpa, cloud_pct, \
             visibility_m, precip_rate, precip_condition, boat_state, location_state, \
             salinity, sea_ice_pct, distance_m, damage_pct, gust_ms, wave_height_m, \
             magdec_deg, invisible) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20, \
             $21,$22,$23,$24,$25,$26,$27,$28,$29,$30)",
        )
        .bind(row.unix_time)
        .bind(&row.boat_name)
        .bind(row.lat)
        .bind(row.lon)
        .bind(row.course_deg)
        .bind(row.speed_ms)
        .bind(row.track_deg)
        .bind(row.ground_speed_ms)
        .bind(row.wind_dir_deg)
        .bind(row.wind_mag_ms)
        .bind(row.current_dir_deg)
        .bind(row.current_mag_ms)
        .bind(row.water_temp_c)
        .bind(row.air_temp_c)
        .bind(row.dewpoint_c)
        .bind(row.pressure_hpa)
        .bind(row.cloud_pct)
        .bind(row.visibility_m)
        .bind(row.precip_rate)
        .bind(&row.precip_condition)
        .bind(format!("{:?}", row.boat_state))
        .bind(format!("{:?}", row.location_state))
        .bind(row.salinity)
        .bind(row.sea_ice_pct)
        .bind(row.distance_m)
        .bind(row.damage_pct)
        .bind(row.gust_ms)
        .bind(row.wave_height_m)
        .bind(row.magdec_deg)
        .bind(row.invisible)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

async fn insert_celestial_sight_rows(pool: &sqlx::PgPool, sights: &[CelestialSightRow]) -> Result<(), sqlx::Error> {
    if sights.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for sight in sights {
        sqlx::query(
            "INSERT INTO \"CelestialSight\" (unix_time, boat_name, object, azimuth_deg, altitude_deg) \
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(sight.unix_time)
        .bind(&sight.boat_name)
        .bind(format!("{:?}", sight.object))
        .bind(sight.azimuth_deg)
        .bind(sight.altitude_deg)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

fn is_busy(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("55P03") || db.message().contains("busy"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sailnavsim_types::{BoatRunState, LocationState};

    fn sample_row(name: &str) -> LogRow {
        LogRow {
            unix_time: 1_700_000_000,
            boat_name: name.to_string(),
            lat: 10.0,
            lon: 20.0,
            course_deg: 90.0,
            speed_ms: 3.5,
            track_deg: 91.0,
            ground_speed_ms: 3.6,
            wind_dir_deg: 270.0,
            wind_mag_ms: 6.0,
            current_dir_deg: None,
            current_mag_ms: None,
            water_temp_c: None,
            air_temp_c: 18.0,
            dewpoint_c: 14.0,
            pressure_hpa: 1013.0,
            cloud_pct: 30.0,
            visibility_m: 20_000.0,
            precip_rate: 0.0,
            precip_condition: "none".to_string(),
            boat_state: BoatRunState::Sailing,
            location_state: LocationState::Water,
            salinity: None,
            sea_ice_pct: None,
            distance_m: 123.4,
            damage_pct: 0.0,
            gust_ms: 7.0,
            wave_height_m: Some(0.5),
            magdec_deg: 0.0,
            invisible: false,
        }
    }

    #[test]
    fn csv_append_creates_one_line_per_batch() {
        let dir = std::env::temp_dir().join(format!("sailnavsim-logger-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let batch = LogBatch { rows: vec![sample_row("TestBoat0")], sights: vec![] };
        write_csv(&dir, &batch);
        let contents = std::fs::read_to_string(dir.join("TestBoat0.csv")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
