//! SQLite storage layer -- schema, queries, migrations.
//!
//! Raw events are append-only; training and detection logs are write-once
//! audit records, never updated or deleted by the engine.

pub mod schema;

use crate::detect::{Event, Prediction};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::Serialize;
use uuid::Uuid;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Append a raw event and return its row id.
pub fn insert_event(pool: &Pool, event: &Event) -> Result<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO events (ip_address, username, event_type, event_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.ip_address,
            event.username,
            event.event_type,
            event.event_value,
            event.timestamp.to_rfc3339(),
        ],
    )
    .context("Failed to insert event")?;
    Ok(conn.last_insert_rowid())
}

/// Load the full event history in insertion order. The trainer retrains
/// over this whole window each cycle.
pub fn load_all_events(pool: &Pool) -> Result<Vec<Event>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ip_address, username, event_type, event_value, created_at
         FROM events ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Event {
            ip_address: row.get(0)?,
            username: row.get(1)?,
            event_type: row.get(2)?,
            event_value: row.get(3)?,
            timestamp: DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                .unwrap_or_default()
                .with_timezone(&Utc),
        })
    })?;

    let mut events = Vec::new();
    for r in rows {
        events.push(r?);
    }
    Ok(events)
}

/// One completed training run, for traceability.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingLogEntry {
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
    pub details: String,
}

pub fn insert_training_log(
    pool: &Pool,
    trained_at: DateTime<Utc>,
    record_count: usize,
    details: &str,
) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO model_training_logs (record_count, details, created_at)
         VALUES (?1, ?2, ?3)",
        params![record_count as i64, details, trained_at.to_rfc3339()],
    )
    .context("Failed to insert training log")?;
    Ok(())
}

pub fn list_training_logs(pool: &Pool, limit: usize) -> Result<Vec<TrainingLogEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT created_at, record_count, details FROM model_training_logs
         ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        Ok(TrainingLogEntry {
            timestamp: DateTime::parse_from_rfc3339(&row.get::<_, String>(0)?)
                .unwrap_or_default()
                .with_timezone(&Utc),
            record_count: row.get::<_, i64>(1)? as usize,
            details: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        })
    })?;

    let mut logs = Vec::new();
    for r in rows {
        logs.push(r?);
    }
    Ok(logs)
}

/// One scored event, for traceability.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub username: String,
    pub event_type: String,
    pub event_value: f64,
    pub anomaly_score: f64,
    pub prediction: Prediction,
    pub raw_event: serde_json::Value,
}

pub fn insert_detection_log(pool: &Pool, entry: &DetectionLogEntry) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO anomaly_detection_logs
         (id, ip_address, username, event_type, event_value, anomaly_score, prediction, raw_event, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id.to_string(),
            entry.ip_address,
            entry.username,
            entry.event_type,
            entry.event_value,
            entry.anomaly_score,
            entry.prediction.to_string(),
            serde_json::to_string(&entry.raw_event)?,
            entry.timestamp.to_rfc3339(),
        ],
    )
    .context("Failed to insert detection log")?;
    Ok(())
}

pub fn list_detection_logs(pool: &Pool, limit: usize) -> Result<Vec<DetectionLogEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, ip_address, username, event_type, event_value, anomaly_score, prediction, raw_event, created_at
         FROM anomaly_detection_logs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        let id_str: String = row.get(0)?;
        let prediction_str: String = row.get(6)?;
        let raw_str: String = row.get(7)?;
        Ok(DetectionLogEntry {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            ip_address: row.get(1)?,
            username: row.get(2)?,
            event_type: row.get(3)?,
            event_value: row.get(4)?,
            anomaly_score: row.get(5)?,
            prediction: prediction_str.parse().unwrap_or(Prediction::Normal),
            raw_event: serde_json::from_str(&raw_str).unwrap_or_default(),
            timestamp: DateTime::parse_from_rfc3339(&row.get::<_, String>(8)?)
                .unwrap_or_default()
                .with_timezone(&Utc),
        })
    })?;

    let mut logs = Vec::new();
    for r in rows {
        logs.push(r?);
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn sample_event(value: f64) -> Event {
        Event {
            ip_address: "192.168.1.100".to_string(),
            username: "jdoe".to_string(),
            event_type: "login_attempt".to_string(),
            event_value: value,
            timestamp: Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_load_events() {
        let (_dir, pool) = test_pool();
        let id1 = insert_event(&pool, &sample_event(1.0)).unwrap();
        let id2 = insert_event(&pool, &sample_event(2.0)).unwrap();
        assert!(id2 > id1);

        let events = load_all_events(&pool).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_value, 1.0);
        assert_eq!(events[1].event_value, 2.0);
        assert_eq!(events[0].timestamp, sample_event(1.0).timestamp);
    }

    #[test]
    fn test_training_logs_most_recent_first() {
        let (_dir, pool) = test_pool();
        let base = Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap();
        insert_training_log(&pool, base, 100, "first").unwrap();
        insert_training_log(&pool, base + chrono::Duration::seconds(60), 150, "second").unwrap();

        let logs = list_training_logs(&pool, 20).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].details, "second");
        assert_eq!(logs[0].record_count, 150);
        assert_eq!(logs[1].details, "first");
    }

    #[test]
    fn test_detection_log_roundtrip_with_limit() {
        let (_dir, pool) = test_pool();
        for i in 0..5 {
            let entry = DetectionLogEntry {
                id: Uuid::new_v4(),
                timestamp: Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, i).unwrap(),
                ip_address: "10.0.0.1".to_string(),
                username: "mallory".to_string(),
                event_type: "login_attempt".to_string(),
                event_value: 5.0,
                anomaly_score: -0.12,
                prediction: Prediction::Anomaly,
                raw_event: serde_json::json!({"ip_address": "10.0.0.1"}),
            };
            insert_detection_log(&pool, &entry).unwrap();
        }

        let logs = list_detection_logs(&pool, 3).unwrap();
        assert_eq!(logs.len(), 3);
        // Most recent first
        assert_eq!(logs[0].timestamp.timestamp() % 60, 4);
        assert_eq!(logs[0].prediction, Prediction::Anomaly);
        assert_eq!(logs[0].raw_event["ip_address"], "10.0.0.1");
    }
}
