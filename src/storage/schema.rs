//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            ip_address TEXT NOT NULL,
            username TEXT NOT NULL,
            event_type TEXT NOT NULL,
            event_value REAL NOT NULL DEFAULT 0.0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS model_training_logs (
            id INTEGER PRIMARY KEY,
            record_count INTEGER NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS anomaly_detection_logs (
            id TEXT PRIMARY KEY,
            ip_address TEXT NOT NULL,
            username TEXT NOT NULL,
            event_type TEXT NOT NULL,
            event_value REAL NOT NULL,
            anomaly_score REAL NOT NULL,
            prediction TEXT NOT NULL,
            raw_event TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
        CREATE INDEX IF NOT EXISTS idx_training_logs_created ON model_training_logs(created_at);
        CREATE INDEX IF NOT EXISTS idx_detection_logs_created ON anomaly_detection_logs(created_at);",
    )?;

    Ok(())
}
