use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id            TEXT PRIMARY KEY,
            label         TEXT NOT NULL DEFAULT '',
            started_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            dataset       TEXT NOT NULL,
            backend       TEXT NOT NULL,
            program       TEXT NOT NULL,
            feature_width INTEGER NOT NULL,
            epochs        INTEGER NOT NULL,
            train_split   TEXT NOT NULL,
            eval_split    TEXT,
            error_count   INTEGER,
            total_count   INTEGER,
            error_percent REAL
        );

        CREATE TABLE IF NOT EXISTS epochs (
            run_id     TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            epoch      INTEGER NOT NULL,
            sequences  INTEGER NOT NULL,
            timesteps  INTEGER NOT NULL,
            PRIMARY KEY (run_id, epoch)
        );

        CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tracing::debug!("run store schema v{SCHEMA_VERSION} ready");
    Ok(())
}
