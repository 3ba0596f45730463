use std::path::Path;

use rusqlite::{Connection, params};
use serde::Serialize;
use uuid::Uuid;

use seqlab_core::{EpochSummary, Experiment, SessionReport};

use crate::error::{Result, StoreError};
use crate::schema;

/// One finished run as recorded in history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub label: String,
    pub started_at: String,
    pub dataset: String,
    pub backend: String,
    pub program: String,
    pub feature_width: usize,
    pub epochs: usize,
    pub train_split: String,
    pub eval_split: Option<String>,
    pub error_count: Option<u64>,
    pub total_count: Option<u64>,
    /// `None` when no evaluation ran or it compared nothing.
    pub error_percent: Option<f64>,
}

/// SQLite-backed history of experiment runs.
pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Save ---

    /// Record a completed session. Returns the new run id.
    pub fn record_run(&self, experiment: &Experiment, report: &SessionReport) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let tx = self.conn.unchecked_transaction()?;

        let eval = report.evaluation.as_ref();
        tx.execute(
            "INSERT INTO runs (id, label, dataset, backend, program, feature_width, epochs,
                               train_split, eval_split, error_count, total_count, error_percent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id.to_string(),
                experiment.label.as_deref().unwrap_or(""),
                experiment.dataset.display().to_string(),
                experiment.backend.to_string(),
                experiment.program,
                experiment.harness.feature_width as i64,
                report.epochs.len() as i64,
                report.train_split,
                eval.map(|e| e.split.as_str()),
                eval.map(|e| e.accumulator.errors as i64),
                eval.map(|e| e.accumulator.total as i64),
                eval.and_then(|e| e.error_percent()),
            ],
        )?;

        for epoch in &report.epochs {
            tx.execute(
                "INSERT INTO epochs (run_id, epoch, sequences, timesteps) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    epoch.epoch as i64,
                    epoch.sequences as i64,
                    epoch.timesteps as i64,
                ],
            )?;
        }

        tx.commit()?;
        tracing::info!("recorded run {id} ({} epochs)", report.epochs.len());
        Ok(id)
    }

    // --- Load ---

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, started_at, dataset, backend, program, feature_width, epochs,
                    train_split, eval_split, error_count, total_count, error_percent
             FROM runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    RunRecord {
                        id: Uuid::nil(),
                        label: row.get(1)?,
                        started_at: row.get(2)?,
                        dataset: row.get(3)?,
                        backend: row.get(4)?,
                        program: row.get(5)?,
                        feature_width: row.get::<_, i64>(6)? as usize,
                        epochs: row.get::<_, i64>(7)? as usize,
                        train_split: row.get(8)?,
                        eval_split: row.get(9)?,
                        error_count: row.get::<_, Option<i64>>(10)?.map(|n| n as u64),
                        total_count: row.get::<_, Option<i64>>(11)?.map(|n| n as u64),
                        error_percent: row.get(12)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id_str, mut record)| {
                record.id = parse_uuid(&id_str)?;
                Ok(record)
            })
            .collect()
    }

    pub fn epochs(&self, run_id: Uuid) -> Result<Vec<EpochSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT epoch, sequences, timesteps FROM epochs WHERE run_id = ?1 ORDER BY epoch",
        )?;
        let epochs = stmt
            .query_map([run_id.to_string()], |row| {
                Ok(EpochSummary {
                    epoch: row.get::<_, i64>(0)? as usize,
                    sequences: row.get::<_, i64>(1)? as usize,
                    timesteps: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(epochs)
    }

    pub fn run_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
