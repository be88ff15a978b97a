use super::{parse_timestamp, RunRow, SettingsStore};
use crate::error::PipelineResult;
use rusqlite::params;

impl SettingsStore {
    // ── Analysis history ──────────────────────────────────────────

    pub fn insert_run(&self, run: &RunRow) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO analysis_run
                (run_id, file_name, source, total_records, anomalies_detected,
                 anomaly_rate, threshold, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.run_id,
                run.file_name,
                run.source,
                run.total_records as i64,
                run.anomalies_detected as i64,
                run.anomaly_rate,
                run.threshold,
                run.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> PipelineResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM analysis_run", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> PipelineResult<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, file_name, source, total_records, anomalies_detected,
                    anomaly_rate, threshold, created_at
             FROM analysis_run
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                file_name: row.get(1)?,
                source: row.get(2)?,
                total_records: row.get::<_, i64>(3)? as u64,
                anomalies_detected: row.get::<_, i64>(4)? as u64,
                anomaly_rate: row.get(5)?,
                threshold: row.get(6)?,
                created_at: parse_timestamp(7, row.get(7)?)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
