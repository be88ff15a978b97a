use super::{parse_timestamp, ArtifactRow, SettingsStore};
use crate::error::PipelineResult;
use rusqlite::{params, OptionalExtension};

impl SettingsStore {
    // ── Scalar settings ───────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> PipelineResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM setting WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO setting (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> PipelineResult<()> {
        self.conn
            .execute("DELETE FROM setting WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Model artifacts ───────────────────────────────────────────

    pub fn save_artifact(&self, artifact: &ArtifactRow) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO model_artifact (kind, name, model_type, size_bytes, uploaded_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(kind) DO UPDATE SET
                name = excluded.name,
                model_type = excluded.model_type,
                size_bytes = excluded.size_bytes,
                uploaded_at = excluded.uploaded_at,
                payload = excluded.payload",
            params![
                artifact.kind,
                artifact.name,
                artifact.model_type,
                artifact.size_bytes as i64,
                artifact.uploaded_at.to_rfc3339(),
                artifact.payload,
            ],
        )?;
        Ok(())
    }

    pub fn load_artifact(&self, kind: &str) -> PipelineResult<Option<ArtifactRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT kind, name, model_type, size_bytes, uploaded_at, payload
                 FROM model_artifact WHERE kind = ?1",
                params![kind],
                |row| {
                    Ok(ArtifactRow {
                        kind: row.get(0)?,
                        name: row.get(1)?,
                        model_type: row.get(2)?,
                        size_bytes: row.get::<_, i64>(3)? as u64,
                        uploaded_at: parse_timestamp(4, row.get(4)?)?,
                        payload: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete_artifact(&self, kind: &str) -> PipelineResult<()> {
        self.conn
            .execute("DELETE FROM model_artifact WHERE kind = ?1", params![kind])?;
        Ok(())
    }
}
