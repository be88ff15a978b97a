//! Scoring and remote-service configuration.
//!
//! Configuration is an explicit object handed to a strategy at
//! construction. Lifecycle: `default()` → `load(&store)` → mutate →
//! `save(&store)`. Absent persisted values fall back to defaults.

use crate::{
    detector::DetectionMode,
    error::PipelineResult,
    store::{ArtifactRow, SettingsStore},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 75.0;
pub const DEFAULT_ENDPOINT: &str = "https://fraud-api-6kib.onrender.com/predict";

const THRESHOLD_KEY: &str = "risk-threshold";
const MODEL_KIND: &str = "model";
const SCALER_KIND: &str = "scaler";

// ── Model artifacts ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    pub model_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl ModelArtifact {
    pub fn new(name: impl Into<String>, model_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            model_type: model_type.into(),
            size_bytes: payload.len() as u64,
            uploaded_at: Utc::now(),
            payload,
        }
    }

    /// Human-readable size, e.g. `"1.25 MB"`.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / 1024.0 / 1024.0)
    }

    fn into_row(self, kind: &str) -> ArtifactRow {
        ArtifactRow {
            kind: kind.to_string(),
            name: self.name,
            model_type: self.model_type,
            size_bytes: self.size_bytes,
            uploaded_at: self.uploaded_at,
            payload: self.payload,
        }
    }

    fn from_row(row: ArtifactRow) -> Self {
        Self {
            name: row.name,
            model_type: row.model_type,
            size_bytes: row.size_bytes,
            uploaded_at: row.uploaded_at,
            payload: row.payload,
        }
    }
}

// ── Scoring configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    threshold: f64,
    pub model: Option<ModelArtifact>,
    pub scaler: Option<ModelArtifact>,
    pub detection: DetectionMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            model: None,
            scaler: None,
            detection: DetectionMode::Independent,
        }
    }
}

impl ScoringConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.set_threshold(threshold);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Thresholds outside the 0–100 slider range are clamped.
    pub fn set_threshold(&mut self, threshold: f64) {
        let clamped = if threshold.is_nan() {
            DEFAULT_THRESHOLD
        } else {
            threshold.clamp(0.0, 100.0)
        };
        if clamped != threshold {
            log::warn!("config: threshold {threshold} out of range, using {clamped}");
        }
        self.threshold = clamped;
    }

    /// Both a model and a scaler have been registered.
    pub fn has_model(&self) -> bool {
        self.model.is_some() && self.scaler.is_some()
    }

    /// Read persisted values; anything absent keeps its default.
    pub fn load(store: &SettingsStore) -> PipelineResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = store.get_setting(THRESHOLD_KEY)? {
            match raw.parse::<f64>() {
                Ok(t) => config.set_threshold(t),
                Err(_) => log::warn!("config: ignoring unparsable stored threshold {raw:?}"),
            }
        }
        config.model = store.load_artifact(MODEL_KIND)?.map(ModelArtifact::from_row);
        config.scaler = store.load_artifact(SCALER_KIND)?.map(ModelArtifact::from_row);
        log::debug!(
            "config: loaded threshold={} model={} scaler={}",
            config.threshold,
            config.model.is_some(),
            config.scaler.is_some()
        );
        Ok(config)
    }

    pub fn save(&self, store: &SettingsStore) -> PipelineResult<()> {
        store.put_setting(THRESHOLD_KEY, &self.threshold.to_string())?;
        for (kind, artifact) in [(MODEL_KIND, &self.model), (SCALER_KIND, &self.scaler)] {
            match artifact {
                Some(a) => store.save_artifact(&a.clone().into_row(kind))?,
                None => store.delete_artifact(kind)?,
            }
        }
        Ok(())
    }

    /// Remove every persisted value.
    pub fn clear(store: &SettingsStore) -> PipelineResult<()> {
        store.delete_setting(THRESHOLD_KEY)?;
        store.delete_artifact(MODEL_KIND)?;
        store.delete_artifact(SCALER_KIND)?;
        Ok(())
    }
}

// ── Remote service ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub endpoint: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

// ── Settings file ────────────────────────────────────────────────────────────

/// Optional JSON settings file for the runner:
/// `{ "threshold": 70, "endpoint": "...", "seed": 42, "detection": "exclusive" }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub detection: Option<DetectionMode>,
}

impl PipelineSettings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let settings: PipelineSettings = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(settings)
    }

    /// Overlay these settings onto a scoring config.
    pub fn apply_scoring(&self, config: &mut ScoringConfig) {
        if let Some(t) = self.threshold {
            config.set_threshold(t);
        }
        if let Some(mode) = self.detection {
            config.detection = mode;
        }
    }

    pub fn remote(&self) -> RemoteConfig {
        self.endpoint
            .clone()
            .map(|endpoint| RemoteConfig { endpoint })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_clamped_to_slider_range() {
        assert_eq!(ScoringConfig::default().with_threshold(140.0).threshold(), 100.0);
        assert_eq!(ScoringConfig::default().with_threshold(-5.0).threshold(), 0.0);
        assert_eq!(ScoringConfig::default().with_threshold(f64::NAN).threshold(), 75.0);
    }

    #[test]
    fn settings_overlay_only_present_fields() {
        let settings: PipelineSettings = serde_json::from_str(r#"{"threshold": 60}"#).unwrap();
        let mut config = ScoringConfig::default();
        settings.apply_scoring(&mut config);
        assert_eq!(config.threshold(), 60.0);
        assert_eq!(config.detection, DetectionMode::Independent);
        assert_eq!(settings.remote().endpoint, DEFAULT_ENDPOINT);
    }
}
