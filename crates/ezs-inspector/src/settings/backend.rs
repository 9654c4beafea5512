//! Durable stores behind the settings cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SettingsError;

/// Whole-document key-value persistence.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    /// Reads every stored setting. An absent store is empty, not an error.
    async fn load(&self) -> Result<Map<String, Value>, SettingsError>;

    /// Replaces the stored settings with `settings`.
    async fn save(&self, settings: &Map<String, Value>) -> Result<(), SettingsError>;
}

// ============================================================================
// JSON file
// ============================================================================

/// Settings stored as one pretty-printed JSON object.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_error(&self, reason: impl ToString) -> SettingsError {
        SettingsError::Load {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SettingsBackend for JsonFileBackend {
    async fn load(&self) -> Result<Map<String, Value>, SettingsError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings file absent, starting empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(self.load_error(e)),
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text).map_err(|e| self.load_error(e))? {
            Value::Object(map) => Ok(map),
            other => Err(self.load_error(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    async fn save(&self, settings: &Map<String, Value>) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(settings)
            .map_err(|e| SettingsError::Persist(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SettingsError::Persist(e.to_string()))?;
        }

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| SettingsError::Persist(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SettingsError::Persist(e.to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Settings kept in memory; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    stored: Arc<Mutex<Map<String, Value>>>,
    fail_saves: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Map<String, Value>) -> Self {
        Self {
            stored: Arc::new(Mutex::new(settings)),
            ..Self::default()
        }
    }

    /// What has been persisted so far.
    pub async fn stored(&self) -> Map<String, Value> {
        self.stored.lock().await.clone()
    }

    /// Makes every following save fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsBackend for MemoryBackend {
    async fn load(&self) -> Result<Map<String, Value>, SettingsError> {
        Ok(self.stored.lock().await.clone())
    }

    async fn save(&self, settings: &Map<String, Value>) -> Result<(), SettingsError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SettingsError::Persist("store is read-only".to_string()));
        }
        *self.stored.lock().await = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested/settings.json"));
        assert!(backend.load().await.unwrap().is_empty());

        let mut settings = Map::new();
        settings.insert("port".to_string(), json!(8081));
        backend.save(&settings).await.unwrap();

        assert_eq!(backend.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_json_file_rejects_malformed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileBackend::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SettingsError::Load { .. }));

        std::fs::write(&path, "[1, 2]").unwrap();
        let err = JsonFileBackend::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("expected a JSON object, found an array"));
    }

    #[tokio::test]
    async fn test_memory_backend_failing_saves() {
        let backend = MemoryBackend::new();
        backend.fail_saves(true);
        assert!(backend.save(&Map::new()).await.is_err());
        backend.fail_saves(false);
        assert!(backend.save(&Map::new()).await.is_ok());
    }
}
