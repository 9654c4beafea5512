//! Durable settings, loaded once and cached by an actor.
//!
//! ```text
//! SettingsHandle ──SettingsCommand──▶ SettingsActor ──save──▶ SettingsBackend
//!  (any task)        (mpsc)           (cache owner)          (JSON file / memory)
//! ```

mod actor;
mod backend;
mod handle;

pub use actor::{SettingsActor, SettingsCommand};
pub use backend::{JsonFileBackend, MemoryBackend, SettingsBackend};
pub use handle::SettingsHandle;

use tokio::sync::mpsc;
use tracing::info;

use crate::error::SettingsError;

/// Setting keys shared by the stores.
pub mod keys {
    pub const CURRENT_SESSION: &str = "currentSession";
    pub const SESSION_LIST: &str = "sessionList";
    pub const CURRENT_LISTEN_SESSION: &str = "currentListenSession";
    pub const BREAKPOINTS: &str = "breakpoints";
    pub const PORT: &str = "port";
}

const COMMAND_BUFFER: usize = 100;

/// Loads every setting from `backend` and spawns the cache actor.
///
/// # Errors
///
/// Returns the load error; callers treat it as fatal.
pub async fn spawn_settings(
    backend: impl SettingsBackend + 'static,
) -> Result<SettingsHandle, SettingsError> {
    let cache = backend.load().await?;
    info!(entries = cache.len(), "settings loaded");

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = SettingsActor::new(rx, Box::new(backend), cache);
    tokio::spawn(actor.run());

    Ok(SettingsHandle::new(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove_clear() {
        let backend = MemoryBackend::new();
        let settings = spawn_settings(backend.clone()).await.unwrap();

        settings.set(keys::PORT, 8081).await.unwrap();
        assert_eq!(settings.get(keys::PORT).await, Some(json!(8081)));
        assert_eq!(settings.get_as::<u16>(keys::PORT).await, Some(8081));
        assert_eq!(backend.stored().await.get(keys::PORT), Some(&json!(8081)));

        settings.remove(keys::PORT).await.unwrap();
        assert!(settings.get(keys::PORT).await.is_none());

        settings.set("a", "x").await.unwrap();
        settings.clear().await.unwrap();
        assert!(settings.snapshot().await.is_empty());
        assert!(backend.stored().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_is_returned_and_cache_unchanged() {
        let backend = MemoryBackend::new();
        let settings = spawn_settings(backend.clone()).await.unwrap();
        settings.set(keys::PORT, 8081).await.unwrap();

        backend.fail_saves(true);
        let err = settings.set(keys::PORT, 9000).await.unwrap_err();
        assert!(matches!(err, SettingsError::Persist(_)));
        assert_eq!(settings.get_as::<u16>(keys::PORT).await, Some(8081));
    }

    #[tokio::test]
    async fn test_detached_writes_keep_order() {
        let backend = MemoryBackend::new();
        let settings = spawn_settings(backend.clone()).await.unwrap();

        for n in 0..10 {
            settings.set_detached(keys::CURRENT_SESSION, n.to_string()).await;
        }
        // Processed after every queued detached write.
        assert_eq!(
            settings.get(keys::CURRENT_SESSION).await,
            Some(json!("9"))
        );
        assert_eq!(
            backend.stored().await.get(keys::CURRENT_SESSION),
            Some(&json!("9"))
        );
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{").unwrap();

        let result = spawn_settings(JsonFileBackend::new(&path)).await;
        assert!(matches!(result, Err(SettingsError::Load { .. })));
    }

    #[tokio::test]
    async fn test_wrong_shape_reads_as_absent() {
        let mut stored = serde_json::Map::new();
        stored.insert(keys::PORT.to_string(), json!("not a port"));
        let settings = spawn_settings(MemoryBackend::with_settings(stored))
            .await
            .unwrap();
        assert!(settings.get_as::<u16>(keys::PORT).await.is_none());
        assert!(settings.get(keys::PORT).await.is_some());
    }
}
