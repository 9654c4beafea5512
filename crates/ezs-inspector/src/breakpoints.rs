//! Breakpoint definitions the user maintains.
//!
//! Every change goes to the backend first, then to the `breakpoints`
//! setting, and only then replaces the in-memory copy. A failure at either
//! step leaves the book as it was.

use chrono::Utc;
use tracing::{debug, info};

use ezs_protocol::{Breakpoint, BreakpointConditions, BreakpointsConfig};

use crate::backend::Backend;
use crate::error::InspectorError;
use crate::settings::{keys, SettingsHandle};

#[derive(Debug)]
pub struct BreakpointBook {
    config: BreakpointsConfig,
    settings: SettingsHandle,
    seq: u64,
}

impl BreakpointBook {
    /// Reads the stored definitions; a missing or unreadable setting means
    /// an empty book with the tool enabled.
    pub async fn load(settings: SettingsHandle) -> Self {
        let config = settings
            .get_as::<BreakpointsConfig>(keys::BREAKPOINTS)
            .await
            .unwrap_or_default();
        debug!(
            breakpoints = config.breakpoints.len(),
            tool_enabled = config.tool_enabled,
            "breakpoints loaded"
        );
        Self {
            config,
            settings,
            seq: 0,
        }
    }

    pub fn config(&self) -> &BreakpointsConfig {
        &self.config
    }

    pub fn get(&self, id: &str) -> Option<&Breakpoint> {
        self.config.breakpoints.get(id)
    }

    pub fn len(&self) -> usize {
        self.config.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.breakpoints.is_empty()
    }

    /// Fresh id of the form `breakpoint_<millis>_<seq>`.
    pub fn generate_id(&mut self) -> String {
        loop {
            self.seq += 1;
            let id = format!("breakpoint_{}_{}", Utc::now().timestamp_millis(), self.seq);
            if !self.config.breakpoints.contains_key(&id) {
                return id;
            }
        }
    }

    /// Pushes the breakpoints currently in force to the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn sync(&self, backend: &dyn Backend) -> Result<(), InspectorError> {
        backend.update_breakpoints(self.config.enabled()).await?;
        Ok(())
    }

    /// Adds an enabled breakpoint. Returns its id.
    ///
    /// # Errors
    ///
    /// - `InspectorError::Backend` if the backend rejected the new list
    /// - `InspectorError::Settings` if the definitions could not be saved
    pub async fn add(
        &mut self,
        backend: &dyn Backend,
        conditions: BreakpointConditions,
    ) -> Result<String, InspectorError> {
        let id = self.generate_id();
        let mut next = self.config.clone();
        next.breakpoints.insert(
            id.clone(),
            Breakpoint {
                id: id.clone(),
                enabled: true,
                conditions,
            },
        );
        self.commit(backend, next).await?;
        info!(breakpoint_id = %id, "breakpoint added");
        Ok(id)
    }

    /// Replaces the definition with the same id.
    ///
    /// # Errors
    ///
    /// - `InspectorError::UnknownBreakpoint` if no breakpoint has that id
    /// - `InspectorError::Backend` / `InspectorError::Settings` as for [`add`](Self::add)
    pub async fn update(
        &mut self,
        backend: &dyn Backend,
        breakpoint: Breakpoint,
    ) -> Result<(), InspectorError> {
        if !self.config.breakpoints.contains_key(&breakpoint.id) {
            return Err(InspectorError::UnknownBreakpoint(breakpoint.id));
        }
        let mut next = self.config.clone();
        let id = breakpoint.id.clone();
        next.breakpoints.insert(id.clone(), breakpoint);
        self.commit(backend, next).await?;
        debug!(breakpoint_id = %id, "breakpoint updated");
        Ok(())
    }

    /// # Errors
    ///
    /// - `InspectorError::UnknownBreakpoint` if no breakpoint has that id
    /// - `InspectorError::Backend` / `InspectorError::Settings` as for [`add`](Self::add)
    pub async fn set_enabled(
        &mut self,
        backend: &dyn Backend,
        id: &str,
        enabled: bool,
    ) -> Result<(), InspectorError> {
        let Some(current) = self.config.breakpoints.get(id) else {
            return Err(InspectorError::UnknownBreakpoint(id.to_string()));
        };
        let breakpoint = Breakpoint {
            enabled,
            ..current.clone()
        };
        self.update(backend, breakpoint).await
    }

    /// # Errors
    ///
    /// - `InspectorError::UnknownBreakpoint` if no breakpoint has that id
    /// - `InspectorError::Backend` if the backend refused the removal
    /// - `InspectorError::Settings` if the definitions could not be saved
    pub async fn remove(&mut self, backend: &dyn Backend, id: &str) -> Result<(), InspectorError> {
        if !self.config.breakpoints.contains_key(id) {
            return Err(InspectorError::UnknownBreakpoint(id.to_string()));
        }
        backend.remove_breakpoints(vec![id.to_string()]).await?;

        let mut next = self.config.clone();
        next.breakpoints.remove(id);
        self.persist(next).await?;
        info!(breakpoint_id = %id, "breakpoint removed");
        Ok(())
    }

    /// Turns every breakpoint on or off at once without touching the
    /// individual flags.
    ///
    /// # Errors
    ///
    /// - `InspectorError::Backend` / `InspectorError::Settings` as for [`add`](Self::add)
    pub async fn set_tool_enabled(
        &mut self,
        backend: &dyn Backend,
        enabled: bool,
    ) -> Result<(), InspectorError> {
        let next = BreakpointsConfig {
            tool_enabled: enabled,
            ..self.config.clone()
        };
        self.commit(backend, next).await?;
        info!(tool_enabled = enabled, "breakpoint tool toggled");
        Ok(())
    }

    async fn commit(
        &mut self,
        backend: &dyn Backend,
        next: BreakpointsConfig,
    ) -> Result<(), InspectorError> {
        backend.update_breakpoints(next.enabled()).await?;
        self.persist(next).await
    }

    async fn persist(&mut self, next: BreakpointsConfig) -> Result<(), InspectorError> {
        self.settings.set(keys::BREAKPOINTS, &next).await?;
        self.config = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::settings::{spawn_settings, MemoryBackend};

    async fn book() -> (BreakpointBook, MemoryBackend) {
        let store = MemoryBackend::new();
        let settings = spawn_settings(store.clone()).await.unwrap();
        (BreakpointBook::load(settings).await, store)
    }

    fn login() -> BreakpointConditions {
        BreakpointConditions {
            url: Some("*/login".to_string()),
            req_enable: true,
            ..BreakpointConditions::default()
        }
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let (mut book, _) = book().await;
        let a = book.generate_id();
        let b = book.generate_id();
        assert_ne!(a, b);
        assert!(a.starts_with("breakpoint_"));
        assert!(b.ends_with("_2"));
    }

    #[tokio::test]
    async fn test_add_persists_and_enables() {
        let (mut book, store) = book().await;
        let id = book.add(&OfflineBackend, login()).await.unwrap();

        let bp = book.get(&id).unwrap();
        assert!(bp.enabled);
        assert_eq!(book.config().enabled().len(), 1);

        let stored = store.stored().await;
        let saved: BreakpointsConfig =
            serde_json::from_value(stored.get(keys::BREAKPOINTS).cloned().unwrap()).unwrap();
        assert_eq!(&saved, book.config());
    }

    #[tokio::test]
    async fn test_disable_and_tool_toggle() {
        let (mut book, _) = book().await;
        let a = book.add(&OfflineBackend, login()).await.unwrap();
        book.add(&OfflineBackend, BreakpointConditions::default())
            .await
            .unwrap();

        book.set_enabled(&OfflineBackend, &a, false).await.unwrap();
        assert_eq!(book.config().enabled().len(), 1);

        book.set_tool_enabled(&OfflineBackend, false).await.unwrap();
        assert!(book.config().enabled().is_empty());
        assert_eq!(book.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_rejected() {
        let (mut book, _) = book().await;
        let err = book.remove(&OfflineBackend, "nope").await.unwrap_err();
        assert!(matches!(err, InspectorError::UnknownBreakpoint(_)));
        assert!(book
            .set_enabled(&OfflineBackend, "nope", true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_book_unchanged() {
        let (mut book, store) = book().await;
        let id = book.add(&OfflineBackend, login()).await.unwrap();

        store.fail_saves(true);
        let err = book.remove(&OfflineBackend, &id).await.unwrap_err();
        assert!(matches!(err, InspectorError::Settings(_)));
        assert!(book.get(&id).is_some());
    }
}
