//! Native window host seam.
//!
//! The coordinator never touches a windowing toolkit directly; it talks to a
//! [`WindowHost`]. [`HeadlessHost`] is an in-memory host used by tests and by
//! the headless `replay` command.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use ezs_core::WindowLabel;

use crate::error::WindowError;

// ============================================================================
// Handles
// ============================================================================

/// Host-assigned identity of a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeWindowId(u64);

impl NativeWindowId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeWindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live native window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowHandle {
    pub id: NativeWindowId,
    pub label: WindowLabel,
}

impl WindowHandle {
    pub fn new(id: NativeWindowId, label: WindowLabel) -> Self {
        Self { id, label }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Native window options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowOptions {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub decorations: bool,
    pub maximizable: bool,
    pub minimizable: bool,
    pub closable: bool,
    pub skip_taskbar: bool,
    pub center: bool,
    pub focus: bool,
    pub shadow: bool,
    pub visible: bool,
}

impl Default for WindowOptions {
    /// Undecorated, not closable through native chrome, centered, focused.
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 800.0,
            height: 600.0,
            decorations: false,
            maximizable: false,
            minimizable: false,
            closable: false,
            skip_taskbar: false,
            center: true,
            focus: true,
            shadow: true,
            visible: true,
        }
    }
}

impl WindowOptions {
    /// Applies caller overrides on top of `self`.
    #[must_use]
    pub fn merged(mut self, overrides: &WindowOverrides) -> Self {
        if let Some(title) = &overrides.title {
            self.title.clone_from(title);
        }
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = overrides.$field { self.$field = v; })*
            };
        }
        take!(
            width,
            height,
            decorations,
            maximizable,
            minimizable,
            closable,
            skip_taskbar,
            center,
            focus,
            shadow,
            visible
        );
        self
    }
}

/// Caller-supplied options; unset fields keep the safe defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowOverrides {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub decorations: Option<bool>,
    #[serde(default)]
    pub maximizable: Option<bool>,
    #[serde(default)]
    pub minimizable: Option<bool>,
    #[serde(default)]
    pub closable: Option<bool>,
    #[serde(default)]
    pub skip_taskbar: Option<bool>,
    #[serde(default)]
    pub center: Option<bool>,
    #[serde(default)]
    pub focus: Option<bool>,
    #[serde(default)]
    pub shadow: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
}

impl WindowOverrides {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

// ============================================================================
// Host trait
// ============================================================================

/// Native windowing operations.
#[async_trait]
pub trait WindowHost: Send + Sync {
    /// Opens a new native window.
    async fn create(
        &self,
        label: &WindowLabel,
        url: &str,
        options: &WindowOptions,
    ) -> Result<WindowHandle, WindowError>;

    async fn close(&self, handle: &WindowHandle) -> Result<(), WindowError>;

    async fn focus(&self, handle: &WindowHandle) -> Result<(), WindowError>;

    /// Every native window currently alive, tracked or not.
    async fn list_windows(&self) -> Vec<WindowHandle>;

    /// Handle of the main window, which exists before the coordinator starts.
    fn main_window(&self) -> WindowHandle;
}

// ============================================================================
// Headless host
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub handle: WindowHandle,
    pub url: String,
    pub options: WindowOptions,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u64,
    windows: BTreeMap<WindowLabel, HeadlessWindow>,
    created: usize,
    closed: Vec<WindowLabel>,
    focused: Vec<WindowLabel>,
}

/// In-memory window host.
///
/// Behaves like a real toolkit: creating a second window with a live label
/// fails, and closing a window that is gone is an error.
#[derive(Debug)]
pub struct HeadlessHost {
    main: WindowHandle,
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            main: WindowHandle::new(NativeWindowId::new(0), WindowLabel::main()),
            state: Mutex::new(HeadlessState {
                next_id: 1,
                ..HeadlessState::default()
            }),
        }
    }

    /// Number of native windows ever created (the main window excluded).
    pub async fn created_count(&self) -> usize {
        self.state.lock().await.created
    }

    /// Labels in the order they were closed.
    pub async fn closed_labels(&self) -> Vec<WindowLabel> {
        self.state.lock().await.closed.clone()
    }

    pub async fn focused_labels(&self) -> Vec<WindowLabel> {
        self.state.lock().await.focused.clone()
    }

    pub async fn window(&self, label: &WindowLabel) -> Option<HeadlessWindow> {
        self.state.lock().await.windows.get(label).cloned()
    }

    pub async fn is_open(&self, label: &WindowLabel) -> bool {
        label.is_main() || self.state.lock().await.windows.contains_key(label)
    }
}

#[async_trait]
impl WindowHost for HeadlessHost {
    async fn create(
        &self,
        label: &WindowLabel,
        url: &str,
        options: &WindowOptions,
    ) -> Result<WindowHandle, WindowError> {
        let mut state = self.state.lock().await;
        if label.is_main() || state.windows.contains_key(label) {
            return Err(WindowError::host(format!("a window labelled {label} already exists")));
        }

        let handle = WindowHandle::new(NativeWindowId::new(state.next_id), label.clone());
        state.next_id += 1;
        state.created += 1;
        state.windows.insert(
            label.clone(),
            HeadlessWindow {
                handle: handle.clone(),
                url: url.to_string(),
                options: options.clone(),
            },
        );
        debug!(label = %label, id = %handle.id, "headless window created");
        Ok(handle)
    }

    async fn close(&self, handle: &WindowHandle) -> Result<(), WindowError> {
        let mut state = self.state.lock().await;
        if handle.label.is_main() {
            state.closed.push(handle.label.clone());
            return Ok(());
        }
        match state.windows.remove(&handle.label) {
            Some(_) => {
                state.closed.push(handle.label.clone());
                Ok(())
            }
            None => Err(WindowError::host(format!("window {} is not open", handle.label))),
        }
    }

    async fn focus(&self, handle: &WindowHandle) -> Result<(), WindowError> {
        let mut state = self.state.lock().await;
        if !handle.label.is_main() && !state.windows.contains_key(&handle.label) {
            return Err(WindowError::host(format!("window {} is not open", handle.label)));
        }
        state.focused.push(handle.label.clone());
        Ok(())
    }

    async fn list_windows(&self) -> Vec<WindowHandle> {
        let state = self.state.lock().await;
        std::iter::once(self.main.clone())
            .chain(state.windows.values().map(|w| w.handle.clone()))
            .collect()
    }

    fn main_window(&self) -> WindowHandle {
        self.main.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_safe() {
        let options = WindowOptions::default();
        assert!(!options.decorations);
        assert!(!options.maximizable);
        assert!(!options.minimizable);
        assert!(!options.closable);
        assert!(options.center && options.focus && options.shadow && options.visible);
    }

    #[test]
    fn test_overrides_only_touch_set_fields() {
        let overrides = WindowOverrides::default().title("Traffic Editor").size(1000.0, 700.0);
        let options = WindowOptions::default().merged(&overrides);
        assert_eq!(options.title, "Traffic Editor");
        assert_eq!(options.width, 1000.0);
        assert_eq!(options.height, 700.0);
        assert!(!options.decorations);

        let options = options.merged(&WindowOverrides {
            decorations: Some(true),
            ..WindowOverrides::default()
        });
        assert!(options.decorations);
        assert_eq!(options.title, "Traffic Editor");
    }

    #[tokio::test]
    async fn test_headless_host_rejects_duplicate_labels() {
        let host = HeadlessHost::new();
        let label = WindowLabel::new("child_-settings");
        let options = WindowOptions::default();

        let handle = host.create(&label, "/settings?", &options).await.unwrap();
        assert_eq!(handle.id, NativeWindowId::new(1));
        assert!(host.create(&label, "/settings?", &options).await.is_err());
        assert_eq!(host.created_count().await, 1);
        assert_eq!(host.list_windows().await.len(), 2);

        host.close(&handle).await.unwrap();
        assert!(host.close(&handle).await.is_err());
        assert_eq!(host.closed_labels().await, vec![label.clone()]);
        assert!(!host.is_open(&label).await);
    }
}
