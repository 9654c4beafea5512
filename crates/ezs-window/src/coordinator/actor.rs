//! Coordinator actor - owns the window registry and every native window call.
//!
//! The actor runs inside the main process. Other windows never mutate the
//! registry; they send commands (create requests, announcements, close
//! requests) that the actor processes one at a time.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Native host failures during a close are logged and skipped
//! - Reply send failures are ignored (the requester may have gone away)

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use ezs_core::{WindowLabel, WindowTarget};
use ezs_protocol::WindowMessage;

use super::commands::{CoordinatorCommand, CreatedWindow, WindowEvent};
use crate::error::WindowError;
use crate::host::{WindowHandle, WindowHost, WindowOptions, WindowOverrides};
use crate::registry::WindowRegistry;

// ============================================================================
// Coordinator Actor
// ============================================================================

/// The coordinator actor.
///
/// # Ownership
///
/// - `registry`: announced windows and their parent/child edges
/// - `pending`: windows created natively but not yet announced. A create
///   request for a pending label focuses it instead of opening a second one.
pub struct CoordinatorActor {
    receiver: mpsc::Receiver<CoordinatorCommand>,
    host: Arc<dyn WindowHost>,
    registry: WindowRegistry,
    pending: HashMap<WindowLabel, WindowHandle>,
    event_publisher: broadcast::Sender<WindowEvent>,
}

impl CoordinatorActor {
    pub fn new(
        receiver: mpsc::Receiver<CoordinatorCommand>,
        host: Arc<dyn WindowHost>,
        event_publisher: broadcast::Sender<WindowEvent>,
    ) -> Self {
        let registry = WindowRegistry::new(host.main_window());
        Self {
            receiver,
            host,
            registry,
            pending: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) {
        info!("Window coordinator starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(
            "Window coordinator stopped (windows: {})",
            self.registry.len()
        );
    }

    async fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::CreateWindow {
                caller,
                target,
                overrides,
                respond_to,
            } => {
                let result = self.handle_create(&caller, &target, &overrides).await;
                let _ = respond_to.send(result);
            }
            CoordinatorCommand::HasWindow {
                caller,
                target,
                respond_to,
            } => {
                let (label, _) = target.resolve(&caller);
                let _ = respond_to.send(self.lookup(&label).is_some());
            }
            CoordinatorCommand::Message(WindowMessage::Created {
                label,
                parent_label,
            }) => {
                self.handle_announce(label, parent_label).await;
            }
            CoordinatorCommand::Message(WindowMessage::CloseRequested { label }) => {
                self.handle_close(&label).await;
            }
            CoordinatorCommand::GetDescriptor { label, respond_to } => {
                let _ = respond_to.send(self.registry.get(&label).cloned());
            }
            CoordinatorCommand::ListWindows { respond_to } => {
                let _ = respond_to.send(self.registry.labels());
            }
        }
    }

    /// Tracked or pending handle for `label`.
    fn lookup(&self, label: &WindowLabel) -> Option<WindowHandle> {
        self.registry
            .get(label)
            .map(|d| d.handle.clone())
            .or_else(|| self.pending.get(label).cloned())
    }

    async fn handle_create(
        &mut self,
        caller: &WindowLabel,
        target: &WindowTarget,
        overrides: &WindowOverrides,
    ) -> Result<CreatedWindow, WindowError> {
        let (label, url) = target.resolve(caller);

        if let Some(descriptor) = self.registry.get(&label) {
            let handle = descriptor.handle.clone();
            if let Err(e) = self.host.focus(&handle).await {
                debug!(label = %label, error = %e, "focus of existing window failed");
            }
            debug!(label = %label, "window already open, reusing");
            return Ok(CreatedWindow {
                handle,
                label,
                url,
                is_new: false,
            });
        }

        // A pending window that cannot be focused never finished starting up.
        if let Some(handle) = self.pending.get(&label).cloned() {
            match self.host.focus(&handle).await {
                Ok(()) => {
                    debug!(label = %label, "window still starting, reusing");
                    return Ok(CreatedWindow {
                        handle,
                        label,
                        url,
                        is_new: false,
                    });
                }
                Err(e) => {
                    warn!(label = %label, error = %e, "pending window is gone, opening a new one");
                    self.pending.remove(&label);
                }
            }
        }

        let options = WindowOptions::default().merged(overrides);
        let handle = self.host.create(&label, &url, &options).await?;
        self.pending.insert(label.clone(), handle.clone());
        info!(label = %label, caller = %caller, "window created");

        Ok(CreatedWindow {
            handle,
            label,
            url,
            is_new: true,
        })
    }

    /// A window announced itself; resolve its handle and record the edges.
    async fn handle_announce(&mut self, label: WindowLabel, parent: Option<WindowLabel>) {
        let handle = match self.registry.get(&label) {
            Some(descriptor) => Some(descriptor.handle.clone()),
            None => match self.pending.remove(&label) {
                Some(handle) => Some(handle),
                // Announcement raced ahead of local bookkeeping.
                None => self
                    .host
                    .list_windows()
                    .await
                    .into_iter()
                    .find(|h| h.label == label),
            },
        };
        self.pending.remove(&label);

        let Some(handle) = handle else {
            debug!(label = %label, "announced window has no native handle, ignoring");
            return;
        };

        let parent = match parent {
            Some(p) if self.registry.add_child(&p, handle.clone()) => Some(p),
            Some(p) => {
                debug!(label = %label, parent = %p, "parent unknown, tracking window without parent");
                None
            }
            None => None,
        };

        if self.registry.upsert(handle, parent.clone()) {
            info!(label = %label, "window registered");
            let _ = self
                .event_publisher
                .send(WindowEvent::Created { label, parent });
        }
    }

    /// Closes `label` and all of its descendants, children first.
    async fn handle_close(&mut self, label: &WindowLabel) {
        let order = self.registry.close_order(label);
        if order.is_empty() {
            debug!(label = %label, "close requested for unknown window");
            return;
        }

        for handle in order {
            if let Err(e) = self.host.close(&handle).await {
                warn!(label = %handle.label, error = %e, "native close failed");
            }
            self.registry.remove(&handle.label);
            self.pending.remove(&handle.label);
            debug!(label = %handle.label, "window closed");
            let _ = self.event_publisher.send(WindowEvent::Closed { handle });
        }
        info!(label = %label, "close request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use tokio::sync::oneshot;

    fn actor() -> (CoordinatorActor, Arc<HeadlessHost>, broadcast::Receiver<WindowEvent>) {
        let (_tx, rx) = mpsc::channel(8);
        let (event_tx, event_rx) = broadcast::channel(16);
        let host = Arc::new(HeadlessHost::new());
        let actor = CoordinatorActor::new(rx, host.clone(), event_tx);
        (actor, host, event_rx)
    }

    #[tokio::test]
    async fn test_create_twice_reuses_pending_window() {
        let (mut actor, host, _events) = actor();
        let target = WindowTarget::new("/settings");
        let main = WindowLabel::main();

        let first = actor
            .handle_create(&main, &target, &WindowOverrides::default())
            .await
            .unwrap();
        let second = actor
            .handle_create(&main, &target, &WindowOverrides::default())
            .await
            .unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.handle, second.handle);
        assert_eq!(host.created_count().await, 1);
        assert_eq!(host.focused_labels().await, vec![first.label]);
    }

    #[tokio::test]
    async fn test_dead_pending_window_is_replaced() {
        let (mut actor, host, _events) = actor();
        let target = WindowTarget::new("/settings");
        let main = WindowLabel::main();

        let first = actor
            .handle_create(&main, &target, &WindowOverrides::default())
            .await
            .unwrap();
        // Gone before it ever announced itself.
        host.close(&first.handle).await.unwrap();

        let second = actor
            .handle_create(&main, &target, &WindowOverrides::default())
            .await
            .unwrap();

        assert!(second.is_new);
        assert_ne!(first.handle.id, second.handle.id);
        assert_eq!(host.created_count().await, 2);
        assert_eq!(actor.pending.get(&second.label), Some(&second.handle));
    }

    #[tokio::test]
    async fn test_close_event_names_the_closed_instance() {
        let (mut actor, _host, mut events) = actor();
        let main = WindowLabel::main();
        let created = actor
            .handle_create(&main, &WindowTarget::new("/settings"), &WindowOverrides::default())
            .await
            .unwrap();
        actor
            .handle_announce(created.label.clone(), Some(main))
            .await;
        let _ = events.recv().await.unwrap();

        actor.handle_close(&created.label).await;

        assert_eq!(
            events.recv().await.unwrap(),
            WindowEvent::Closed {
                handle: created.handle
            }
        );
    }

    #[tokio::test]
    async fn test_announce_without_handle_is_ignored() {
        let (mut actor, _host, _events) = actor();
        actor
            .handle_announce(WindowLabel::new("child_-ghost"), Some(WindowLabel::main()))
            .await;
        assert_eq!(actor.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_announce_falls_back_to_host_enumeration() {
        let (mut actor, host, mut events) = actor();
        let label = WindowLabel::new("child_-external");
        host.create(&label, "/external?", &WindowOptions::default())
            .await
            .unwrap();

        actor
            .handle_announce(label.clone(), Some(WindowLabel::main()))
            .await;

        assert!(actor.registry.contains(&label));
        assert_eq!(
            events.recv().await.unwrap(),
            WindowEvent::Created {
                label,
                parent: Some(WindowLabel::main())
            }
        );
    }

    #[tokio::test]
    async fn test_has_window_command() {
        let (mut actor, _host, _events) = actor();
        let target = WindowTarget::new("/settings");
        let (tx, rx) = oneshot::channel();
        actor
            .handle_command(CoordinatorCommand::HasWindow {
                caller: WindowLabel::main(),
                target: target.clone(),
                respond_to: tx,
            })
            .await;
        assert!(!rx.await.unwrap());

        actor
            .handle_create(&WindowLabel::main(), &target, &WindowOverrides::default())
            .await
            .unwrap();
        let (tx, rx) = oneshot::channel();
        actor
            .handle_command(CoordinatorCommand::HasWindow {
                caller: WindowLabel::main(),
                target,
                respond_to: tx,
            })
            .await;
        assert!(rx.await.unwrap());
    }
}
