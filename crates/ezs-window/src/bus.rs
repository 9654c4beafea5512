//! Cross-window message bus for pipeline broadcasts.
//!
//! Every envelope names the window that sent it and, optionally, the one
//! it is meant for. Receivers filter on those labels, so the bus itself
//! needs no knowledge of who is listening.
//!
//! Two kinds of inbox exist:
//!
//! - [`MessageBus::listen_to`] shares one bounded broadcast ring. A slow
//!   reader skips what it missed, which only suits full-state messages.
//! - [`MessageBus::listen_from`] gets its own unbounded queue of everything
//!   one window sends, so no acknowledgment is ever dropped.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use ezs_core::WindowLabel;
use ezs_protocol::PipelineMessage;

const BUS_BUFFER: usize = 256;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEnvelope {
    pub source: WindowLabel,
    /// `None` means every window may receive it.
    pub target: Option<WindowLabel>,
    pub message: PipelineMessage,
}

/// Per-source subscriber fed outside the broadcast ring.
#[derive(Debug)]
struct SourceListener {
    source: WindowLabel,
    sender: mpsc::UnboundedSender<BusEnvelope>,
}

/// Cheap-to-clone sender side of the bus.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<BusEnvelope>,
    listeners: Arc<Mutex<Vec<SourceListener>>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BUS_BUFFER)
    }
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Broadcasts `message` to every window. Returns false when nobody listens.
    pub fn emit(&self, source: &WindowLabel, message: PipelineMessage) -> bool {
        self.send(BusEnvelope {
            source: source.clone(),
            target: None,
            message,
        })
    }

    /// Sends `message` to one window.
    pub fn emit_to(
        &self,
        source: &WindowLabel,
        target: &WindowLabel,
        message: PipelineMessage,
    ) -> bool {
        self.send(BusEnvelope {
            source: source.clone(),
            target: Some(target.clone()),
            message,
        })
    }

    fn send(&self, envelope: BusEnvelope) -> bool {
        let queued = self.send_to_listeners(&envelope);
        self.sender.send(envelope).is_ok() || queued
    }

    /// Queues `envelope` for every listener on its source and prunes the
    /// ones whose inbox is gone.
    fn send_to_listeners(&self, envelope: &BusEnvelope) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let mut queued = false;
        listeners.retain(|listener| {
            if listener.source != envelope.source {
                return !listener.sender.is_closed();
            }
            let sent = listener.sender.send(envelope.clone()).is_ok();
            queued |= sent;
            sent
        });
        queued
    }

    /// Every message sent by `source`, in order and without loss.
    pub fn listen_from(&self, source: &WindowLabel) -> Inbox {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SourceListener {
                source: source.clone(),
                sender,
            });
        Inbox {
            receiver: Receiver::Queue(receiver),
        }
    }

    /// Messages addressed to `window` (or to everyone), excluding its own.
    pub fn listen_to(&self, window: &WindowLabel) -> Inbox {
        Inbox {
            receiver: Receiver::Ring {
                receiver: self.sender.subscribe(),
                window: window.clone(),
            },
        }
    }
}

#[derive(Debug)]
enum Receiver {
    Ring {
        receiver: broadcast::Receiver<BusEnvelope>,
        window: WindowLabel,
    },
    Queue(mpsc::UnboundedReceiver<BusEnvelope>),
}

fn addressed_to(window: &WindowLabel, envelope: &BusEnvelope) -> bool {
    &envelope.source != window && envelope.target.as_ref().map_or(true, |t| t == window)
}

/// Filtered receiving end of the bus.
#[derive(Debug)]
pub struct Inbox {
    receiver: Receiver,
}

impl Inbox {
    /// Next accepted envelope; `None` once the bus is gone.
    ///
    /// A lagging `listen_to` inbox skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<BusEnvelope> {
        match &mut self.receiver {
            Receiver::Queue(receiver) => receiver.recv().await,
            Receiver::Ring { receiver, window } => loop {
                match receiver.recv().await {
                    Ok(envelope) if addressed_to(window, &envelope) => return Some(envelope),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(window = %window, skipped = n, "message bus receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }

    /// Next accepted envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<BusEnvelope> {
        match &mut self.receiver {
            Receiver::Queue(receiver) => receiver.try_recv().ok(),
            Receiver::Ring { receiver, window } => loop {
                match receiver.try_recv() {
                    Ok(envelope) if addressed_to(window, &envelope) => return Some(envelope),
                    Ok(_) => continue,
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        warn!(window = %window, skipped = n, "message bus receiver lagged");
                    }
                    Err(_) => return None,
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezs_core::PauseKey;

    #[tokio::test]
    async fn test_listen_from_filters_by_source() {
        let bus = MessageBus::default();
        let editor = WindowLabel::new("child_-breakpoint-pause");
        let other = WindowLabel::new("child_-settings");
        let mut inbox = bus.listen_from(&editor);

        bus.emit(&other, PipelineMessage::Open);
        bus.emit(&editor, PipelineMessage::Send {
            key: PauseKey::new("k1"),
        });

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(envelope.source, editor);
        assert!(matches!(envelope.message, PipelineMessage::Send { .. }));
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listen_to_skips_own_and_foreign_messages() {
        let bus = MessageBus::default();
        let main = WindowLabel::main();
        let editor = WindowLabel::new("child_-breakpoint-pause");
        let settings = WindowLabel::new("child_-settings");
        let mut inbox = bus.listen_to(&editor);

        bus.emit(&editor, PipelineMessage::Open);
        bus.emit_to(&main, &settings, PipelineMessage::Open);
        bus.emit_to(&main, &editor, PipelineMessage::Open);

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(envelope.source, main);
        assert_eq!(envelope.target, Some(editor));
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_listen_from_never_lags() {
        let bus = MessageBus::new(4);
        let main = WindowLabel::main();
        let editor = WindowLabel::new("child_-breakpoint-pause");
        let mut inbox = bus.listen_from(&editor);
        let _ring = bus.listen_to(&editor);

        for i in 0..50 {
            bus.emit(&editor, PipelineMessage::Send {
                key: PauseKey::new(format!("k{i}")),
            });
            bus.emit_to(&main, &editor, PipelineMessage::Open);
        }

        let mut keys = Vec::new();
        while let Some(envelope) = inbox.try_recv() {
            if let Some(key) = envelope.message.acknowledged_key() {
                keys.push(key.as_str().to_string());
            }
        }
        assert_eq!(keys.len(), 50);
        assert_eq!(keys.first().map(String::as_str), Some("k0"));
        assert_eq!(keys.last().map(String::as_str), Some("k49"));
    }

    #[test]
    fn test_dropped_source_inbox_is_pruned() {
        let bus = MessageBus::default();
        let editor = WindowLabel::new("child_-breakpoint-pause");
        let inbox = bus.listen_from(&editor);
        assert!(bus.emit(&editor, PipelineMessage::Open));

        drop(inbox);
        assert!(!bus.emit(&editor, PipelineMessage::Open));
        assert!(bus.listeners.lock().unwrap().is_empty());
    }

    #[test]
    fn test_emit_without_listeners() {
        let bus = MessageBus::default();
        assert!(!bus.emit(&WindowLabel::main(), PipelineMessage::Open));
    }
}
