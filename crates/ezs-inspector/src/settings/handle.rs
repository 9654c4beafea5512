//! Client interface for the SettingsActor.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::actor::{Reply, SettingsCommand};
use crate::error::SettingsError;

/// Cheap-to-clone handle to the settings cache.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    sender: mpsc::Sender<SettingsCommand>,
}

impl SettingsHandle {
    pub fn new(sender: mpsc::Sender<SettingsCommand>) -> Self {
        Self { sender }
    }

    /// Cached value for `key`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SettingsCommand::Get {
                key: key.to_string(),
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Cached value for `key` decoded as `T`; `None` when absent or of
    /// another shape.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "stored setting has an unexpected shape");
                None
            }
        }
    }

    /// Every cached setting.
    pub async fn snapshot(&self) -> Map<String, Value> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SettingsCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Map::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Stores `value` under `key` and waits until it is persisted.
    ///
    /// # Errors
    ///
    /// - `SettingsError::Value` if `value` cannot be serialized
    /// - `SettingsError::Persist` if the durable store rejected the write
    /// - `SettingsError::ChannelClosed` if the actor has shut down
    pub async fn set(&self, key: &str, value: impl Serialize) -> Result<(), SettingsError> {
        let value = to_value(key, value)?;
        let (tx, rx) = oneshot::channel();
        self.send(SettingsCommand::Set {
            key: key.to_string(),
            value,
            reply: Reply::Wait(tx),
        })
        .await?;
        rx.await.map_err(|_| SettingsError::ChannelClosed)?
    }

    /// Queues a write without waiting for it to be persisted.
    ///
    /// Writes keep their order relative to every other command from this
    /// handle. Persistence failures are logged by the actor.
    pub async fn set_detached(&self, key: &str, value: impl Serialize) {
        let value = match to_value(key, value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "dropping unserializable setting");
                return;
            }
        };
        if self
            .send(SettingsCommand::Set {
                key: key.to_string(),
                value,
                reply: Reply::Detached,
            })
            .await
            .is_err()
        {
            warn!(key, "settings actor gone, write dropped");
        }
    }

    /// # Errors
    ///
    /// - `SettingsError::Persist` if the durable store rejected the write
    /// - `SettingsError::ChannelClosed` if the actor has shut down
    pub async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        let (tx, rx) = oneshot::channel();
        self.send(SettingsCommand::Remove {
            key: key.to_string(),
            reply: Reply::Wait(tx),
        })
        .await?;
        rx.await.map_err(|_| SettingsError::ChannelClosed)?
    }

    /// # Errors
    ///
    /// - `SettingsError::Persist` if the durable store rejected the write
    /// - `SettingsError::ChannelClosed` if the actor has shut down
    pub async fn clear(&self) -> Result<(), SettingsError> {
        let (tx, rx) = oneshot::channel();
        self.send(SettingsCommand::Clear {
            reply: Reply::Wait(tx),
        })
        .await?;
        rx.await.map_err(|_| SettingsError::ChannelClosed)?
    }

    async fn send(&self, cmd: SettingsCommand) -> Result<(), SettingsError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SettingsError::ChannelClosed)
    }
}

fn to_value(key: &str, value: impl Serialize) -> Result<Value, SettingsError> {
    serde_json::to_value(value).map_err(|e| SettingsError::Value {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
