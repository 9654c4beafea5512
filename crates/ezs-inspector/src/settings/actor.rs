//! Settings actor - owns the in-memory settings cache.
//!
//! Every mutation is written through to the backend before the cache is
//! updated, so the cache never holds a value the store does not.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored; detached writes log their failures

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::SettingsBackend;
use crate::error::SettingsError;

/// Where a mutation's outcome goes.
#[derive(Debug)]
pub enum Reply {
    /// The caller awaits the result.
    Wait(oneshot::Sender<Result<(), SettingsError>>),
    /// Fire-and-forget; failures are only logged.
    Detached,
}

/// Commands sent to the settings actor.
#[derive(Debug)]
pub enum SettingsCommand {
    Get {
        key: String,
        respond_to: oneshot::Sender<Option<Value>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<Map<String, Value>>,
    },
    Set {
        key: String,
        value: Value,
        reply: Reply,
    },
    Remove {
        key: String,
        reply: Reply,
    },
    Clear {
        reply: Reply,
    },
}

pub struct SettingsActor {
    receiver: mpsc::Receiver<SettingsCommand>,
    backend: Box<dyn SettingsBackend>,
    cache: Map<String, Value>,
}

impl SettingsActor {
    pub fn new(
        receiver: mpsc::Receiver<SettingsCommand>,
        backend: Box<dyn SettingsBackend>,
        cache: Map<String, Value>,
    ) -> Self {
        Self {
            receiver,
            backend,
            cache,
        }
    }

    pub async fn run(mut self) {
        info!(entries = self.cache.len(), "Settings actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Settings actor stopped");
    }

    async fn handle_command(&mut self, cmd: SettingsCommand) {
        match cmd {
            SettingsCommand::Get { key, respond_to } => {
                let _ = respond_to.send(self.cache.get(&key).cloned());
            }
            SettingsCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.cache.clone());
            }
            SettingsCommand::Set { key, value, reply } => {
                let mut next = self.cache.clone();
                next.insert(key.clone(), value);
                let result = self.commit(next).await;
                Self::reply(reply, "set", &key, result);
            }
            SettingsCommand::Remove { key, reply } => {
                let mut next = self.cache.clone();
                next.remove(&key);
                let result = self.commit(next).await;
                Self::reply(reply, "remove", &key, result);
            }
            SettingsCommand::Clear { reply } => {
                let result = self.commit(Map::new()).await;
                Self::reply(reply, "clear", "*", result);
            }
        }
    }

    async fn commit(&mut self, next: Map<String, Value>) -> Result<(), SettingsError> {
        self.backend.save(&next).await?;
        self.cache = next;
        Ok(())
    }

    fn reply(reply: Reply, op: &str, key: &str, result: Result<(), SettingsError>) {
        match reply {
            Reply::Wait(tx) => {
                let _ = tx.send(result);
            }
            Reply::Detached => {
                if let Err(e) = result {
                    warn!(op, key, error = %e, "detached settings write failed");
                }
            }
        }
    }
}
