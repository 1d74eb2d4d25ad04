//! The one piece of state shared across connection handlers: who is
//! connected, and how to reach them.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::AppResult;
use crate::wire::{self, Envelope};

/// Handle for queueing outbound lines to one peer's writer task.
pub type Outbox = mpsc::UnboundedSender<String>;

struct Peer {
    conn_id: Uuid,
    tx: Outbox,
}

/// Live connections keyed by user id, at most one per user. Socket I/O
/// happens in per-peer writer tasks, never under the map lock, so one
/// stalled peer cannot hold up registration of the rest.
#[derive(Default)]
pub struct Registry {
    peers: RwLock<HashMap<String, Peer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the entry for `user_id` and return the new
    /// entry's connection id. Replacing drops the superseded outbox,
    /// which ends that connection's writer task and closes its socket.
    pub async fn register(&self, user_id: &str, tx: Outbox) -> Uuid {
        let conn_id = Uuid::now_v7();
        let previous = self
            .peers
            .write()
            .await
            .insert(user_id.to_owned(), Peer { conn_id, tx });
        if previous.is_some() {
            tracing::info!(user = user_id, "connection superseded");
        }

        conn_id
    }

    /// Remove the entry for `user_id`, but only if it still belongs to
    /// `conn_id`; a handler torn down after being superseded must not
    /// evict its replacement. Unknown users are a no-op.
    pub async fn unregister(&self, user_id: &str, conn_id: Uuid) {
        let mut peers = self.peers.write().await;
        if peers.get(user_id).is_some_and(|peer| peer.conn_id == conn_id) {
            peers.remove(user_id);
        }
    }

    /// Fan the envelope out to every registered peer except `skip`,
    /// returning how many outboxes accepted it. Peers whose writer task
    /// is gone are dropped from the registry; one dead peer never stops
    /// delivery to the rest.
    pub async fn broadcast(&self, envelope: &Envelope, skip: Option<&str>) -> AppResult<usize> {
        let line = wire::encode(envelope)?;

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let peers = self.peers.read().await;
            for (user, peer) in peers.iter() {
                if skip == Some(user.as_str()) {
                    continue;
                }
                if peer.tx.send(line.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push((user.clone(), peer.conn_id));
                }
            }
        }

        for (user, conn_id) in dead {
            tracing::warn!(user = %user, "dropping unreachable peer");
            self.unregister(&user, conn_id).await;
        }

        Ok(delivered)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.peers.read().await.contains_key(user_id)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
