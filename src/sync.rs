//! Client side of the relay: one outbound connection per running client,
//! a background loop reconciling inbound envelopes into the store, and a
//! notification seam for whatever is painting the screen.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::store::{self, Message, MessageKind};
use crate::wire::{self, Envelope};
use crate::{AppResult, now_label};

/// What the sync agent needs to know about the UI. Both methods are
/// called from the agent's network task: `message_arrived` must hand the
/// message off to the UI's own context rather than doing work inline.
pub trait ChatUi: Send + Sync + 'static {
    /// Chat currently on screen, if any.
    fn current_chat(&self) -> Option<String>;

    /// One successfully stored incoming message for the open chat.
    fn message_arrived(&self, message: &Message);
}

/// Maintains the connection to the relay for one local user. Starts out
/// disconnected (local-only mode); [`SyncAgent::connect`] brings it
/// online. Messages sent while offline are persisted and never queued.
pub struct SyncAgent {
    user_id: String,
    pool: SqlitePool,
    ui: Arc<dyn ChatUi>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncAgent {
    pub fn new(user_id: impl Into<String>, pool: SqlitePool, ui: Arc<dyn ChatUi>) -> Self {
        Self {
            user_id: user_id.into(),
            pool,
            ui,
            writer: Arc::new(Mutex::new(None)),
            recv_task: Mutex::new(None),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Dial the relay, send the handshake and start the receive loop.
    /// On failure the agent stays disconnected and the caller keeps
    /// running in local-only mode; retrying is the caller's decision.
    pub async fn connect(&self, addr: &str) -> AppResult<()> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(wire::handshake_line(&self.user_id).as_bytes())
            .await?;

        *self.writer.lock().await = Some(write_half);

        let task = tokio::spawn(receive_loop(
            BufReader::new(read_half),
            self.pool.clone(),
            self.ui.clone(),
            self.writer.clone(),
        ));
        if let Some(old) = self.recv_task.lock().await.replace(task) {
            old.abort();
        }

        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Record a message by the local user and, if connected, put it on
    /// the wire. The local insert comes first: history stays consistent
    /// even when the network write fails, in which case the agent simply
    /// goes offline.
    pub async fn send(&self, chat_id: &str, text: &str) -> AppResult<i64> {
        let time = now_label();
        let id = store::messages::insert(
            &self.pool,
            chat_id,
            &self.user_id,
            text,
            &time,
            true,
            MessageKind::Text,
        )
        .await?;

        let envelope = Envelope {
            chat_id: chat_id.to_owned(),
            sender: self.user_id.clone(),
            text: text.to_owned(),
            time,
        };
        let line = wire::encode(&envelope)?;

        let mut writer = self.writer.lock().await;
        let failed = match writer.as_mut() {
            Some(stream) => stream.write_all(line.as_bytes()).await.err(),
            None => None,
        };
        if let Some(e) = failed {
            tracing::warn!(error = %e, "relay write failed, going offline");
            if let Some(mut stream) = writer.take() {
                let _ = stream.shutdown().await;
            }
        }

        Ok(id)
    }

    /// Drop the connection and stop the receive loop.
    pub async fn close(&self) {
        if let Some(mut stream) = self.writer.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }
    }
}

/// Reconcile inbound envelopes until the connection dies. A store failure
/// drops that one message and keeps the loop alive; a decode failure or
/// EOF ends it. The single exit path below releases the write half so the
/// rest of the agent sees itself offline.
async fn receive_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pool: SqlitePool,
    ui: Arc<dyn ChatUi>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
) {
    loop {
        match wire::next_envelope(&mut reader).await {
            Ok(Some(envelope)) => {
                let inserted = store::messages::insert(
                    &pool,
                    &envelope.chat_id,
                    &envelope.sender,
                    &envelope.text,
                    &envelope.time,
                    false,
                    MessageKind::Text,
                )
                .await;
                let id = match inserted {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!(error = %e, chat = %envelope.chat_id, "failed to store incoming message");
                        continue;
                    }
                };

                if ui.current_chat().as_deref() == Some(envelope.chat_id.as_str()) {
                    ui.message_arrived(&Message {
                        id,
                        chat_id: envelope.chat_id,
                        sender: envelope.sender,
                        text: envelope.text,
                        time: envelope.time,
                        is_read: false,
                        kind: MessageKind::Text,
                    });
                }
            }
            Ok(None) => {
                tracing::info!("relay closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "leaving receive loop");
                break;
            }
        }
    }

    if let Some(mut stream) = writer.lock().await.take() {
        let _ = stream.shutdown().await;
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;
