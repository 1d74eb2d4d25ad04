//! The relay server: accept, handshake, then fan every inbound envelope
//! out to everyone else. It never looks inside `chat_id`; routing by
//! membership would be a layer above this one.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::AppResult;
use crate::relay::Registry;
use crate::wire;

pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
        })
    }

    pub fn local_addr(&self) -> AppResult<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Accept loop. Runs until the listener itself fails; every accepted
    /// connection gets its own task so a stalled peer never blocks accept.
    pub async fn run(self) -> AppResult<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            tracing::debug!(%addr, "accepted connection");
            let registry = self.registry.clone();
            tokio::spawn(handle_client(registry, stream));
        }
    }
}

/// One connection, handshake to teardown. Whatever ends the receive loop
/// (peer close, decode failure, read error), the exit path below
/// unregisters the connection.
async fn handle_client(registry: Arc<Registry>, stream: TcpStream) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let user_id = match wire::read_handshake(&mut reader).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "handshake failed");
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = registry.register(&user_id, tx).await;
    tracing::info!(user = %user_id, "registered");

    tokio::spawn(write_outbound(
        registry.clone(),
        user_id.clone(),
        conn_id,
        write_half,
        rx,
    ));

    loop {
        match wire::next_envelope(&mut reader).await {
            Ok(Some(envelope)) => match registry.broadcast(&envelope, Some(&user_id)).await {
                Ok(delivered) => {
                    tracing::debug!(user = %user_id, chat = %envelope.chat_id, delivered, "relayed");
                }
                Err(e) => tracing::warn!(error = %e, "broadcast failed"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "closing connection");
                break;
            }
        }
    }

    registry.unregister(&user_id, conn_id).await;
    tracing::info!(user = %user_id, "unregistered");
}

/// Drains one peer's outbox onto its socket. Ends when the registry drops
/// the outbox (disconnect or supersede) or the socket write fails; either
/// way the write half is shut down on the way out.
async fn write_outbound(
    registry: Arc<Registry>,
    user_id: String,
    conn_id: Uuid,
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            registry.unregister(&user_id, conn_id).await;
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

#[cfg(test)]
#[path = "server_test.rs"]
mod server_test;
