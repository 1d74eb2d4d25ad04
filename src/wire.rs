//! Wire format of the relay connection: one newline-terminated JSON
//! envelope per message, preceded by a newline-terminated handshake line
//! carrying the user id.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::AppResult;

/// What a [`crate::store::Message`] looks like on the wire. `is_read` and
/// `kind` are local bookkeeping and never cross the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub chat_id: String,
    pub sender: String,
    pub text: String,
    pub time: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("envelope field {0} is missing or empty")]
    MissingField(&'static str),
}

/// Serialize an envelope to its framed form, trailing newline included.
/// JSON escapes any newline inside `text`, so the frame is always a
/// single line.
pub fn encode(envelope: &Envelope) -> AppResult<String> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

pub fn decode(line: &str) -> Result<Envelope, DecodeError> {
    let envelope: Envelope = serde_json::from_str(line)?;
    if envelope.chat_id.is_empty() {
        return Err(DecodeError::MissingField("chat_id"));
    }
    if envelope.sender.is_empty() {
        return Err(DecodeError::MissingField("sender"));
    }

    Ok(envelope)
}

/// Read the next envelope off the connection. The buffered reader
/// re-assembles frames that span reads and splits reads that carry
/// several frames. `Ok(None)` means the peer closed the connection.
pub async fn next_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    Ok(Some(decode(line.trim_end_matches(['\r', '\n']))?))
}

pub fn handshake_line(user_id: &str) -> String {
    format!("{user_id}\n")
}

/// Read the handshake line identifying the connecting user. `Ok(None)`
/// means the peer closed before identifying itself.
pub async fn read_handshake<R>(reader: &mut R) -> Result<Option<String>, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let user_id = line.trim();
    if user_id.is_empty() {
        return Err(DecodeError::MissingField("user_id"));
    }

    Ok(Some(user_id.to_owned()))
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;
