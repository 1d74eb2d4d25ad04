use sqlx::SqlitePool;

use super::{Message, MessageKind};
use crate::AppResult;

/// Insert a message row and return the id sqlite assigned to it.
pub async fn insert(
    pool: &SqlitePool,
    chat_id: &str,
    sender: &str,
    text: &str,
    time: &str,
    is_read: bool,
    kind: MessageKind,
) -> AppResult<i64> {
    let result = sqlx::query("insert into messages (chat_id,sender,text,time,is_read,kind) values (?,?,?,?,?,?)")
        .bind(chat_id)
        .bind(sender)
        .bind(text)
        .bind(time)
        .bind(is_read)
        .bind(kind.as_str())
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Messages of one chat in insertion order.
pub async fn for_chat(pool: &SqlitePool, chat_id: &str) -> AppResult<Vec<Message>> {
    let rows: Vec<(i64, String, String, String, bool, String)> =
        sqlx::query_as("SELECT id,sender,text,time,is_read,kind FROM messages WHERE chat_id=? ORDER BY id")
            .bind(chat_id)
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(id, sender, text, time, is_read, kind)| Message {
            id,
            chat_id: chat_id.to_owned(),
            sender,
            text,
            time,
            is_read,
            kind: MessageKind::parse(&kind),
        })
        .collect())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM messages WHERE id=?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn mark_read(pool: &SqlitePool, chat_id: &str) -> AppResult<()> {
    sqlx::query("UPDATE messages SET is_read=1 WHERE chat_id=?")
        .bind(chat_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod messages_test;
