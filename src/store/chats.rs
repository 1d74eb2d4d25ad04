use sqlx::SqlitePool;
use uuid::Uuid;

use super::Chat;
use crate::AppResult;

/// Deterministic id for the private chat between two users, so both
/// sides derive the same chat id independently.
pub fn private_chat_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("private_{first}_{second}")
}

/// Create the private chat between `me` and `other` and add both members.
/// The chat is named after the other user. Returns the chat id.
pub async fn create_private(pool: &SqlitePool, me: &str, other: &str) -> AppResult<String> {
    let id = private_chat_id(me, other);
    sqlx::query("insert into chats (id,name) values (?,?)")
        .bind(&id)
        .bind(other)
        .execute(pool)
        .await?;

    add_member(pool, &id, me).await?;
    add_member(pool, &id, other).await?;

    Ok(id)
}

/// Create a named group chat with the creator as its first member.
pub async fn create_group(pool: &SqlitePool, name: &str, creator: &str) -> AppResult<String> {
    let id = format!("group_{}", Uuid::now_v7().simple());
    sqlx::query("insert into chats (id,name) values (?,?)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await?;

    add_member(pool, &id, creator).await?;

    Ok(id)
}

pub async fn add_member(pool: &SqlitePool, chat_id: &str, username: &str) -> AppResult<()> {
    sqlx::query("insert into members (chat_id,username) values (?,?)")
        .bind(chat_id)
        .bind(username)
        .execute(pool)
        .await?;

    Ok(())
}

/// Chats the user is a member of.
pub async fn for_user(pool: &SqlitePool, username: &str) -> AppResult<Vec<Chat>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT c.id, c.name FROM chats c
         JOIN members m ON c.id = m.chat_id
         WHERE m.username = ?",
    )
    .bind(username)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id, name)| Chat { id, name }).collect())
}

pub async fn find(pool: &SqlitePool, chat_id: &str) -> AppResult<Option<Chat>> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT id,name FROM chats WHERE id=?")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id, name)| Chat { id, name }))
}

#[cfg(test)]
#[path = "chats_test.rs"]
mod chats_test;
