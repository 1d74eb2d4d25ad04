use sqlx::SqlitePool;

use crate::AppResult;

pub async fn register(pool: &SqlitePool, username: &str, name: &str) -> AppResult<()> {
    if !username.starts_with('@') {
        return Err("username must start with @".into());
    }

    if find(pool, username).await?.is_some() {
        return Err(format!("username {username} is taken").into());
    }

    sqlx::query("insert into users (username,name) values (?,?)")
        .bind(username)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Display name of a registered user.
pub async fn find(pool: &SqlitePool, username: &str) -> AppResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM users WHERE username=?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(name,)| name))
}

/// Substring search over usernames, excluding the searching user.
pub async fn search(pool: &SqlitePool, query: &str, exclude: &str) -> AppResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT username FROM users WHERE username LIKE ? AND username != ?")
        .bind(format!("%{query}%"))
        .bind(exclude)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(username,)| username).collect())
}

#[cfg(test)]
#[path = "users_test.rs"]
mod users_test;
