use sqlx::SqlitePool;

use crate::AppResult;

pub const LAST_USER: &str = "last_user";
pub const THEME: &str = "theme";

pub async fn get(pool: &SqlitePool, key: &str) -> AppResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key=?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(value,)| value))
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> AppResult<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key,value) values (?,?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;
