pub mod db;
pub mod relay;
pub mod store;
pub mod sync;
pub mod wire;

use time::macros::format_description;

/// Address the relay binds to (and clients dial) unless RELAY_ADDR says otherwise.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:7878";

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(std::io::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(time::error::Format);
apperr_impl!(wire::DecodeError);

/// Wall-clock HH:MM label stamped on outgoing messages.
///
/// Falls back to UTC when the local offset cannot be determined
/// (the usual case on multithreaded runtimes).
pub fn now_label() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "00:00".to_owned())
}
