use rustgram::relay::RelayServer;
use rustgram::{AppResult, DEFAULT_RELAY_ADDR};

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let addr = dotenv::var("RELAY_ADDR").unwrap_or_else(|_| DEFAULT_RELAY_ADDR.to_owned());
    let server = RelayServer::bind(&addr).await?;
    tracing::info!(addr = %server.local_addr()?, "relay listening");

    server.run().await
}
