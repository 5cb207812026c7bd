//! Connection bootstrapping for the store.

use core_config::store::StoreConfig;
use redis::aio::ConnectionManager;
use tracing::info;

/// Open a `ConnectionManager` against `url`, verifying it with a `PING`.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    info!(url, "connecting to store");

    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("store connection established");
    Ok(manager)
}

/// Open a `ConnectionManager` from a typed `StoreConfig`.
pub async fn connect_from_config(config: &StoreConfig) -> redis::RedisResult<ConnectionManager> {
    connect(&config.url()).await
}
