//! Translation Worker - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    worker::run().await
}
