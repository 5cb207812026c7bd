//! Control API - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    api::run().await
}
