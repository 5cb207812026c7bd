//! Janitor - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    janitor::run().await
}
