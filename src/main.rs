use anyhow::Result;
use stitch::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
