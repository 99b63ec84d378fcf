use anyhow::Result;
use chatcal::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
