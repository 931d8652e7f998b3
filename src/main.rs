use anyhow::Result;
use clap::Parser;
use hisaab::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    hisaab::logging::init_tracing(cli.verbose);
    cli.run().await
}
