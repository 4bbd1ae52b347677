//! banrakshak - submit forest-rights documents for OCR and follow them to completion.

mod commands;
mod logging;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    logging::init(cli.json_logs)?;
    log::debug!("banrakshak CLI v{}", env!("CARGO_PKG_VERSION"));

    commands::run(cli).await
}
