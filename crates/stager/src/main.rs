use clap::Parser;

use crate::cli::App;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    logging::init(app.global.verbose, app.global.json_logs);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "stager starting");
    app.run().await
}
