use std::process;

use adminql::{cli::Adminql, logger};
use clap::Parser;

#[tokio::main]
async fn main() {
    let app = Adminql::parse();
    logger::init(app.log_level);
    tracing::trace!(command_structure = ?app);

    if let Err(error) = app.run().await {
        tracing::debug!(?error);
        eprintln!("error: {error:#}");
        process::exit(1)
    }
}
