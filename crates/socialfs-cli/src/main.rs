//! socialfs binary.
//!
//! ```bash
//! RUST_LOG=socialfs_kernel=debug socialfs run --role admin list /socialmedia
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use socialfs_cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries command output only
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("socialfs_kernel=warn".parse()?))
        .init();

    let cli = Cli::parse();
    if socialfs_cli::run(cli).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
