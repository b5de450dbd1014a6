//! classweave CLI: post-compilation bytecode enhancement.
//!
//! Walks a compiled classes directory and rewrites each eligible class file
//! in place through the configured chain of enhancers.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = commands::resolve_config(&cli);
    commands::init_tracing(&cli, config.as_ref().ok());
    commands::run(cli, config)
}
