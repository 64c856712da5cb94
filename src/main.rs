//! sitepipe - asset pipeline for static sites.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use sitepipe::{
    cli::{Cli, Commands, run_task},
    config::PipelineConfig,
    logger,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PipelineConfig::load(&cli)?;

    match &cli.command {
        Commands::Run { task, .. } => run_task(*task, &config),
    }
}
