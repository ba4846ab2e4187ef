mod analyzer;
mod cli;
mod commands;
mod errors;
mod extract;
mod findings;
mod model;
mod patterns;
mod pipeline;
mod scanner;
mod utils;
mod walk;

use crate::errors::GrepIntelResult;
use crate::utils::Config;
use clap::Parser;
use cli::Cli;
use console::style;
use directories::ProjectDirs;
use std::fs;
use std::time::Instant;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn init_tracing(verbose: bool) {
    let fmt_layer = fmt::layer()
        .pretty()
        .with_thread_ids(true)
        .with_timer(time::UtcTime::rfc_3339());

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    Registry::default().with(filter).with(fmt_layer).init();
}

fn main() -> GrepIntelResult<()> {
    let now = Instant::now();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("CLI starting up");

    let proj_dirs = ProjectDirs::from("dev", "grepintel", "grepintel")
        .ok_or("Unable to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    fs::create_dir_all(config_dir)?;

    let data_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(data_dir)?;

    let mut config = Config::load(config_dir)?;

    let threads = config
        .performance
        .worker_threads
        .unwrap_or_else(num_cpus::get)
        .max(1);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .stack_size(config.performance.rayon_thread_stack_size)
        .build_global()
    {
        tracing::warn!("using the default rayon pool: {e}");
    }

    commands::handle_command(cli.command, cli.verbose, data_dir, &mut config)?;

    println!(
        "{} in {:.3}s.",
        style("Finished").green().bold(),
        now.elapsed().as_secs_f32()
    );
    Ok(())
}
