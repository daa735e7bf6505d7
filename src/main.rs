//! Devogen - a static page generator for daily devotionals.

mod audio;
mod build;
mod capture;
mod cli;
mod config;
mod extract;
mod fetch;
mod logger;
mod meta;
mod podcast;
mod render;
mod serve;
mod utils;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use std::path::Path;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Build { .. } => build::run(config),
        Commands::Rss => podcast::generate(config),
        Commands::All => run_all(config),
        Commands::Serve { .. } => serve_site(config),
    }
}

/// Load and validate configuration from CLI arguments.
///
/// An explicitly passed config path must exist. Without one, `devo.toml`
/// is picked up when present and the built-in defaults apply otherwise.
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    const DEFAULT_CONFIG: &str = "devo.toml";

    let mut config = match &cli.config {
        Some(path) if path.exists() => SiteConfig::from_path(path)?,
        Some(path) => bail!("Config file `{}` not found.", path.display()),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            SiteConfig::from_path(Path::new(DEFAULT_CONFIG))?
        }
        None => SiteConfig::default(),
    };

    config.update_with_env();
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}

/// Generate the podcast feed, then the pages.
///
/// The two steps are isolated: a failing feed still lets the pages
/// build, and vice versa. Any failure makes the whole run exit non-zero.
fn run_all(config: &'static SiteConfig) -> Result<()> {
    let mut failed = 0;

    if let Err(err) = podcast::generate(config) {
        log!("error"; "rss step failed: {err:#}");
        failed += 1;
    }
    if let Err(err) = build::run(config) {
        log!("error"; "build step failed: {err:#}");
        failed += 1;
    }

    if failed > 0 {
        bail!("{failed} of 2 steps failed");
    }
    log!("all"; "feed and pages generated");
    Ok(())
}
