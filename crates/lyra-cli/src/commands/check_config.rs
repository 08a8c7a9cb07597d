//! `lyra-dav check-config`: validate a configuration file and summarize it.

use anyhow::Result;
use clap::Args as ClapArgs;
use lyra_store::SpaceKind;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::seed::seed;

#[derive(ClapArgs)]
pub struct Args {
    /// File to check (defaults to --config, then the default location)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

pub fn execute(args: &Args, global: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(args.file.as_deref().or(global))?;
    seed(&config)?;

    let admins = config.users.iter().filter(|u| u.admin).count();
    let count = |kind: SpaceKind| config.spaces.iter().filter(|s| s.kind == kind).count();
    let storage = config
        .storage
        .data_dir
        .as_ref()
        .map_or_else(|| "memory".to_string(), |dir| dir.display().to_string());

    println!("Configuration OK");
    println!("  listen:   {}:{}", config.server.bind, config.server.port);
    println!("  prefix:   {}", config.dav.prefix);
    println!("  storage:  {storage}");
    println!(
        "  tokens:   {}",
        if config.auth.token_secret.is_some() { "enabled" } else { "disabled" }
    );
    println!("  users:    {} ({admins} admin)", config.users.len());
    println!(
        "  spaces:   {} personal, {} enterprise",
        count(SpaceKind::Personal),
        count(SpaceKind::Enterprise)
    );
    Ok(())
}
