//! Spot - drop loosely structured documents in, get a website out.

mod build;
mod cli;
mod compiler;
mod config;
mod content;
mod init;
mod page;
mod render;
mod serve;
mod shutdown;
mod utils;
mod watch;

use anyhow::{Result, bail};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use compiler::Pandoc;
use config::{CONFIG_FILE, SiteConfig};
use init::new_site;
use serve::serve_and_watch;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_path(&cli.config);

    match &cli.command {
        Commands::Init { name } => {
            let parent = config_path.parent().unwrap_or(Path::new(""));
            let root = match name {
                Some(name) => parent.join(name),
                None => parent.to_path_buf(),
            };
            let manifest = config_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(CONFIG_FILE);
            new_site(&root, manifest, name.is_some())
        }
        Commands::Build { .. } => {
            let config = load_config(&cli, &config_path)?;
            let pandoc = Pandoc::new(&config.converter);
            if cli.is_watch() {
                serve_and_watch(&config, &pandoc)
            } else {
                build_site(&config, &pandoc, None).map(|_| ())
            }
        }
    }
}

/// Expand a leading `~` in the manifest path.
fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli, config_path: &Path) -> Result<SiteConfig> {
    if !config_path.exists() {
        bail!(
            "Config file `{}` not found. Run `spot init` to create a site.",
            config_path.display()
        );
    }

    let mut config = SiteConfig::from_path(config_path)?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}
