//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spot static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Manifest path, `~` is expanded (default: spot.toml)
    #[arg(short = 'C', long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Init a starter site
    Init {
        /// the name(path) of site directory; defaults to the current directory
        name: Option<PathBuf>,
    },

    /// Build the site into `build_path`
    Build {
        /// Serve the output and rebuild on change
        #[arg(short, long)]
        watch: bool,

        /// Listen address while watching, e.g. ":8080" or "127.0.0.1:3000"
        #[arg(short, long, requires = "watch")]
        addr: Option<String>,
    },
}

impl Cli {
    #[cfg(test)]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }

    pub const fn is_watch(&self) -> bool {
        matches!(self.command, Commands::Build { watch: true, .. })
    }

    /// Listen address override; only meaningful with `build --watch`.
    pub fn addr(&self) -> Option<&str> {
        match &self.command {
            Commands::Build {
                watch: true,
                addr: Some(addr),
            } => Some(addr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("spot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_build_defaults() {
        let cli = parse(&["build"]);

        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
        assert!(!cli.is_init());
        assert!(!cli.is_watch());
        assert_eq!(cli.addr(), None);
    }

    #[test]
    fn test_watch_with_addr() {
        let cli = parse(&["-C", "site/spot.yaml", "build", "--watch", "--addr", ":3000"]);

        assert_eq!(cli.config, PathBuf::from("site/spot.yaml"));
        assert!(cli.is_watch());
        assert_eq!(cli.addr(), Some(":3000"));
    }

    #[test]
    fn test_addr_requires_watch() {
        assert!(Cli::try_parse_from(["spot", "build", "--addr", ":3000"]).is_err());
    }

    #[test]
    fn test_init_name() {
        let cli = parse(&["init", "blog"]);

        assert!(cli.is_init());
        assert!(matches!(cli.command, Commands::Init { name: Some(ref n) } if n == &PathBuf::from("blog")));
    }
}
