//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Devotional page generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Posts source: wordpress API URL or local JSON file
    #[arg(short, long)]
    pub source: Option<String>,

    /// Page template path
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Output directory path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file path. `devo.toml` is picked up automatically when
    /// present; a path given here must exist.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch the posts and generate the devotional pages
    Build {
        /// capture a PNG of each rendered page
        #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        images: Option<bool>,

        /// download each devotional's MP3 next to its page
        #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        audio: Option<bool>,

        /// viewport width for the PNG capture
        #[arg(short, long)]
        width: Option<u32>,
    },

    /// Generate the podcast feed and the episode list
    Rss,

    /// Generate the feed first, then the pages
    All,

    /// Serve the output directory for local preview
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
    pub const fn is_rss(&self) -> bool {
        matches!(self.command, Commands::Rss)
    }
    pub const fn is_all(&self) -> bool {
        matches!(self.command, Commands::All)
    }
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_flags_default_missing_value() {
        let cli = Cli::try_parse_from(["devogen", "build", "--images", "--audio=false"]).unwrap();
        let Commands::Build { images, audio, width } = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(images, Some(true));
        assert_eq!(audio, Some(false));
        assert_eq!(width, None);
    }

    #[test]
    fn test_build_flags_absent_stay_none() {
        let cli = Cli::try_parse_from(["devogen", "build"]).unwrap();
        let Commands::Build { images, audio, .. } = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(images, None);
        assert_eq!(audio, None);
    }

    #[test]
    fn test_serve_flags() {
        let cli =
            Cli::try_parse_from(["devogen", "serve", "-i", "0.0.0.0", "-p", "8080"]).unwrap();
        assert!(cli.is_serve());
        let Commands::Serve { interface, port } = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(interface.as_deref(), Some("0.0.0.0"));
        assert_eq!(port, Some(8080));
    }

    #[test]
    fn test_global_flags_with_subcommand() {
        let cli = Cli::try_parse_from([
            "devogen", "--source", "posts.json", "--output", "dist", "rss",
        ])
        .unwrap();
        assert!(cli.is_rss());
        assert_eq!(cli.source.as_deref(), Some("posts.json"));
        assert_eq!(cli.output, Some(PathBuf::from("dist")));
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["devogen"]).is_err());
    }
}
