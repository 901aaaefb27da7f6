pub use clap::Parser;

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "mmfs")]
#[command(about = "Mount a Mattermost server as a filesystem", version)]
pub struct Args {
    /// Default log level; RUST_LOG directives take precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LevelFilter,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to the config file (defaults to ~/.config/mmfs/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
