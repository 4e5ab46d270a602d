use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Engine configuration file (TOML). Missing file means defaults.
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// JSON-lines command source, `-` for stdin.
    #[arg(long, default_value = "-")]
    pub input: String,

    /// Number of order worker tasks. Commands for one order always land on
    /// the same worker.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
}
