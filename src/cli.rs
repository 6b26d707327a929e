use clap::Parser;
use std::path::PathBuf;

use crate::core::Direction;

/// Warm a media catalog and report cache state as JSON
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media files forming the catalog, in order
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Load catalog from a JSON array of paths (appended after FILE arguments)
    #[arg(short = 'p', long = "playlist", value_name = "PLAYLIST")]
    pub playlist: Option<PathBuf>,

    /// Current catalog position (0-based)
    #[arg(short = 'i', long = "index", value_name = "N", default_value_t = 0)]
    pub index: usize,

    /// Direction of travel for the High-priority neighbour
    #[arg(short = 'd', long = "direction", value_enum, default_value_t = Direction::Forward)]
    pub direction: Direction,

    /// Cache config JSON (default: reelcache.json in the config dir, if present)
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(long = "config-dir", value_name = "DIR", env = "REELCACHE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Keep the idle scheduler running for MS milliseconds before reporting
    #[arg(short = 'w', long = "watch", value_name = "MS")]
    pub watch_ms: Option<u64>,

    /// Enable debug logging to file (default: reelcache.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
