use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "HTTP:   ureq 2 (blocking)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Alpha video playback core - cache and session tooling
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: alphaplay.log in the cache dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom cache directory (overrides ALPHAPLAY_CACHE_DIR and platform paths)
    #[arg(short = 'c', long = "cache-dir", value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a resource into the persistent cache
    Prefetch {
        /// URL or local file path
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Fetch again even when already cached
        #[arg(short = 'f', long = "force")]
        force: bool,
    },

    /// Inspect or edit the persistent cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Play a resource through a headless session and report lifecycle callbacks
    Simulate {
        /// URL or local file path
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Playback options JSON (default: alphaplay.json lookup)
        #[arg(short = 'o', long = "options", value_name = "FILE")]
        options: Option<PathBuf>,

        /// Repeat count (0/1 once, N cycles, -1 infinite)
        #[arg(long = "loop", value_name = "N", allow_hyphen_values = true)]
        loop_count: Option<i64>,

        /// Simulated media duration in seconds
        #[arg(long = "duration", value_name = "SECS", default_value = "2.0")]
        duration: f64,

        /// Simulated frame rate
        #[arg(long = "fps", value_name = "FPS", default_value = "30")]
        fps: f64,

        /// Refuse unmuted autoplay until click-to-play is used
        #[arg(long = "block-autoplay")]
        block_autoplay: bool,

        /// Platform profile JSON (quirk flags)
        #[arg(long = "platform", value_name = "FILE")]
        platform: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long = "timeout", value_name = "SECS", default_value = "30")]
        timeout: f64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached resources
    List,
    /// Remove every cached resource
    Clear,
    /// Remove one resource by identity
    Remove {
        #[arg(value_name = "KEY")]
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulate() {
        let args = Args::parse_from(["alphaplay", "-vv", "simulate", "clip.mp4", "--loop", "-1", "--fps", "60"]);
        assert_eq!(args.verbosity, 2);
        match args.command {
            Command::Simulate { source, loop_count, fps, .. } => {
                assert_eq!(source, "clip.mp4");
                assert_eq!(loop_count, Some(-1));
                assert_eq!(fps, 60.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_remove_with_global_dir() {
        let args = Args::parse_from(["alphaplay", "cache", "remove", "https://a/b.mp4", "--cache-dir", "/tmp/c"]);
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/c")));
        assert!(matches!(args.command, Command::Cache { action: CacheAction::Remove { .. } }));
    }
}
