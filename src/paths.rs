use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the playback options file
pub const OPTIONS_FILE: &str = "alphaplay.json";

/// Environment override for the cache directory
pub const CACHE_DIR_ENV: &str = "ALPHAPLAY_CACHE_DIR";

/// Configuration for overriding default paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom cache directory (from CLI or ENV)
    pub cache_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (ALPHAPLAY_CACHE_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let cache_dir = cli_dir.or_else(|| std::env::var(CACHE_DIR_ENV).ok().map(PathBuf::from));
        Self { cache_dir }
    }
}

/// Get the persistent cache directory
///
/// Priority:
/// 1. CLI --cache-dir argument
/// 2. ALPHAPLAY_CACHE_DIR environment variable
/// 3. Platform-specific cache directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.cache/alphaplay
/// - macOS: ~/Library/Caches/alphaplay
/// - Windows: %LOCALAPPDATA%\alphaplay
pub fn cache_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.cache_dir {
        return dir.clone();
    }
    if let Some(dir) = dirs_next::cache_dir() {
        return dir.join("alphaplay");
    }
    // Fallback: "." if everything else fails
    PathBuf::from(".")
}

/// Locate the options file
///
/// A local `alphaplay.json` in the working directory wins over the
/// platform config directory (~/.config/alphaplay on Linux).
pub fn options_file() -> PathBuf {
    if let Ok(current_dir) = std::env::current_dir() {
        let local = current_dir.join(OPTIONS_FILE);
        if local.exists() {
            return local;
        }
    }
    match dirs_next::config_dir() {
        Some(dir) => dir.join("alphaplay").join(OPTIONS_FILE),
        None => PathBuf::from(OPTIONS_FILE),
    }
}

/// Create a directory if it does not exist yet
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/custom")));
        assert_eq!(cache_dir(&config), PathBuf::from("/custom"));
    }

    #[test]
    fn test_default_dir_ends_with_app_name() {
        let config = PathConfig::default();
        let dir = cache_dir(&config);
        assert!(dir.ends_with("alphaplay") || dir == PathBuf::from("."));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // idempotent
        ensure_dir(&nested).unwrap();
    }
}
