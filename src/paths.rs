//! Config and log file locations.
//!
//! Resolution order:
//! 1. `--config-dir` CLI argument
//! 2. `REELCACHE_CONFIG_DIR` environment variable
//! 3. Current directory, if it already holds a reelcache file
//! 4. Platform directory from dirs-next (`~/.config/reelcache`, `~/.local/share/reelcache`, ...)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "REELCACHE_CONFIG_DIR";
pub const CONFIG_FILE: &str = "reelcache.json";
pub const LOG_FILE: &str = "reelcache.log";

const APP_DIR: &str = "reelcache";

#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom directory from CLI or env; holds both config and data
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI value wins over `REELCACHE_CONFIG_DIR`.
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.resolve(dirs_next::config_dir).join(name)
    }

    /// Logs and other generated files
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.resolve(dirs_next::data_dir).join(name)
    }

    /// Create the config and data directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        let config_dir = self.resolve(dirs_next::config_dir);
        let data_dir = self.resolve(dirs_next::data_dir);

        for dir in [&config_dir, &data_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    fn resolve(&self, platform_dir: fn() -> Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }

        if let Ok(cwd) = std::env::current_dir()
            && has_local_files(&cwd)
        {
            return cwd;
        }

        platform_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn has_local_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_dir_holds_everything() {
        let paths = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(paths.config_file(CONFIG_FILE), PathBuf::from("/custom/reelcache.json"));
        assert_eq!(paths.data_file(LOG_FILE), PathBuf::from("/custom/reelcache.log"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let paths = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(paths.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_platform_default_names_app_dir() {
        let path = PathConfig::default().config_file("x.json");
        assert!(path.ends_with("x.json"));
    }

    #[test]
    fn test_ensure_dirs_creates_custom_dir() {
        let dir = std::env::temp_dir().join(format!("reelcache-paths-{}", std::process::id()));
        let paths = PathConfig {
            config_dir: Some(dir.clone()),
        };
        paths.ensure_dirs().unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
