//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for Abacus
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    /// Create a new Paths instance with XDG discovery
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("com", "Abacus", "abacus"),
        }
    }

    /// Get user config file path (~/.config/abacus/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// Get project config file path (abacus.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("abacus.toml")
    }

    /// Get local config file path (abacus.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("abacus.local.toml")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        let paths = Paths::new();

        // Platform dependent; only the app name is stable.
        if let Ok(config_file) = paths.user_config_file() {
            assert!(config_file.to_string_lossy().contains("abacus"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_project_paths() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        assert_eq!(
            Paths::project_config_file(project_dir),
            project_dir.join("abacus.toml")
        );
        assert_eq!(
            Paths::local_config_file(project_dir),
            project_dir.join("abacus.local.toml")
        );
    }
}
