//! Configuration loader with multi-source merging

use crate::{AbacusConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "ABACUS".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "ABACUS")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/abacus/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<AbacusConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = AbacusConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/abacus/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project config (abacus.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (abacus.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (ABACUS_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let abacus_config: AbacusConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        abacus_config.validate()?;

        Ok(abacus_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> AbacusConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;
    use abacus_policy::Strategy;
    use std::fs;
    use tempfile::tempdir;

    fn loader(project_dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("ABACUS_TEST_UNSET")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path())
            .load()
            .expect("Failed to load config");

        assert_eq!(config, AbacusConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        // Write project config
        let config_content = r#"
[analytics]
strategy = "brute-force"
parallel = false
top = 5

[output]
format = "json"
"#;
        fs::write(project_dir.join("abacus.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.analytics.strategy, Strategy::BruteForce);
        assert!(!config.analytics.parallel);
        assert_eq!(config.analytics.top, 5);
        assert_eq!(config.output.format, OutputFormat::Json);
        // Untouched sections keep their defaults
        assert!(config.output.color);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("abacus.toml"),
            r#"
[log]
level = "info"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("abacus.local.toml"),
            r#"
[log]
level = "debug"
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("abacus.toml"),
            "[analytics]\nstrategy = \"quantum\"\n",
        )
        .expect("Failed to write config");
        assert!(loader(project_dir).load().is_err());

        fs::write(project_dir.join("abacus.toml"), "[analytics]\ntop = 0\n")
            .expect("Failed to write config");
        assert!(loader(project_dir).load().is_err());
        assert_eq!(
            loader(project_dir).load_or_default(),
            AbacusConfig::default()
        );
    }

    // Note: Environment variables are not exercised here because setting
    // them mutates process-wide state shared by parallel tests. They work
    // as expected in actual usage:
    //
    // ABACUS_ANALYTICS_STRATEGY=brute-force
    // ABACUS_ANALYTICS_PARALLEL=false
    // ABACUS_OUTPUT_FORMAT=json
    //
    // These will override the corresponding config file values.
    // The CLI integration tests verify this behavior.
}
