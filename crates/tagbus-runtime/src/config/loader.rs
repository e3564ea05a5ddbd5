//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::schema::TagbusConfig;
use super::validation::validate_config;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader with support for multiple search paths.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new configuration loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`$XDG_CONFIG_HOME/tagbus` or
    /// platform equivalent) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.add_search_path(config_dir.join("tagbus"))
        } else {
            self
        }
    }

    /// Loads configuration from the first available source, falling back to
    /// `TagbusConfig::default()` if no file is found in any search path.
    pub fn load(&self) -> ConfigResult<TagbusConfig> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }

        info!("No configuration file found, using defaults");
        Ok(TagbusConfig::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<TagbusConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config = self.parse_yaml(&content)?;
        validate_config(&config)?;

        debug!(
            racks = config.racks.len(),
            plugins = config.plugins.len(),
            "configuration loaded successfully"
        );
        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<TagbusConfig> {
        let config = self.parse_yaml(yaml)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Finds the first available configuration file across search paths.
    fn find_config_file(&self) -> Option<PathBuf> {
        const CONFIG_NAMES: &[&str] = &[
            "tagbus.yaml",
            "tagbus.yml",
            "config.yaml",
            "config.yml",
            ".tagbus.yaml",
            ".tagbus.yml",
        ];

        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!("Checking for config file: {}", path.display());
                if path.exists() {
                    info!("Found configuration file: {}", path.display());
                    return Some(path);
                }
            }
        }

        None
    }

    /// Parses YAML content with environment variable expansion.
    fn parse_yaml(&self, content: &str) -> ConfigResult<TagbusConfig> {
        let expanded = self.expand_env_vars(content);
        serde_yaml::from_str(&expanded).map_err(ConfigError::from)
    }

    /// Expands environment variables in the format `${VAR_NAME}` or
    /// `${VAR_NAME:-default}`.
    fn expand_env_vars(&self, content: &str) -> String {
        let mut result = content.to_string();
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}").unwrap();

        for cap in re.captures_iter(content) {
            let full_match = cap.get(0).unwrap().as_str();
            let var_name = cap.get(1).unwrap().as_str();
            let default_value = cap.get(3).map(|m| m.as_str());

            let value = std::env::var(var_name)
                .ok()
                .or_else(|| default_value.map(String::from))
                .unwrap_or_default();

            result = result.replace(full_match, &value);
        }

        result
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Convenience function to load configuration with default search paths.
pub fn load_config() -> ConfigResult<TagbusConfig> {
    ConfigLoader::default().load()
}

/// Convenience function to load configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<TagbusConfig> {
    ConfigLoader::new().load_from_file(path)
}
