//! Configuration File Loading
//!
//! Handles loading, validating and saving configuration files from the
//! usual locations with TOML and JSON support.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name used under every search root
const APP_DIR: &str = "zsh-kernel";

/// Configuration file loader
pub struct ConfigLoader {
    /// Search paths for configuration files (without extension)
    search_paths: Vec<PathBuf>,
    /// Supported configuration file formats
    supported_formats: Vec<ConfigFormat>,
    /// Current configuration file path (if loaded)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Whether to fall back to the default config if none exists
    pub create_default: bool,
    /// Whether to validate configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            supported_formats: vec![ConfigFormat::Toml, ConfigFormat::Json],
            current_path: None,
        }
    }

    /// Load configuration with default options
    pub fn load() -> Result<Config> {
        Self::load_with_options(LoadOptions::default())
    }

    /// Load configuration with custom options
    pub fn load_with_options(options: LoadOptions) -> Result<Config> {
        let mut loader = Self::new();
        loader.load_from_search_paths(&options)
    }

    /// Load a specific file; its extension picks the format
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let loader = Self::new();
        let config = loader.load_config_file(path, ConfigFormat::from_path(path))?;
        loader.validate_config(&config)?;
        Ok(config)
    }

    fn load_from_search_paths(&mut self, options: &LoadOptions) -> Result<Config> {
        if let Some((path, config)) = self.find_and_load_config()? {
            debug!("Loaded configuration from {}", path.display());
            self.current_path = Some(path);
            if options.validate {
                self.validate_config(&config)?;
            }
            return Ok(config);
        }

        if options.create_default {
            debug!("No configuration file found, using defaults");
            let config = Config::default();
            if options.validate {
                self.validate_config(&config)?;
            }
            Ok(config)
        } else {
            Err(Error::ConfigNotFound)
        }
    }

    /// Save configuration to the current path or default location
    pub fn save(&self, config: &Config) -> Result<PathBuf> {
        let path = self
            .current_path
            .clone()
            .unwrap_or_else(Self::get_default_config_path);
        self.save_to_path(config, &path)?;
        Ok(path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                Error::ConfigSerializationFailed {
                    format: "JSON".to_string(),
                    reason: e.to_string(),
                }
            })?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| Error::ConfigSerializationFailed {
                    format: "TOML".to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Find and load configuration from search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, Config)>> {
        for path in &self.search_paths {
            for format in &self.supported_formats {
                let config_path = path.with_extension(format.extension());

                if config_path.exists() {
                    match self.load_config_file(&config_path, *format) {
                        Ok(config) => return Ok(Some((config_path, config))),
                        Err(e) => {
                            warn!(
                                "Failed to load config from {}: {}",
                                config_path.display(),
                                e
                            );
                            continue;
                        }
                    }
                }
            }
        }

        Ok(None)
    }

    /// Load a specific configuration file
    fn load_config_file(&self, path: &Path, format: ConfigFormat) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                format: "TOML".to_string(),
                reason: e.to_string(),
            }),
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                    format: "JSON".to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Get default search paths for configuration files
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_config).join(APP_DIR).join("config"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR).join("config"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(format!(".{}", APP_DIR)).join("config"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join(format!(".{}", APP_DIR)).join("config"));
        }

        paths
    }

    /// Get the default configuration path
    fn get_default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Validate configuration
    pub fn validate_config(&self, config: &Config) -> Result<()> {
        if config.shell.program.trim().is_empty() {
            return Err(Error::ConfigValidationFailed {
                field: "shell.program".to_string(),
                reason: "Shell program cannot be empty".to_string(),
            });
        }

        let (cols, rows) = config.shell.dimensions;
        if cols == 0 || rows == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "shell.dimensions".to_string(),
                reason: "Terminal dimensions must be greater than 0".to_string(),
            });
        }

        let definitions = config.prompts.definitions();
        for (name, definition) in definitions.iter() {
            let field = format!("prompts.{}.text", name);
            if definition.text.is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field,
                    reason: "Sentinel cannot be empty".to_string(),
                });
            }
            if definition.text.contains('\'') || definition.text.contains('\n') {
                return Err(Error::ConfigValidationFailed {
                    field,
                    reason: "Sentinel cannot contain quotes or newlines".to_string(),
                });
            }
            if let Some(pattern) = &definition.pattern {
                regex::Regex::new(pattern).map_err(|e| Error::ConfigValidationFailed {
                    field: format!("prompts.{}.pattern", name),
                    reason: e.to_string(),
                })?;
            }
        }

        for (i, (name, definition)) in definitions.iter().enumerate() {
            if definitions[i + 1..]
                .iter()
                .any(|(_, other)| other.text == definition.text)
            {
                return Err(Error::ConfigValidationFailed {
                    field: format!("prompts.{}.text", name),
                    reason: "Sentinels must be distinct".to_string(),
                });
            }
        }

        if config.execution.startup_timeout_ms == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "execution.startup_timeout_ms".to_string(),
                reason: "Startup timeout must be greater than 0".to_string(),
            });
        }

        if config.helpers.timeout_ms == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "helpers.timeout_ms".to_string(),
                reason: "Helper timeout must be greater than 0".to_string(),
            });
        }

        for (field, template) in [
            ("helpers.completeness", &config.helpers.completeness),
            ("helpers.inspection", &config.helpers.inspection),
        ] {
            if template.program.trim().is_empty() || !template.has_placeholder() {
                return Err(Error::ConfigValidationFailed {
                    field: field.to_string(),
                    reason: "Template needs a program and a {} placeholder".to_string(),
                });
            }
        }

        if !config.helpers.completion_command.contains("{context}") {
            return Err(Error::ConfigValidationFailed {
                field: "helpers.completion_command".to_string(),
                reason: "Completion command must contain {context}".to_string(),
            });
        }

        Ok(())
    }

    /// Get the current configuration file path
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Where [`ConfigLoader::save`] writes
    pub fn set_current_path(&mut self, path: PathBuf) {
        self.current_path = Some(path);
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Add a custom search path
    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
