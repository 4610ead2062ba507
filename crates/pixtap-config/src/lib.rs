//! Configuration management for pixtap.
//!
//! Parses `pixtap.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `pixlet.binary`
//! - `pixlet.python`
//! - every `app_config` value

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override applet path.
    pub path: Option<PathBuf>,
    /// Override installation id.
    pub installation_id: Option<String>,
    /// Override background flag.
    pub background: Option<bool>,
    /// Override renderer binary.
    pub pixlet: Option<String>,
    /// Override python interpreter for helper programs.
    pub python: Option<String>,
    /// Override pixel magnification.
    pub magnify: Option<u32>,
    /// Override applet timezone.
    pub timezone: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "pixtap.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Applet configuration (path is a relative string from TOML).
    app: AppConfigRaw,
    /// Renderer invocation configuration.
    pub pixlet: PixletConfig,
    /// Extra `key=value` pairs passed through to the applet.
    pub app_config: BTreeMap<String, String>,

    /// Resolved applet configuration (set after loading).
    #[serde(skip)]
    pub app_resolved: AppConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfigRaw::default(),
            pixlet: PixletConfig::default(),
            app_config: BTreeMap::new(),
            app_resolved: AppConfig::default(),
            config_path: None,
        }
    }
}

/// Raw applet configuration as parsed from TOML (path as string).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AppConfigRaw {
    path: Option<String>,
    installation_id: Option<String>,
    background: Option<bool>,
}

/// Resolved applet configuration with an absolute path.
#[derive(Debug, Default)]
pub struct AppConfig {
    /// Applet path: a single `.star` script or an applet directory.
    pub path: Option<PathBuf>,
    /// Installation id for emitted records (defaults to the applet stem).
    pub installation_id: Option<String>,
    /// Whether the applet is shown in the background rotation.
    pub background: bool,
}

/// Renderer invocation configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PixletConfig {
    /// Renderer binary name or path.
    pub binary: String,
    /// Python interpreter used for callback helper programs.
    pub python: String,
    /// Pixel magnification factor.
    pub magnify: Option<u32>,
    /// Maximum retries after a timeout-class renderer failure.
    pub max_retries: u32,
    /// Seconds to wait between renderer attempts.
    pub retry_delay_secs: u64,
    /// Timezone passed to the applet (defaults to the `TZ` env var).
    pub timezone: Option<String>,
}

impl Default for PixletConfig {
    fn default() -> Self {
        Self {
            binary: "pixlet".to_owned(),
            python: "python3".to_owned(),
            magnify: None,
            max_retries: 3,
            retry_delay_secs: 3,
            timezone: None,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`app_config.api_key`").
        field: String,
        /// Error message (e.g., "${`API_KEY`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `pixtap.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(path) = &settings.path {
            self.app_resolved.path = Some(path.clone());
        }
        if let Some(installation_id) = &settings.installation_id {
            self.app_resolved.installation_id = Some(installation_id.clone());
        }
        if let Some(background) = settings.background {
            self.app_resolved.background = background;
        }
        if let Some(pixlet) = &settings.pixlet {
            self.pixlet.binary.clone_from(pixlet);
        }
        if let Some(python) = &settings.python {
            self.pixlet.python.clone_from(python);
        }
        if let Some(magnify) = settings.magnify {
            self.pixlet.magnify = Some(magnify);
        }
        if let Some(timezone) = &settings.timezone {
            self.pixlet.timezone = Some(timezone.clone());
        }
    }

    /// Get the configured applet path.
    ///
    /// Use this instead of accessing `app_resolved.path` directly when the
    /// command requires an applet.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no path is configured.
    pub fn require_app_path(&self) -> Result<&Path, ConfigError> {
        self.app_resolved.path.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "app.path required in config (or pass a path on the command line)".to_owned(),
            )
        })
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        // Validate configuration after loading and resolution
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are properly set and contain valid values.
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_RETRIES: u32 = 10;
        const MAX_RETRY_DELAY_SECS: u64 = 300;

        require_non_empty(&self.pixlet.binary, "pixlet.binary")?;
        require_non_empty(&self.pixlet.python, "pixlet.python")?;

        if self.pixlet.magnify == Some(0) {
            return Err(ConfigError::Validation(
                "pixlet.magnify must be greater than 0".to_owned(),
            ));
        }
        if self.pixlet.max_retries > MAX_RETRIES {
            return Err(ConfigError::Validation(format!(
                "pixlet.max_retries cannot exceed {MAX_RETRIES}"
            )));
        }
        if self.pixlet.retry_delay_secs > MAX_RETRY_DELAY_SECS {
            return Err(ConfigError::Validation(format!(
                "pixlet.retry_delay_secs cannot exceed {MAX_RETRY_DELAY_SECS}"
            )));
        }

        // Keys starting with '$' are reserved for pairs the renderer
        // invocation sets itself ($tz, $asset_url).
        for key in self.app_config.keys() {
            if key.starts_with('$') {
                return Err(ConfigError::Validation(format!(
                    "app_config key '{key}' is reserved ('$'-prefixed keys are set automatically)"
                )));
            }
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.pixlet.binary = expand::expand_env(&self.pixlet.binary, "pixlet.binary")?;
        self.pixlet.python = expand::expand_env(&self.pixlet.python, "pixlet.python")?;

        for (key, value) in &mut self.app_config {
            *value = expand::expand_env(value, &format!("app_config.{key}"))?;
        }

        Ok(())
    }

    /// Resolve the relative applet path against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.app_resolved = AppConfig {
            path: self.app.path.as_deref().map(|p| config_dir.join(p)),
            installation_id: self.app.installation_id.clone(),
            background: self.app.background.unwrap_or(true),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pixlet.binary, "pixlet");
        assert_eq!(config.pixlet.python, "python3");
        assert_eq!(config.pixlet.max_retries, 3);
        assert_eq!(config.pixlet.retry_delay_secs, 3);
        assert!(config.pixlet.magnify.is_none());
        assert!(config.app_resolved.path.is_none());
        assert!(config.app_config.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.pixlet.binary, "pixlet");
        assert_eq!(config.pixlet.max_retries, 3);
    }

    #[test]
    fn test_parse_pixlet_section() {
        let toml = r#"
[pixlet]
binary = "/opt/pixlet/pixlet"
magnify = 2
max_retries = 5
retry_delay_secs = 1
timezone = "Europe/Amsterdam"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.pixlet.binary, "/opt/pixlet/pixlet");
        assert_eq!(config.pixlet.magnify, Some(2));
        assert_eq!(config.pixlet.max_retries, 5);
        assert_eq!(config.pixlet.retry_delay_secs, 1);
        assert_eq!(config.pixlet.timezone, Some("Europe/Amsterdam".to_owned()));
    }

    #[test]
    fn test_parse_app_config_table() {
        let toml = r#"
[app_config]
city = "Delft"
units = "metric"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.app_config["city"], "Delft");
        assert_eq!(config.app_config["units"], "metric");
    }

    #[test]
    fn test_resolve_paths_joins_config_dir() {
        let toml = r#"
[app]
path = "apps/clock"
installation_id = "kitchen-clock"
background = false
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.app_resolved.path,
            Some(PathBuf::from("/project/apps/clock"))
        );
        assert_eq!(
            config.app_resolved.installation_id,
            Some("kitchen-clock".to_owned())
        );
        assert!(!config.app_resolved.background);
    }

    #[test]
    fn test_background_defaults_to_true() {
        let toml = r#"
[app]
path = "clock.star"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert!(config.app_resolved.background);
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        let overrides = CliSettings {
            path: Some(PathBuf::from("/apps/weather")),
            installation_id: Some("hall-weather".to_owned()),
            background: Some(false),
            pixlet: Some("pixlet-dev".to_owned()),
            magnify: Some(4),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.app_resolved.path, Some(PathBuf::from("/apps/weather")));
        assert_eq!(
            config.app_resolved.installation_id,
            Some("hall-weather".to_owned())
        );
        assert!(!config.app_resolved.background);
        assert_eq!(config.pixlet.binary, "pixlet-dev");
        assert_eq!(config.pixlet.magnify, Some(4));
        assert_eq!(config.pixlet.python, "python3"); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_empty_changes_nothing() {
        let mut config = Config::default();

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.pixlet.binary, "pixlet");
        assert!(config.app_resolved.path.is_none());
    }

    #[test]
    fn test_require_app_path_missing() {
        let config = Config::default();
        let err = config.require_app_path().unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("app.path"));
    }

    #[test]
    fn test_require_app_path_present() {
        let mut config = Config::default();
        config.app_resolved.path = Some(PathBuf::from("/apps/clock"));

        assert_eq!(config.require_app_path().unwrap(), Path::new("/apps/clock"));
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let err = Config::load(Some(Path::new("/nonexistent/pixtap.toml")), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_resolves_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixtap.toml");
        std::fs::write(&path, "[app]\npath = \"clock\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.app_resolved.path, Some(dir.path().join("clock")));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_expand_env_vars_app_config() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("PIXTAP_TEST_API_KEY", "s3cret");
        }

        let toml = r#"
[app_config]
api_key = "${PIXTAP_TEST_API_KEY}"
units = "${PIXTAP_TEST_UNITS:-metric}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.app_config["api_key"], "s3cret");
        assert_eq!(config.app_config["units"], "metric");

        unsafe {
            std::env::remove_var("PIXTAP_TEST_API_KEY");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("PIXTAP_TEST_NO_SUCH_VAR");
        }

        let toml = r#"
[app_config]
api_key = "${PIXTAP_TEST_NO_SUCH_VAR}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("app_config.api_key"));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_binary_empty() {
        let mut config = Config::default();
        config.pixlet.binary = String::new();
        assert_validation_error(&config, &["pixlet.binary", "empty"]);
    }

    #[test]
    fn test_validate_python_empty() {
        let mut config = Config::default();
        config.pixlet.python = String::new();
        assert_validation_error(&config, &["pixlet.python", "empty"]);
    }

    #[test]
    fn test_validate_magnify_zero() {
        let mut config = Config::default();
        config.pixlet.magnify = Some(0);
        assert_validation_error(&config, &["magnify", "greater than 0"]);
    }

    #[test]
    fn test_validate_max_retries_too_high() {
        let mut config = Config::default();
        config.pixlet.max_retries = 100;
        assert_validation_error(&config, &["max_retries", "10"]);
    }

    #[test]
    fn test_validate_retry_delay_too_high() {
        let mut config = Config::default();
        config.pixlet.retry_delay_secs = 301;
        assert_validation_error(&config, &["retry_delay_secs", "300"]);
    }

    #[test]
    fn test_validate_reserved_app_config_key() {
        let mut config = Config::default();
        config
            .app_config
            .insert("$asset_url".to_owned(), "http://x/".to_owned());
        assert_validation_error(&config, &["$asset_url", "reserved"]);
    }
}
