use crate::models::{Configuration, Settings};
use ::config::{Config, Environment, File};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

const CONFIGURATIONS_FILE: &str = "configurations.yaml";
const SETTINGS_FILE: &str = "romscout.yaml";
const ENV_PREFIX: &str = "ROMSCOUT";

/// Configuration manager for the discovery configurations and application settings.
///
/// Manages two files in one directory:
/// - `configurations.yaml`: the ordered list of discovery configurations
/// - `romscout.yaml`: application settings, overridable by `ROMSCOUT_*` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    configurations_path: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            configurations_path: config_dir.join(CONFIGURATIONS_FILE),
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Read configurations from a different file than the default one.
    pub fn with_configurations_path<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.configurations_path = path.as_ref().to_path_buf();
        self
    }

    /// Load the configuration list.
    ///
    /// # Returns
    /// The configurations in file order, or an empty list if the file doesn't exist
    pub fn load_configurations(&self) -> Result<Vec<Configuration>> {
        if !self.configurations_path.exists() {
            tracing::warn!(
                "Configuration file not found at {}, nothing to run",
                self.configurations_path
            );
            return Ok(Vec::new());
        }

        let file_contents = fs::read_to_string(&self.configurations_path).with_context(|| {
            format!("Failed to read configurations: {}", self.configurations_path)
        })?;

        let configurations: Vec<Configuration> = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| {
                format!("Failed to parse configurations: {}", self.configurations_path)
            })?;

        tracing::info!(
            "Loaded {} configuration(s) from {}",
            configurations.len(),
            self.configurations_path
        );
        Ok(configurations)
    }

    /// Save the configuration list.
    pub fn save_configurations(&self, configurations: &[Configuration]) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(configurations)
            .context("Failed to serialize configurations to YAML")?;

        fs::write(&self.configurations_path, yaml_string).with_context(|| {
            format!("Failed to write configurations: {}", self.configurations_path)
        })?;

        tracing::info!("Saved configurations to {}", self.configurations_path);
        Ok(())
    }

    /// Load application settings: defaults, then `romscout.yaml`, then `ROMSCOUT_*` variables.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn load_settings_with(&self, environment: Environment) -> Result<Settings> {
        let settings = Config::builder()
            .add_source(File::from(self.settings_path.as_std_path()).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize::<Settings>()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        Ok(settings)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn configurations_path(&self) -> &Utf8Path {
        &self.configurations_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    fn no_environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(Default::default()))
    }

    #[test]
    fn test_missing_configurations_file_is_empty() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.load_configurations().unwrap().is_empty());
    }

    #[test]
    fn test_load_save_configurations() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut snes = Configuration::new("/roms/snes", "Glob");
        snes.parser_inputs
            .insert("glob".to_string(), "${title}.sfc".to_string());
        let mut gba = Configuration::new("/roms/gba", "Glob-regex");
        gba.enabled = false;

        manager.save_configurations(&[snes.clone(), gba.clone()]).unwrap();
        let loaded = manager.load_configurations().unwrap();

        assert_eq!(loaded, vec![snes, gba]);
    }

    #[test]
    fn test_invalid_configurations_file_is_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.configurations_path(), "- parserType: [unclosed").unwrap();

        let error = manager.load_configurations().unwrap_err();
        assert!(format!("{:#}", error).contains("Failed to parse configurations"));
    }

    #[test]
    fn test_settings_defaults_without_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = manager.load_settings_with(no_environment()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_file_and_environment_layers() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(
            manager.config_dir().join(SETTINGS_FILE),
            "log_dir: custom-logs\noperation_timeout_secs: 30\n",
        )
        .unwrap();

        let environment = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(
                [("ROMSCOUT_DEBUG_MODE".to_string(), "true".to_string())]
                    .into_iter()
                    .collect(),
            ));
        let settings = manager.load_settings_with(environment).unwrap();

        assert_eq!(settings.log_dir, "custom-logs");
        assert!(settings.debug_mode);
        assert_eq!(settings.operation_timeout(), Some(Duration::from_secs(30)));
    }
}
