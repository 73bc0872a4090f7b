use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One discovery job, as stored in the configurations YAML file.
///
/// The pipeline never mutates a `Configuration`; parser input defaults and forced values are
/// applied to a copy of [`parser_inputs`](Self::parser_inputs) when the run starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub config_title: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory the parser scans; also the base for relative asset globs.
    #[serde(default)]
    pub rom_directory: String,

    /// Registry identifier of the discovery strategy (e.g. `Glob`).
    pub parser_type: String,

    #[serde(default)]
    pub parser_inputs: IndexMap<String, String>,

    /// Root of the account store (`<steamDirectory>/userdata/<accountID>`).
    #[serde(default)]
    pub steam_directory: String,

    #[serde(default)]
    pub user_accounts: UserAccountSettings,

    #[serde(default)]
    pub fuzzy_match: FuzzyMatchSettings,

    #[serde(default = "default_title_modifier")]
    pub title_modifier: String,

    #[serde(default)]
    pub executable_args: String,

    #[serde(default)]
    pub executable_location: String,

    #[serde(default)]
    pub start_in_directory: String,

    #[serde(default)]
    pub local_images: String,

    #[serde(default)]
    pub local_icons: String,

    #[serde(default = "default_online_image_queries")]
    pub online_image_queries: String,

    /// Category labels as a `${A}${B}` list template.
    #[serde(default)]
    pub steam_category: String,

    #[serde(default)]
    pub append_args_to_executable: bool,

    #[serde(default)]
    pub image_providers: Vec<String>,
}

/// Account filter settings for a configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAccountSettings {
    /// Allow-list of account names as a `${Alice}${Bob}` list template. Empty means everyone.
    #[serde(default)]
    pub specified_accounts: String,

    #[serde(default)]
    pub skip_with_missing_data_dir: bool,

    #[serde(default)]
    pub use_credentials: bool,
}

/// Fuzzy title normalization settings for a configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyMatchSettings {
    #[serde(rename = "use", default)]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub remove_characters: bool,

    #[serde(default = "default_true")]
    pub remove_brackets: bool,
}

impl Default for FuzzyMatchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            remove_characters: true,
            remove_brackets: true,
        }
    }
}

impl Configuration {
    /// Create a configuration with the given scan directory and parser, everything else default.
    pub fn new(rom_directory: impl Into<String>, parser_type: impl Into<String>) -> Self {
        Self {
            config_title: String::new(),
            enabled: true,
            rom_directory: rom_directory.into(),
            parser_type: parser_type.into(),
            parser_inputs: IndexMap::new(),
            steam_directory: String::new(),
            user_accounts: UserAccountSettings::default(),
            fuzzy_match: FuzzyMatchSettings::default(),
            title_modifier: default_title_modifier(),
            executable_args: String::new(),
            executable_location: String::new(),
            start_in_directory: String::new(),
            local_images: String::new(),
            local_icons: String::new(),
            online_image_queries: default_online_image_queries(),
            steam_category: String::new(),
            append_args_to_executable: false,
            image_providers: Vec::new(),
        }
    }

    /// Label used in log lines: the title when set, otherwise the parser and directory.
    pub fn display_name(&self) -> String {
        if self.config_title.is_empty() {
            format!("{} @ {}", self.parser_type, self.rom_directory)
        } else {
            self.config_title.clone()
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_title_modifier() -> String {
    "${title}".to_string()
}

fn default_online_image_queries() -> String {
    "${${fuzzyTitle}}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::new("/roms", "Glob");
        assert!(config.enabled);
        assert_eq!(config.title_modifier, "${title}");
        assert_eq!(config.online_image_queries, "${${fuzzyTitle}}");
        assert!(!config.fuzzy_match.enabled);
        assert!(config.fuzzy_match.remove_brackets);
    }

    #[test]
    fn test_deserialize_minimal_yaml() {
        let yaml = r#"
parserType: Glob
romDirectory: /roms/snes
parserInputs:
  glob: "${title}.sfc"
fuzzyMatch:
  use: true
"#;
        let config: Configuration = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.parser_type, "Glob");
        assert_eq!(config.parser_inputs.get("glob").unwrap(), "${title}.sfc");
        assert!(config.fuzzy_match.enabled);
        assert!(config.fuzzy_match.remove_characters);
        assert!(config.enabled);
        assert_eq!(config.title_modifier, "${title}");
    }

    #[test]
    fn test_display_name() {
        let mut config = Configuration::new("/roms", "Glob");
        assert_eq!(config.display_name(), "Glob @ /roms");
        config.config_title = "SNES".to_string();
        assert_eq!(config.display_name(), "SNES");
    }
}
