use serde::{Deserialize, Serialize};

/// A single file found by a discovery strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredItem {
    pub file_path: String,
    pub extracted_title: String,

    /// Filled in by fuzzy matching when it is enabled for the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_title: Option<String>,
}

impl DiscoveredItem {
    pub fn new(file_path: impl Into<String>, extracted_title: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            extracted_title: extracted_title.into(),
            fuzzy_title: None,
        }
    }
}

/// Output of one strategy execution: ordered successes plus raw inputs it could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub success: Vec<DiscoveredItem>,
    pub failed: Vec<String>,
}

/// An account found under an account root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub name: String,
    #[serde(rename = "accountID")]
    pub account_id: String,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_id: account_id.into(),
        }
    }
}

/// Enriched per-file record produced by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub executable_location: String,
    pub start_in_directory: String,
    pub argument_string: String,
    pub extracted_title: String,
    pub fuzzy_title: String,
    pub final_title: String,
    pub fuzzy_final_title: String,
    pub file_path: String,

    /// Globs that were evaluated for the local image field.
    pub resolved_local_images: Vec<String>,
    /// Matching image files as `file://` URIs.
    pub local_images: Vec<String>,
    pub resolved_local_icons: Vec<String>,
    pub local_icons: Vec<String>,

    pub online_image_queries: Vec<String>,
}

/// Per-configuration aggregate, index-aligned with the input configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfiguration {
    pub steam_categories: Vec<String>,
    pub append_args_to_executable: bool,
    pub image_providers: Vec<String>,
    pub steam_directory: String,
    pub found_user_accounts: Vec<UserAccount>,
    pub missing_user_accounts: Vec<String>,
    pub files: Vec<OutputFile>,
    pub failed: Vec<String>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub results: Vec<OutputConfiguration>,
    /// True when no configuration found a single account; callers warn on this.
    pub no_accounts_found: bool,
}
