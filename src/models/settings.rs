use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings, layered from `romscout.yaml` and `ROMSCOUT_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default)]
    pub console_logging: bool,

    /// Upper bound for each parser execution and account discovery. Unset means wait forever.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            debug_mode: false,
            console_logging: false,
            operation_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "romscout".to_string()
}
