//! Data models for romscout.
//!
//! - [`Configuration`]: one discovery job as loaded from the configurations YAML file
//! - [`DiscoveryResult`] / [`DiscoveredItem`]: raw output of a discovery strategy
//! - [`UserAccount`]: an account found under an account root directory
//! - [`OutputConfiguration`] / [`OutputFile`]: the enriched records a run returns
//! - [`Settings`]: application settings (logging, timeouts)
//!
//! Everything here derives `Serialize`/`Deserialize` so configurations can be read from YAML and
//! run results can be written back out.

pub mod configuration;
pub mod parsed;
pub mod settings;

pub use configuration::{Configuration, FuzzyMatchSettings, UserAccountSettings};
pub use parsed::{
    DiscoveredItem, DiscoveryResult, OutputConfiguration, OutputFile, RunOutput, UserAccount,
};
pub use settings::Settings;
