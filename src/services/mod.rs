//! Services module - the discovery and templating pipeline.
//!
//! Everything here is framework-agnostic: no CLI, no logging setup, only the logic that turns
//! configurations into enriched file records.
//!
//! # Components
//!
//! - [`Pipeline`]: the orchestrator and the only entry point a caller needs.
//! - [`variables`]: the `${...}` template language and the per-file variable namespace.
//! - [`parsers`]: the [`DiscoveryStrategy`] contract, the [`ParserRegistry`], the built-in
//!   `Glob` / `Glob-regex` strategies and the run-scoped [`DiscoveryCache`].
//! - [`accounts`]: account discovery ([`AccountProvider`]) and allow-list filtering.
//! - [`assets`]: local image and icon resolution in literal or parser-assisted mode.
//! - [`fuzzy`]: the [`FuzzyMatcher`] contract and the default [`TitleNormalizer`].
//!
//! # Usage Example
//!
//! ```ignore
//! use romscout::services::Pipeline;
//!
//! let pipeline = Pipeline::with_defaults();
//! let output = pipeline.run(&configurations).await?;
//! for result in &output.results {
//!     println!("{} file(s)", result.files.len());
//! }
//! ```

pub mod accounts;
pub mod assets;
pub mod error;
pub mod fuzzy;
pub mod parsers;
pub mod paths;
pub mod pipeline;
pub mod variables;

pub use accounts::{AccountProvider, FilteredAccounts, UserdataAccountProvider, filter_user_accounts};
pub use assets::{AssetField, AssetResolver, ExpandableSet, ResolvedAssets};
pub use error::{PipelineError, PipelineResult};
pub use fuzzy::{FuzzyMatcher, TitleNormalizer};
pub use parsers::{
    DiscoveryCache, DiscoveryStrategy, GlobOptions, ParserInfo, ParserInput, ParserRegistry,
};
pub use pipeline::{Pipeline, PipelineOptions};
pub use variables::{TemplateField, Variable, VariableContext, VariableParser};
