//! Discovery strategies ("parsers") and the registry that looks them up by identifier.
//!
//! A strategy declares its inputs through [`ParserInfo`] and turns a scan directory plus input
//! values into a [`DiscoveryResult`]. All strategies of a run share one [`DiscoveryCache`].
//!
//! Two strategies are built in because the asset resolver delegates to them directly:
//! - [`GlobParser`] (`Glob`, input `glob`): titles come from a `${title}` token in a glob
//! - [`GlobRegexParser`] (`Glob-regex`, input `glob-regex`): titles come from a `${/regex/}` token

pub mod cache;
pub mod glob_regex;
pub mod glob_title;

pub use self::cache::{DiscoveryCache, GlobOptions};
pub use self::glob_regex::GlobRegexParser;
pub use self::glob_title::GlobParser;

use crate::models::DiscoveryResult;
use crate::services::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const GLOB_PARSER: &str = "Glob";
pub const GLOB_REGEX_PARSER: &str = "Glob-regex";
pub const GLOB_INPUT: &str = "glob";
pub const GLOB_REGEX_INPUT: &str = "glob-regex";

/// A declared input of a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserInput {
    pub label: String,
    /// When set (and non-empty) this value replaces whatever the configuration supplies.
    pub forced_input: Option<String>,
}

/// Metadata a strategy publishes about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserInfo {
    pub title: String,
    pub inputs: IndexMap<String, ParserInput>,
}

impl ParserInfo {
    /// Apply forced values and default unset declared inputs to the empty string.
    pub fn normalize_inputs(&self, supplied: &IndexMap<String, String>) -> IndexMap<String, String> {
        let mut inputs = supplied.clone();

        for (name, input) in &self.inputs {
            match input.forced_input.as_deref() {
                Some(forced) if !forced.is_empty() => {
                    inputs.insert(name.clone(), forced.to_string());
                }
                _ => {
                    inputs.entry(name.clone()).or_default();
                }
            }
        }

        inputs
    }
}

/// A pluggable scanning strategy.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn info(&self) -> ParserInfo;

    async fn execute(
        &self,
        directory: &str,
        inputs: &IndexMap<String, String>,
        cache: &DiscoveryCache,
    ) -> PipelineResult<DiscoveryResult>;
}

/// Strategies keyed by identifier. Registered at startup, read-only during a run.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DiscoveryStrategy>>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `Glob` and `Glob-regex` strategies.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(GLOB_PARSER, GlobParser);
        registry.register(GLOB_REGEX_PARSER, GlobRegexParser);
        registry
    }

    /// Register a strategy, replacing any previous one with the same identifier.
    pub fn register<S>(&mut self, id: impl Into<String>, strategy: S) -> Option<Arc<dyn DiscoveryStrategy>>
    where
        S: DiscoveryStrategy + 'static,
    {
        self.parsers.insert(id.into(), Arc::new(strategy))
    }

    pub fn get(&self, id: &str) -> PipelineResult<Arc<dyn DiscoveryStrategy>> {
        self.parsers
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::ParserNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parsers.contains_key(id)
    }

    pub fn parser_info(&self, id: &str) -> Option<ParserInfo> {
        self.parsers.get(id).map(|parser| parser.info())
    }

    /// Registered identifiers, sorted.
    pub fn available_parsers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.parsers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.available_parsers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(inputs: &[(&str, Option<&str>)]) -> ParserInfo {
        ParserInfo {
            title: "Test".to_string(),
            inputs: inputs
                .iter()
                .map(|(name, forced)| {
                    (
                        name.to_string(),
                        ParserInput {
                            label: name.to_string(),
                            forced_input: forced.map(str::to_string),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_forced_input_overrides_supplied() {
        let info = info_with(&[("glob", Some("**/*.iso"))]);
        let mut supplied = IndexMap::new();
        supplied.insert("glob".to_string(), "${title}.bin".to_string());

        let inputs = info.normalize_inputs(&supplied);
        assert_eq!(inputs.get("glob").unwrap(), "**/*.iso");
    }

    #[test]
    fn test_unset_input_defaults_to_empty() {
        let info = info_with(&[("glob", None), ("extra", Some(""))]);
        let inputs = info.normalize_inputs(&IndexMap::new());

        assert_eq!(inputs.get("glob").unwrap(), "");
        assert_eq!(inputs.get("extra").unwrap(), "");
    }

    #[test]
    fn test_supplied_value_kept_without_force() {
        let info = info_with(&[("glob", None)]);
        let mut supplied = IndexMap::new();
        supplied.insert("glob".to_string(), "${title}.sfc".to_string());
        supplied.insert("undeclared".to_string(), "x".to_string());

        let inputs = info.normalize_inputs(&supplied);
        assert_eq!(inputs.get("glob").unwrap(), "${title}.sfc");
        assert_eq!(inputs.get("undeclared").unwrap(), "x");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ParserRegistry::with_builtin();
        assert!(registry.contains(GLOB_PARSER));
        assert!(registry.get(GLOB_REGEX_PARSER).is_ok());
        assert_eq!(registry.available_parsers(), vec!["Glob", "Glob-regex"]);

        match registry.get("Steam") {
            Err(PipelineError::ParserNotFound(name)) => assert_eq!(name, "Steam"),
            other => panic!("unexpected lookup result: {:?}", other.map(|p| p.info())),
        }
    }

    #[test]
    fn test_parser_info_declares_inputs() {
        let registry = ParserRegistry::with_builtin();
        let info = registry.parser_info(GLOB_PARSER).unwrap();
        assert!(info.inputs.contains_key(GLOB_INPUT));
        let info = registry.parser_info(GLOB_REGEX_PARSER).unwrap();
        assert!(info.inputs.contains_key(GLOB_REGEX_INPUT));
    }
}
