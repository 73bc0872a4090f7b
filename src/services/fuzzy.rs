//! Fuzzy title normalization.
//!
//! The pipeline only depends on the [`FuzzyMatcher`] contract. [`TitleNormalizer`] is the
//! built-in implementation: it strips decorations from titles so that `Chrono Trigger (USA) [!]`
//! and `Chrono Trigger` compare equal.

use crate::models::DiscoveryResult;
use regex::Regex;

pub trait FuzzyMatcher: Send + Sync {
    /// Normalized form of `title`.
    fn fuzzy_match_string(&self, title: &str, remove_characters: bool, remove_brackets: bool)
    -> String;

    /// Attach a fuzzy title to every successful item in place.
    fn fuzzy_match_parsed_data(
        &self,
        data: &mut DiscoveryResult,
        remove_characters: bool,
        remove_brackets: bool,
    ) {
        for item in &mut data.success {
            item.fuzzy_title = Some(self.fuzzy_match_string(
                &item.extracted_title,
                remove_characters,
                remove_brackets,
            ));
        }
    }
}

/// Regex-based title normalizer.
pub struct TitleNormalizer {
    /// `(...)`, `[...]` and `{...}` groups, with the whitespace before them
    brackets: Regex,
    /// Anything that is not a letter, digit or whitespace
    characters: Regex,
    whitespace: Regex,
}

impl TitleNormalizer {
    pub fn new() -> Self {
        Self {
            brackets: Regex::new(r"\s*(?:\([^)]*\)|\[[^\]]*\]|\{[^}]*\})")
                .expect("Invalid bracket regex"),
            characters: Regex::new(r"[^\p{L}\p{N}\s]").expect("Invalid character regex"),
            whitespace: Regex::new(r"\s+").expect("Invalid whitespace regex"),
        }
    }
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher for TitleNormalizer {
    fn fuzzy_match_string(
        &self,
        title: &str,
        remove_characters: bool,
        remove_brackets: bool,
    ) -> String {
        let mut output = title.to_string();

        if remove_brackets {
            output = self.brackets.replace_all(&output, "").into_owned();
        }
        if remove_characters {
            output = self.characters.replace_all(&output, "").into_owned();
        }

        self.whitespace.replace_all(output.trim(), " ").into_owned()
    }
}
