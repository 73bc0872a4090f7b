use super::glob_title::{TitleGlob, unresolved};
use super::{
    DiscoveryCache, DiscoveryStrategy, GLOB_REGEX_INPUT, GlobOptions, ParserInfo, ParserInput,
};
use crate::models::{DiscoveredItem, DiscoveryResult};
use crate::services::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;

const REGEX_TOKEN_OPEN: &str = "${/";
const REGEX_TOKEN_CLOSE: &str = "/}";

/// Strategy that globs with a wildcard in place of a `${/regex/}` token and reads the title
/// out of that path segment with the regex.
///
/// The title is capture group 1 when the regex has one, otherwise the whole match. Files whose
/// segment does not match are reported as failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobRegexParser;

#[async_trait]
impl DiscoveryStrategy for GlobRegexParser {
    fn info(&self) -> ParserInfo {
        let mut inputs = IndexMap::new();
        inputs.insert(
            GLOB_REGEX_INPUT.to_string(),
            ParserInput {
                label: "Glob with a single ${/regex/} token".to_string(),
                forced_input: None,
            },
        );
        ParserInfo {
            title: "Glob-regex".to_string(),
            inputs,
        }
    }

    async fn execute(
        &self,
        directory: &str,
        inputs: &IndexMap<String, String>,
        cache: &DiscoveryCache,
    ) -> PipelineResult<DiscoveryResult> {
        let raw = inputs
            .get(GLOB_REGEX_INPUT)
            .map(String::as_str)
            .unwrap_or_default();

        let Some((before, expression, after)) = split_regex_token(raw) else {
            tracing::warn!(
                "Glob \"{}\" must contain exactly one {}regex{} token",
                raw,
                REGEX_TOKEN_OPEN,
                REGEX_TOKEN_CLOSE
            );
            return Ok(unresolved(raw));
        };

        let title_regex = Regex::new(expression).map_err(|source| PipelineError::InvalidRegex {
            pattern: expression.to_string(),
            source,
        })?;
        let Some(title_glob) = TitleGlob::new(directory, before, after)? else {
            return Ok(unresolved(raw));
        };

        let files = cache.glob(title_glob.pattern(), GlobOptions::parser()).await?;

        let mut result = DiscoveryResult::default();
        for file in files.iter() {
            let title = title_glob
                .capture(file)
                .and_then(|segment| extract_title(&title_regex, segment));

            match title {
                Some(title) => result.success.push(DiscoveredItem::new(file.clone(), title)),
                None => result.failed.push(file.clone()),
            }
        }

        tracing::debug!(
            "Glob-regex parser: {} title(s), {} failed for {}",
            result.success.len(),
            result.failed.len(),
            title_glob.pattern()
        );
        Ok(result)
    }
}

/// Split a glob into the text before, the regex inside, and the text after its `${/.../}` token.
fn split_regex_token(raw: &str) -> Option<(&str, &str, &str)> {
    let start = raw.find(REGEX_TOKEN_OPEN)?;
    let body_start = start + REGEX_TOKEN_OPEN.len();
    let body_len = raw[body_start..].find(REGEX_TOKEN_CLOSE)?;
    let after = &raw[body_start + body_len + REGEX_TOKEN_CLOSE.len()..];

    if after.contains(REGEX_TOKEN_OPEN) {
        return None;
    }
    Some((&raw[..start], &raw[body_start..body_start + body_len], after))
}

fn extract_title(regex: &Regex, segment: &str) -> Option<String> {
    let captures = regex.captures(segment)?;
    let title = captures.get(1).or_else(|| captures.get(0))?.as_str();
    (!title.is_empty()).then(|| title.to_string())
}
