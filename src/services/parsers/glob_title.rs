use super::{DiscoveryCache, DiscoveryStrategy, GLOB_INPUT, GlobOptions, ParserInfo, ParserInput};
use crate::models::{DiscoveredItem, DiscoveryResult};
use crate::services::error::{PipelineError, PipelineResult};
use crate::services::paths::resolve_path;
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;

const TITLE_TOKEN: &str = "${title}";

/// Stand-in for the title slot while the pattern is resolved to an absolute path.
const TITLE_PLACEHOLDER: &str = "\u{1}title\u{1}";

/// Strategy that globs for files and takes the title from the `${title}` slot.
///
/// `${title}.sfc` under `/roms/snes` matches `/roms/snes/*.sfc`; for
/// `/roms/snes/Chrono Trigger.sfc` the title is `Chrono Trigger`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobParser;

#[async_trait]
impl DiscoveryStrategy for GlobParser {
    fn info(&self) -> ParserInfo {
        let mut inputs = IndexMap::new();
        inputs.insert(
            GLOB_INPUT.to_string(),
            ParserInput {
                label: "Glob with a single ${title} token".to_string(),
                forced_input: None,
            },
        );
        ParserInfo {
            title: "Glob".to_string(),
            inputs,
        }
    }

    async fn execute(
        &self,
        directory: &str,
        inputs: &IndexMap<String, String>,
        cache: &DiscoveryCache,
    ) -> PipelineResult<DiscoveryResult> {
        let raw = inputs.get(GLOB_INPUT).map(String::as_str).unwrap_or_default();

        let Some((before, after)) = split_title_token(raw) else {
            tracing::warn!("Glob \"{}\" must contain exactly one {} token", raw, TITLE_TOKEN);
            return Ok(unresolved(raw));
        };
        let Some(title_glob) = TitleGlob::new(directory, before, after)? else {
            return Ok(unresolved(raw));
        };

        let files = cache.glob(title_glob.pattern(), GlobOptions::parser()).await?;

        let mut result = DiscoveryResult::default();
        for file in files.iter() {
            match title_glob.capture(file) {
                Some(title) if !title.is_empty() => {
                    result.success.push(DiscoveredItem::new(file.clone(), title));
                }
                _ => result.failed.push(file.clone()),
            }
        }

        tracing::debug!(
            "Glob parser: {} title(s), {} failed for {}",
            result.success.len(),
            result.failed.len(),
            title_glob.pattern()
        );
        Ok(result)
    }
}

pub(crate) fn unresolved(raw: &str) -> DiscoveryResult {
    DiscoveryResult {
        success: Vec::new(),
        failed: vec![raw.to_string()],
    }
}

/// Split a glob around its only `${title}` token (case-insensitive).
fn split_title_token(raw: &str) -> Option<(&str, &str)> {
    let lower = raw.to_ascii_lowercase();
    let mut positions = lower.match_indices(TITLE_TOKEN).map(|(index, _)| index);
    let index = positions.next()?;
    if positions.next().is_some() {
        return None;
    }
    Some((&raw[..index], &raw[index + TITLE_TOKEN.len()..]))
}

/// An absolute glob with one slot whose matched text can be read back from each path.
#[derive(Debug, Clone)]
pub(crate) struct TitleGlob {
    pattern: String,
    extractor: Regex,
}

impl TitleGlob {
    /// Build from the pattern text before and after the slot, relative to `directory`.
    ///
    /// Returns `None` when path resolution swallows the slot (e.g. `${title}/..`).
    pub(crate) fn new(directory: &str, before: &str, after: &str) -> PipelineResult<Option<Self>> {
        let absolute = resolve_path(directory, &format!("{before}{TITLE_PLACEHOLDER}{after}"));
        let Some((prefix, suffix)) = absolute.split_once(TITLE_PLACEHOLDER) else {
            return Ok(None);
        };

        let expression = format!(
            "(?i)^{}([^/]*){}$",
            glob_to_regex(prefix),
            glob_to_regex(suffix)
        );
        let extractor = Regex::new(&expression).map_err(|source| PipelineError::InvalidRegex {
            pattern: expression.clone(),
            source,
        })?;

        Ok(Some(Self {
            pattern: format!("{prefix}*{suffix}"),
            extractor,
        }))
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Text matched by the slot in `path`.
    pub(crate) fn capture<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.extractor
            .captures(path)?
            .get(1)
            .map(|slot| slot.as_str())
    }
}

/// Translate glob syntax into an equivalent regex fragment without capture groups.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                if chars.get(i) == Some(&'/') {
                    out.push_str("(?:[^/]*/)*");
                    i += 1;
                } else {
                    out.push_str(".*");
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                // `]` right after the opening bracket (or `[!`) is a literal member.
                let body_start = if chars.get(i + 1) == Some(&'!') { i + 2 } else { i + 1 };
                let close = chars
                    .iter()
                    .skip(body_start + 1)
                    .position(|c| *c == ']')
                    .map(|offset| body_start + 1 + offset);

                match close {
                    Some(close) if body_start < chars.len() => {
                        out.push('[');
                        if body_start == i + 2 {
                            out.push('^');
                        }
                        for c in &chars[body_start..close] {
                            if *c == '-' {
                                out.push('-');
                            } else {
                                out.push_str(&regex::escape(&c.to_string()));
                            }
                        }
                        out.push(']');
                        i = close + 1;
                        continue;
                    }
                    _ => out.push_str(r"\["),
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root(dir: &TempDir) -> String {
        dir.path().to_str().unwrap().replace('\\', "/")
    }

    fn glob_inputs(glob: &str) -> IndexMap<String, String> {
        let mut inputs = IndexMap::new();
        inputs.insert(GLOB_INPUT.to_string(), glob.to_string());
        inputs
    }

    #[test]
    fn test_split_title_token() {
        assert_eq!(split_title_token("${title}.sfc"), Some(("", ".sfc")));
        assert_eq!(split_title_token("a/${TITLE}/b"), Some(("a/", "/b")));
        assert_eq!(split_title_token("*.sfc"), None);
        assert_eq!(split_title_token("${title}-${title}"), None);
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("a*.b"), r"a[^/]*\.b");
        assert_eq!(glob_to_regex("**/x?"), r"(?:[^/]*/)*x[^/]");
        assert_eq!(glob_to_regex("[!ab]"), "[^ab]");
        assert_eq!(glob_to_regex("[a-c]"), "[a-c]");
        assert_eq!(glob_to_regex("(x)"), r"\(x\)");
        assert_eq!(glob_to_regex("[oops"), r"\[oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_title_glob_capture() {
        let title_glob = TitleGlob::new("/roms", "**/", ".sfc").unwrap().unwrap();
        assert_eq!(title_glob.pattern(), "/roms/**/*.sfc");
        assert_eq!(
            title_glob.capture("/roms/usa/Chrono Trigger (USA).sfc"),
            Some("Chrono Trigger (USA)")
        );
        assert_eq!(title_glob.capture("/other/Foo.sfc"), None);
    }

    #[tokio::test]
    async fn test_glob_parser_extracts_titles() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Foo.sfc"), b"").unwrap();
        fs::write(dir.path().join("Bar.SFC"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let cache = DiscoveryCache::new();
        let result = GlobParser
            .execute(&root(&dir), &glob_inputs("${title}.sfc"), &cache)
            .await
            .unwrap();

        let mut titles: Vec<_> = result.success.iter().map(|i| i.extracted_title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Bar", "Foo"]);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn test_glob_parser_without_token_fails_input() {
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new();
        let result = GlobParser
            .execute(&root(&dir), &glob_inputs("*.sfc"), &cache)
            .await
            .unwrap();

        assert!(result.success.is_empty());
        assert_eq!(result.failed, vec!["*.sfc"]);
        assert_eq!(cache.scan_count(), 0);
    }
}
