//! Local image and icon resolution.
//!
//! An asset field is either a plain glob template (`art/${title}.png`) or contains an
//! expandable set `$(<primary>|<secondary>)$`:
//!
//! - **Literal mode**: the template is resolved for the file, made absolute against the scan
//!   directory and globbed. Every match is kept.
//! - **Parser-assisted mode**: the primary token (`${title}` or `${/regex/}`) is handed to the
//!   `Glob` or `Glob-regex` strategy, and only candidates whose title matches the file's title
//!   are kept. The optional secondary part is globbed literally and unioned in.

use crate::models::{Configuration, OutputFile};
use crate::services::error::{PipelineError, PipelineResult};
use crate::services::fuzzy::FuzzyMatcher;
use crate::services::parsers::{
    DiscoveryCache, GLOB_INPUT, GLOB_PARSER, GLOB_REGEX_INPUT, GLOB_REGEX_PARSER, GlobOptions,
    ParserRegistry,
};
use crate::services::paths::{real_path, resolve_path, to_forward_slashes};
use crate::services::variables::{TemplateField, VariableContext, replace_variables};
use camino::Utf8Path;
use futures::future::{join_all, try_join_all};
use indexmap::{IndexMap, IndexSet};
use url::Url;

/// Extensions accepted as local images (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "tga", "jpg", "jpeg"];

const EXPANDABLE_PLACEHOLDER: &str = "$()$";
const SET_OPEN: &str = "$(";
const SET_CLOSE: &str = ")$";
const TITLE_TOKEN: &str = "${title}";

/// A `$(<primary>|<secondary>)$` occurrence inside a field template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandableSet<'a> {
    /// Byte range of the whole `$(...)$` text in the template.
    pub start: usize,
    pub end: usize,
    /// The token handed to a strategy, e.g. `${title}`.
    pub primary: &'a str,
    /// Literal glob text unioned with the strategy's matches.
    pub secondary: Option<&'a str>,
}

impl<'a> ExpandableSet<'a> {
    /// Find the first expandable set in `template`.
    ///
    /// The primary part must be a `${...}` token with a non-empty body and ends at the first `}`
    /// that lets the rest of the set close. The secondary part runs to the last `)$`.
    pub fn parse(template: &'a str) -> Option<Self> {
        for (start, _) in template.match_indices(SET_OPEN) {
            let body_start = start + SET_OPEN.len();
            let body = &template[body_start..];
            if !body.starts_with("${") {
                continue;
            }

            for (close, _) in body.match_indices('}').filter(|(index, _)| *index >= 3) {
                let primary = &body[..=close];
                let rest = &body[close + 1..];

                if let Some(alternative) = rest.strip_prefix('|') {
                    if let Some(end) = alternative.rfind(SET_CLOSE).filter(|end| *end > 0) {
                        return Some(Self {
                            start,
                            end: body_start + close + 2 + end + SET_CLOSE.len(),
                            primary,
                            secondary: Some(&alternative[..end]),
                        });
                    }
                }

                if rest.starts_with(SET_CLOSE) {
                    return Some(Self {
                        start,
                        end: body_start + close + 1 + SET_CLOSE.len(),
                        primary,
                        secondary: None,
                    });
                }
            }
        }

        None
    }

    /// `template` with this set replaced by `replacement`.
    pub fn replace_in(&self, template: &str, replacement: &str) -> String {
        format!(
            "{}{}{}",
            &template[..self.start],
            replacement,
            &template[self.end..]
        )
    }

    /// True when the primary token is the title token, which selects the `Glob` strategy.
    pub fn primary_is_title(&self) -> bool {
        self.primary.to_ascii_lowercase().contains(TITLE_TOKEN)
    }
}

/// The asset fields of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetField {
    LocalImages,
    LocalIcons,
}

impl AssetField {
    pub fn template(self, config: &Configuration) -> &str {
        match self {
            AssetField::LocalImages => &config.local_images,
            AssetField::LocalIcons => &config.local_icons,
        }
    }

    pub fn depth(self) -> usize {
        match self {
            AssetField::LocalImages => TemplateField::LocalImages.depth(),
            AssetField::LocalIcons => TemplateField::LocalIcons.depth(),
        }
    }
}

/// Globs evaluated for one file and the files they produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub globs: Vec<String>,
    pub files: Vec<String>,
}

/// Resolves asset fields against the shared run cache.
pub struct AssetResolver<'a> {
    registry: &'a ParserRegistry,
    fuzzy: &'a dyn FuzzyMatcher,
    cache: &'a DiscoveryCache,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        registry: &'a ParserRegistry,
        fuzzy: &'a dyn FuzzyMatcher,
        cache: &'a DiscoveryCache,
    ) -> Self {
        Self {
            registry,
            fuzzy,
            cache,
        }
    }

    /// Resolve `field` for every file of a configuration, index-aligned with `files`.
    pub async fn resolve_field(
        &self,
        field: AssetField,
        config: &Configuration,
        files: &[OutputFile],
    ) -> PipelineResult<Vec<ResolvedAssets>> {
        let template = field.template(config);
        if template.is_empty() {
            return Ok(vec![ResolvedAssets::default(); files.len()]);
        }

        try_join_all(
            files
                .iter()
                .map(|file| self.resolve_file(template, field.depth(), config, file)),
        )
        .await
    }

    async fn resolve_file(
        &self,
        template: &str,
        depth: usize,
        config: &Configuration,
        file: &OutputFile,
    ) -> PipelineResult<ResolvedAssets> {
        let context = VariableContext::new(config, file);
        let root = config.rom_directory.as_str();

        let Some(set) = ExpandableSet::parse(template) else {
            let glob = resolve_path(root, &replace_variables(template, &context, depth));
            let files = self.cache.glob(&glob, GlobOptions::assets()).await?;
            return Ok(ResolvedAssets {
                globs: vec![glob],
                files: files.to_vec(),
            });
        };

        // The placeholder keeps the primary token away from variable expansion and path
        // normalization.
        let with_placeholder = set.replace_in(template, EXPANDABLE_PLACEHOLDER);
        let parser_glob = resolve_path(root, &replace_variables(&with_placeholder, &context, depth))
            .replacen(EXPANDABLE_PLACEHOLDER, set.primary, 1);

        let secondary_glob = set.secondary.map(|secondary| {
            resolve_path(
                root,
                &replace_variables(&set.replace_in(template, secondary), &context, depth),
            )
        });

        let (parser_id, input_name) = if set.primary_is_title() {
            (GLOB_PARSER, GLOB_INPUT)
        } else {
            (GLOB_REGEX_PARSER, GLOB_REGEX_INPUT)
        };
        let parser = self.registry.get(parser_id)?;
        let mut inputs = IndexMap::new();
        inputs.insert(input_name.to_string(), parser_glob.clone());

        let candidates = parser.execute(root, &inputs, self.cache).await?;

        // Strategy matches keep the pattern's path form; the union is keyed on real paths.
        let matched = candidates
            .success
            .iter()
            .filter(|candidate| self.title_matches(config, file, &candidate.extracted_title))
            .map(|candidate| real_path(&candidate.file_path));
        let mut files: IndexSet<String> = join_all(matched).await.into_iter().collect();

        let mut globs = vec![parser_glob];
        if let Some(secondary_glob) = secondary_glob {
            let secondary_files = self
                .cache
                .glob(&secondary_glob, GlobOptions::assets())
                .await?;
            files.extend(secondary_files.iter().cloned());
            globs.push(secondary_glob);
        }

        Ok(ResolvedAssets {
            globs,
            files: files.into_iter().collect(),
        })
    }

    fn title_matches(&self, config: &Configuration, file: &OutputFile, candidate: &str) -> bool {
        let fuzzy = &config.fuzzy_match;
        if fuzzy.enabled {
            self.fuzzy
                .fuzzy_match_string(candidate, fuzzy.remove_characters, fuzzy.remove_brackets)
                == file.fuzzy_title
        } else {
            candidate == file.extracted_title
        }
    }
}

/// True when `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image_file(path: &str) -> bool {
    Utf8Path::new(path)
        .extension()
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
        .unwrap_or(false)
}

/// `file://` URI for a local path, with backslashes turned into forward slashes.
///
/// Each path segment is percent-encoded on its own, so `#`, `?` and `%` in file names stay part
/// of the path.
pub fn file_uri(path: &str) -> PipelineResult<String> {
    let normalized = to_forward_slashes(path);
    let invalid = || PipelineError::FileUri(path.to_string());

    let mut url = Url::parse("file:///").map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(normalized.trim_start_matches('/').split('/'));
    Ok(url.to_string())
}

/// Keep image files only and convert them to URIs.
pub fn image_uris(files: &[String]) -> PipelineResult<Vec<String>> {
    files
        .iter()
        .filter(|file| is_image_file(file))
        .map(|file| file_uri(file))
        .collect()
}
