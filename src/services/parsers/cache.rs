use crate::services::error::{PipelineError, PipelineResult};
use crate::services::paths::{strip_verbatim, to_forward_slashes};
use camino::Utf8PathBuf;
use dashmap::DashMap;
use indexmap::IndexSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// Matching behavior for one glob scan. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobOptions {
    pub case_sensitive: bool,
    pub include_dotfiles: bool,
    pub resolve_symlinks: bool,
}

impl GlobOptions {
    /// Options for asset globs: case-insensitive, dotfiles included, real paths.
    pub const fn assets() -> Self {
        Self {
            case_sensitive: false,
            include_dotfiles: true,
            resolve_symlinks: true,
        }
    }

    /// Options for title-extracting strategies, which need matched paths to keep the shape of
    /// the pattern.
    pub const fn parser() -> Self {
        Self {
            case_sensitive: false,
            include_dotfiles: true,
            resolve_symlinks: false,
        }
    }
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self::assets()
    }
}

type CacheKey = (String, GlobOptions);
type CachedFiles = Arc<Vec<String>>;

/// Run-scoped store of glob results shared by every strategy and asset lookup.
///
/// Each key owns a `OnceCell`, so concurrent requests for the same pattern wait on a single
/// scan instead of walking the file system twice. Clones share the same store.
///
/// A cache must never outlive the run that created it; the pipeline creates a fresh one per
/// run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: DashMap<CacheKey, Arc<OnceCell<CachedFiles>>>,
    scans: AtomicUsize,
    hits: AtomicUsize,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files matching `pattern`, scanning the file system only on the first request.
    pub async fn glob(&self, pattern: &str, options: GlobOptions) -> PipelineResult<CachedFiles> {
        let cell = self
            .inner
            .entries
            .entry((pattern.to_string(), options))
            .or_default()
            .clone();

        let scanned = AtomicBool::new(false);
        let files = cell
            .get_or_try_init(|| {
                scanned.store(true, Ordering::Relaxed);
                self.inner.scans.fetch_add(1, Ordering::Relaxed);
                scan(pattern.to_string(), options)
            })
            .await?
            .clone();

        if !scanned.load(Ordering::Relaxed) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Glob cache hit: {}", pattern);
        }

        Ok(files)
    }

    /// Number of file-system scans performed.
    pub fn scan_count(&self) -> usize {
        self.inner.scans.load(Ordering::Relaxed)
    }

    /// Number of requests answered without scanning.
    pub fn hit_count(&self) -> usize {
        self.inner.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

async fn scan(pattern: String, options: GlobOptions) -> PipelineResult<CachedFiles> {
    tokio::task::spawn_blocking(move || scan_blocking(&pattern, options)).await?
}

fn scan_blocking(pattern: &str, options: GlobOptions) -> PipelineResult<CachedFiles> {
    tracing::debug!("Scanning glob: {}", pattern);

    let match_options = glob::MatchOptions {
        case_sensitive: options.case_sensitive,
        require_literal_separator: true,
        require_literal_leading_dot: !options.include_dotfiles,
    };

    let paths = glob::glob_with(pattern, match_options).map_err(|source| {
        PipelineError::InvalidGlob {
            pattern: pattern.to_string(),
            source,
        }
    })?;

    let mut files = IndexSet::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable glob entry: {}", e);
                continue;
            }
        };

        let path = if options.resolve_symlinks {
            std::fs::canonicalize(&path).unwrap_or(path)
        } else {
            path
        };

        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => {
                files.insert(to_forward_slashes(strip_verbatim(path.as_str())));
            }
            Err(path) => {
                tracing::debug!("Skipping non UTF-8 path: {}", path.display());
            }
        }
    }

    tracing::debug!("Glob {} matched {} file(s)", pattern, files.len());
    Ok(Arc::new(files.into_iter().collect()))
}
