// Run metrics
//
// Lightweight counters describing what one pipeline run produced

use crate::services::parsers::DiscoveryCache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected during a pipeline run.
///
/// Uses atomic operations so concurrent stages can record without locks.
#[derive(Debug)]
pub struct RunMetrics {
    pub configurations: AtomicUsize,

    /// Items reported as successes by discovery strategies
    pub files_discovered: AtomicUsize,

    /// Raw inputs strategies could not resolve
    pub failed_items: AtomicUsize,

    pub accounts_found: AtomicUsize,
    pub missing_accounts: AtomicUsize,

    /// Image URIs attached to output files (after the extension filter)
    pub local_images: AtomicUsize,
    pub local_icons: AtomicUsize,

    /// File-system scans performed by the run's discovery cache
    pub glob_scans: AtomicUsize,
    /// Glob requests answered from the cache
    pub glob_hits: AtomicUsize,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            configurations: AtomicUsize::new(0),
            files_discovered: AtomicUsize::new(0),
            failed_items: AtomicUsize::new(0),
            accounts_found: AtomicUsize::new(0),
            missing_accounts: AtomicUsize::new(0),
            local_images: AtomicUsize::new(0),
            local_icons: AtomicUsize::new(0),
            glob_scans: AtomicUsize::new(0),
            glob_hits: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the discovery outcome of one configuration
    pub fn record_discovery(&self, files: usize, failed: usize) {
        self.configurations.fetch_add(1, Ordering::Relaxed);
        self.files_discovered.fetch_add(files, Ordering::Relaxed);
        self.failed_items.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_accounts(&self, found: usize, missing: usize) {
        self.accounts_found.fetch_add(found, Ordering::Relaxed);
        self.missing_accounts.fetch_add(missing, Ordering::Relaxed);
    }

    pub fn record_assets(&self, images: usize, icons: usize) {
        self.local_images.fetch_add(images, Ordering::Relaxed);
        self.local_icons.fetch_add(icons, Ordering::Relaxed);
    }

    /// Copy the final counters of a run's cache
    pub fn record_cache(&self, cache: &DiscoveryCache) {
        self.glob_scans.store(cache.scan_count(), Ordering::Relaxed);
        self.glob_hits.store(cache.hit_count(), Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Configurations: {}, files: {}, failed: {}",
            self.configurations.load(Ordering::Relaxed),
            self.files_discovered.load(Ordering::Relaxed),
            self.failed_items.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Accounts: {} found, {} missing",
            self.accounts_found.load(Ordering::Relaxed),
            self.missing_accounts.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Local assets: {} image(s), {} icon(s)",
            self.local_images.load(Ordering::Relaxed),
            self.local_icons.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Glob cache: {} scan(s), {} hit(s)",
            self.glob_scans.load(Ordering::Relaxed),
            self.glob_hits.load(Ordering::Relaxed)
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.configurations.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.files_discovered.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_discovery() {
        let metrics = RunMetrics::new();

        metrics.record_discovery(3, 1);
        metrics.record_discovery(2, 0);

        assert_eq!(metrics.configurations.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.files_discovered.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.failed_items.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_accounts_and_assets() {
        let metrics = RunMetrics::new();

        metrics.record_accounts(1, 2);
        metrics.record_assets(4, 0);
        metrics.record_assets(1, 3);

        assert_eq!(metrics.accounts_found.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.missing_accounts.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.local_images.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.local_icons.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_record_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let pattern = format!("{}/*.png", dir.path().to_str().unwrap().replace('\\', "/"));
        let cache = DiscoveryCache::new();
        cache.glob(&pattern, Default::default()).await.unwrap();
        cache.glob(&pattern, Default::default()).await.unwrap();

        let metrics = RunMetrics::new();
        metrics.record_cache(&cache);

        assert_eq!(metrics.glob_scans.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.glob_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_elapsed() {
        let metrics = RunMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.elapsed().as_millis() >= 10);
    }
}
