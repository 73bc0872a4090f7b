//! The discovery pipeline.
//!
//! One [`Pipeline::run`] takes an ordered list of configurations through five stages:
//!
//! 1. **Validate**: look up every parser and normalize its inputs. A missing parser fails the
//!    whole run before any I/O starts.
//! 2. **Discover**: run all parsers and all account lookups concurrently.
//! 3. **Enrich**: fuzzy matching, account filtering and per-file record construction, in
//!    configuration order.
//! 4. **Resolve assets**: local images and icons for every configuration, concurrently.
//! 5. **Aggregate**: results index-aligned with the input plus the "no accounts" flag.
//!
//! Every run gets its own [`DiscoveryCache`].

use crate::metrics::RunMetrics;
use crate::models::{
    Configuration, DiscoveredItem, DiscoveryResult, OutputConfiguration, OutputFile, RunOutput,
    UserAccount,
};
use crate::services::accounts::{AccountProvider, UserdataAccountProvider, filter_user_accounts};
use crate::services::assets::{AssetField, AssetResolver, image_uris};
use crate::services::error::{PipelineError, PipelineResult};
use crate::services::fuzzy::{FuzzyMatcher, TitleNormalizer};
use crate::services::parsers::{DiscoveryCache, DiscoveryStrategy, ParserRegistry};
use crate::services::variables::{
    TemplateField, VariableContext, replace_title, replace_variables, resolve_query_terms,
    variable_string_to_array,
};
use camino::Utf8Path;
use futures::future::{join_all, try_join_all};
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run-wide policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound for each parser execution and each account lookup. `None` waits forever.
    pub timeout: Option<Duration>,
}

/// A validated parser together with its normalized inputs.
struct DiscoveryJob {
    parser: Arc<dyn DiscoveryStrategy>,
    inputs: IndexMap<String, String>,
}

pub struct Pipeline {
    registry: ParserRegistry,
    accounts: Arc<dyn AccountProvider>,
    fuzzy: Arc<dyn FuzzyMatcher>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        registry: ParserRegistry,
        accounts: Arc<dyn AccountProvider>,
        fuzzy: Arc<dyn FuzzyMatcher>,
    ) -> Self {
        Self {
            registry,
            accounts,
            fuzzy,
            options: PipelineOptions::default(),
        }
    }

    /// Built-in parsers, `userdata` account discovery and the regex title normalizer.
    pub fn with_defaults() -> Self {
        Self::new(
            ParserRegistry::with_builtin(),
            Arc::new(UserdataAccountProvider),
            Arc::new(TitleNormalizer::new()),
        )
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every configuration and return one result per configuration, in input order.
    pub async fn run(&self, configs: &[Configuration]) -> PipelineResult<RunOutput> {
        let metrics = RunMetrics::new();
        let output = self.run_with_metrics(configs, &metrics).await?;
        metrics.log_summary();
        Ok(output)
    }

    /// Like [`Pipeline::run`], recording counters into `metrics`.
    pub async fn run_with_metrics(
        &self,
        configs: &[Configuration],
        metrics: &RunMetrics,
    ) -> PipelineResult<RunOutput> {
        let jobs = self.validate(configs)?;
        let cache = DiscoveryCache::new();

        tracing::info!("Discovering files for {} configuration(s)", configs.len());

        let discoveries = try_join_all(
            configs
                .iter()
                .zip(&jobs)
                .map(|(config, job)| self.discover(config, job, &cache)),
        );
        let logins = try_join_all(configs.iter().map(|config| self.find_accounts(config)));
        let (discoveries, logins) = tokio::try_join!(discoveries, logins)?;

        let mut results: Vec<OutputConfiguration> = join_all(
            configs
                .iter()
                .zip(discoveries)
                .zip(&logins)
                .map(|((config, discovery), logins)| self.enrich(config, discovery, logins, metrics)),
        )
        .await;

        tracing::info!("Resolving local assets");
        let resolver = AssetResolver::new(&self.registry, self.fuzzy.as_ref(), &cache);
        try_join_all(
            results
                .iter_mut()
                .zip(configs)
                .map(|(output, config)| resolve_assets(&resolver, config, output, metrics)),
        )
        .await?;

        metrics.record_cache(&cache);

        let total_accounts: usize = results.iter().map(|r| r.found_user_accounts.len()).sum();
        if total_accounts == 0 {
            tracing::warn!("No user accounts found in any configuration");
        }

        Ok(RunOutput {
            results,
            no_accounts_found: total_accounts == 0,
        })
    }

    fn validate(&self, configs: &[Configuration]) -> PipelineResult<Vec<DiscoveryJob>> {
        configs
            .iter()
            .map(|config| {
                let parser = self.registry.get(&config.parser_type)?;
                let inputs = parser.info().normalize_inputs(&config.parser_inputs);
                Ok(DiscoveryJob { parser, inputs })
            })
            .collect()
    }

    async fn discover(
        &self,
        config: &Configuration,
        job: &DiscoveryJob,
        cache: &DiscoveryCache,
    ) -> PipelineResult<DiscoveryResult> {
        tracing::debug!("Running parser for {}", config.display_name());
        self.bounded(
            || format!("Parser \"{}\" for {}", config.parser_type, config.display_name()),
            job.parser.execute(&config.rom_directory, &job.inputs, cache),
        )
        .await
    }

    async fn find_accounts(&self, config: &Configuration) -> PipelineResult<Vec<UserAccount>> {
        if config.steam_directory.is_empty() {
            return Ok(Vec::new());
        }

        self.bounded(
            || format!("Account discovery in {}", config.steam_directory),
            self.accounts.available_logins(
                &config.steam_directory,
                config.user_accounts.use_credentials,
            ),
        )
        .await
    }

    /// Apply the configured timeout to `future`.
    async fn bounded<T, F>(
        &self,
        operation: impl FnOnce() -> String,
        future: F,
    ) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        let Some(after) = self.options.timeout else {
            return future.await;
        };

        match tokio::time::timeout(after, future).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                operation: operation(),
                after,
            }),
        }
    }

    async fn enrich(
        &self,
        config: &Configuration,
        mut discovery: DiscoveryResult,
        logins: &[UserAccount],
        metrics: &RunMetrics,
    ) -> OutputConfiguration {
        let fuzzy = &config.fuzzy_match;
        if fuzzy.enabled {
            self.fuzzy.fuzzy_match_parsed_data(
                &mut discovery,
                fuzzy.remove_characters,
                fuzzy.remove_brackets,
            );
        }

        let requested = variable_string_to_array(&config.user_accounts.specified_accounts);
        let accounts = filter_user_accounts(
            logins,
            &requested,
            &config.steam_directory,
            config.user_accounts.skip_with_missing_data_dir,
        )
        .await;
        for name in &accounts.missing {
            tracing::warn!("Account \"{}\" not found for {}", name, config.display_name());
        }

        let files: Vec<OutputFile> = discovery
            .success
            .iter()
            .map(|item| build_output_file(config, item))
            .collect();

        metrics.record_discovery(files.len(), discovery.failed.len());
        metrics.record_accounts(accounts.found.len(), accounts.missing.len());
        tracing::debug!(
            "{}: {} file(s), {} failed, {} account(s)",
            config.display_name(),
            files.len(),
            discovery.failed.len(),
            accounts.found.len()
        );

        OutputConfiguration {
            steam_categories: variable_string_to_array(&config.steam_category),
            append_args_to_executable: config.append_args_to_executable,
            image_providers: config.image_providers.clone(),
            steam_directory: config.steam_directory.clone(),
            found_user_accounts: accounts.found,
            missing_user_accounts: accounts.missing,
            files,
            failed: discovery.failed,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_output_file(config: &Configuration, item: &DiscoveredItem) -> OutputFile {
    let fuzzy_title = item
        .fuzzy_title
        .clone()
        .unwrap_or_else(|| item.extracted_title.clone());
    let executable_location = if config.executable_location.is_empty() {
        item.file_path.clone()
    } else {
        config.executable_location.clone()
    };
    let start_in_directory = if config.start_in_directory.is_empty() {
        parent_directory(&executable_location)
    } else {
        config.start_in_directory.clone()
    };

    let mut file = OutputFile {
        final_title: replace_title(&config.title_modifier, &item.extracted_title),
        fuzzy_final_title: replace_title(&config.title_modifier, &fuzzy_title),
        executable_location,
        start_in_directory,
        extracted_title: item.extracted_title.clone(),
        fuzzy_title,
        file_path: item.file_path.clone(),
        ..OutputFile::default()
    };

    let context = VariableContext::new(config, &file);
    let online_image_queries = resolve_query_terms(&config.online_image_queries, &context);
    let argument_string = replace_variables(
        &config.executable_args,
        &context,
        TemplateField::ExecutableArgs.depth(),
    );

    file.online_image_queries = online_image_queries;
    file.argument_string = argument_string;
    file
}

fn parent_directory(path: &str) -> String {
    Utf8Path::new(path)
        .parent()
        .map(|parent| parent.as_str())
        .filter(|parent| !parent.is_empty())
        .unwrap_or(".")
        .to_string()
}

async fn resolve_assets(
    resolver: &AssetResolver<'_>,
    config: &Configuration,
    output: &mut OutputConfiguration,
    metrics: &RunMetrics,
) -> PipelineResult<()> {
    let (images, icons) = tokio::try_join!(
        resolver.resolve_field(AssetField::LocalImages, config, &output.files),
        resolver.resolve_field(AssetField::LocalIcons, config, &output.files),
    )?;

    let mut image_count = 0;
    let mut icon_count = 0;
    for ((file, images), icons) in output.files.iter_mut().zip(images).zip(icons) {
        file.local_images = image_uris(&images.files)?;
        file.resolved_local_images = images.globs;
        file.local_icons = icons.files;
        file.resolved_local_icons = icons.globs;

        image_count += file.local_images.len();
        icon_count += file.local_icons.len();
    }

    metrics.record_assets(image_count, icon_count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accounts::MockAccountProvider;
    use crate::services::parsers::{GLOB_INPUT, ParserInfo, ParserInput};
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed items after an optional delay and counts its executions.
    struct FixedParser {
        titles: Vec<&'static str>,
        delay: Duration,
        runs: Arc<AtomicUsize>,
    }

    impl FixedParser {
        fn new(titles: Vec<&'static str>) -> Self {
            Self {
                titles,
                delay: Duration::ZERO,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl DiscoveryStrategy for FixedParser {
        fn info(&self) -> ParserInfo {
            let mut inputs = IndexMap::new();
            inputs.insert(
                "forced".to_string(),
                ParserInput {
                    label: "Forced".to_string(),
                    forced_input: Some("yes".to_string()),
                },
            );
            ParserInfo {
                title: "Fixed".to_string(),
                inputs,
            }
        }

        async fn execute(
            &self,
            directory: &str,
            inputs: &IndexMap<String, String>,
            _cache: &DiscoveryCache,
        ) -> PipelineResult<DiscoveryResult> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            assert_eq!(inputs.get("forced").map(String::as_str), Some("yes"));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(DiscoveryResult {
                success: self
                    .titles
                    .iter()
                    .map(|title| DiscoveredItem::new(format!("{directory}/{title}.sfc"), *title))
                    .collect(),
                failed: vec!["unreadable.zip".to_string()],
            })
        }
    }

    fn accounts_returning(accounts: Vec<UserAccount>) -> MockAccountProvider {
        let mut provider = MockAccountProvider::new();
        provider
            .expect_available_logins()
            .returning(move |_, _| Ok(accounts.clone()));
        provider
    }

    fn pipeline_with_provider(
        parsers: Vec<(&str, FixedParser)>,
        provider: MockAccountProvider,
    ) -> Pipeline {
        let mut registry = ParserRegistry::with_builtin();
        for (id, parser) in parsers {
            registry.register(id, parser);
        }
        Pipeline::new(
            registry,
            Arc::new(provider),
            Arc::new(TitleNormalizer::new()),
        )
    }

    fn pipeline_with(parsers: Vec<(&str, FixedParser)>, accounts: Vec<UserAccount>) -> Pipeline {
        pipeline_with_provider(parsers, accounts_returning(accounts))
    }

    #[tokio::test]
    async fn test_title_template_without_fuzzy_matching() {
        let pipeline = pipeline_with(vec![("Fixed", FixedParser::new(vec!["Foo", "Bar"]))], vec![]);
        let mut config = Configuration::new("/roms", "Fixed");
        config.title_modifier = "${TITLE} (Game)".to_string();

        let output = pipeline.run(&[config]).await.unwrap();
        let files = &output.results[0].files;

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].final_title, "Foo (Game)");
        assert_eq!(files[1].final_title, "Bar (Game)");
        assert_eq!(files[0].fuzzy_title, "Foo");
        assert_eq!(files[0].fuzzy_final_title, files[0].final_title);
        assert_eq!(files[1].fuzzy_final_title, files[1].final_title);
        assert_eq!(output.results[0].failed, vec!["unreadable.zip"]);
        assert!(output.no_accounts_found);
    }

    #[tokio::test]
    async fn test_output_file_fields() {
        let pipeline = pipeline_with(vec![("Fixed", FixedParser::new(vec!["Foo (USA)"]))], vec![]);
        let mut config = Configuration::new("/roms", "Fixed");
        config.fuzzy_match.enabled = true;
        config.executable_args = "-L core.so \"${filePath}\"".to_string();
        config.steam_category = "${SNES}${Retro}${SNES}".to_string();
        config.online_image_queries = "${${fuzzyTitle}}${${title}}".to_string();

        let output = pipeline.run(&[config]).await.unwrap();
        let result = &output.results[0];
        let file = &result.files[0];

        assert_eq!(file.file_path, "/roms/Foo (USA).sfc");
        assert_eq!(file.executable_location, file.file_path);
        assert_eq!(file.start_in_directory, "/roms");
        assert_eq!(file.fuzzy_title, "Foo");
        assert_eq!(file.final_title, "Foo (USA)");
        assert_eq!(file.fuzzy_final_title, "Foo");
        assert_eq!(file.argument_string, "-L core.so \"/roms/Foo (USA).sfc\"");
        assert_eq!(file.online_image_queries, vec!["Foo", "Foo (USA)"]);
        assert_eq!(result.steam_categories, vec!["SNES", "Retro"]);
        assert!(file.local_images.is_empty());
        assert!(file.resolved_local_images.is_empty());
    }

    #[tokio::test]
    async fn test_executable_and_start_overrides() {
        let pipeline = pipeline_with(vec![("Fixed", FixedParser::new(vec!["Foo"]))], vec![]);
        let mut config = Configuration::new("/roms", "Fixed");
        config.executable_location = "/emu/retroarch".to_string();
        config.executable_args = "${exeDir}".to_string();

        let output = pipeline.run(&[config.clone()]).await.unwrap();
        let file = &output.results[0].files[0];
        assert_eq!(file.executable_location, "/emu/retroarch");
        assert_eq!(file.start_in_directory, "/emu");
        assert_eq!(file.argument_string, "/emu");

        config.start_in_directory = "/work".to_string();
        let output = pipeline.run(&[config]).await.unwrap();
        assert_eq!(output.results[0].files[0].start_in_directory, "/work");
    }

    #[tokio::test]
    async fn test_account_filter_reports_missing_names() {
        let mut provider = MockAccountProvider::new();
        provider
            .expect_available_logins()
            .with(eq("/steam"), eq(true))
            .times(1)
            .returning(|_, _| Ok(vec![UserAccount::new("Alice", "1001")]));
        let pipeline =
            pipeline_with_provider(vec![("Fixed", FixedParser::new(vec!["Foo"]))], provider);

        let mut config = Configuration::new("/roms", "Fixed");
        config.steam_directory = "/steam".to_string();
        config.user_accounts.use_credentials = true;
        config.user_accounts.specified_accounts = "${Alice}${Bob}".to_string();

        let output = pipeline.run(&[config]).await.unwrap();
        let result = &output.results[0];

        assert_eq!(result.found_user_accounts, vec![UserAccount::new("Alice", "1001")]);
        assert_eq!(result.missing_user_accounts, vec!["Bob"]);
        assert!(!output.no_accounts_found);
    }

    #[tokio::test]
    async fn test_accounts_skipped_without_steam_directory() {
        let mut provider = MockAccountProvider::new();
        provider.expect_available_logins().times(0);
        let pipeline =
            pipeline_with_provider(vec![("Fixed", FixedParser::new(vec!["Foo"]))], provider);

        let config = Configuration::new("/roms", "Fixed");

        let output = pipeline.run(&[config]).await.unwrap();
        assert!(output.results[0].found_user_accounts.is_empty());
        assert!(output.no_accounts_found);
    }

    #[tokio::test]
    async fn test_unknown_parser_fails_before_any_execution() {
        let parser = FixedParser::new(vec!["Foo"]);
        let runs = parser.runs.clone();
        let pipeline = pipeline_with(vec![("Fixed", parser)], vec![]);

        let configs = vec![
            Configuration::new("/roms/a", "Fixed"),
            Configuration::new("/roms/b", "Steam"),
        ];

        match pipeline.run(&configs).await {
            Err(PipelineError::ParserNotFound(name)) => assert_eq!(name, "Steam"),
            other => panic!("expected ParserNotFound, got {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let mut slow = FixedParser::new(vec!["Slow"]);
        slow.delay = Duration::from_millis(50);
        let fast = FixedParser::new(vec!["Fast"]);
        let pipeline = pipeline_with(vec![("Slow", slow), ("Fast", fast)], vec![]);

        let configs = vec![
            Configuration::new("/a", "Slow"),
            Configuration::new("/b", "Fast"),
            Configuration::new("/c", "Slow"),
        ];
        let output = pipeline.run(&configs).await.unwrap();

        let titles: Vec<&str> = output
            .results
            .iter()
            .map(|r| r.files[0].extracted_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Slow", "Fast", "Slow"]);
        assert_eq!(output.results[2].files[0].file_path, "/c/Slow.sfc");
    }

    #[tokio::test]
    async fn test_parser_timeout_fails_run() {
        let mut slow = FixedParser::new(vec!["Slow"]);
        slow.delay = Duration::from_secs(30);
        let pipeline = pipeline_with(vec![("Slow", slow)], vec![]).with_options(PipelineOptions {
            timeout: Some(Duration::from_millis(20)),
        });

        let result = pipeline.run(&[Configuration::new("/a", "Slow")]).await;
        assert!(matches!(result, Err(PipelineError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_invalid_glob_input_reports_failure() {
        let pipeline = Pipeline::with_defaults();
        let mut config = Configuration::new("/roms", "Glob");
        config.parser_inputs.insert(GLOB_INPUT.to_string(), "*.sfc".to_string());

        let output = pipeline.run(&[config]).await.unwrap();
        assert!(output.results[0].files.is_empty());
        assert_eq!(output.results[0].failed, vec!["*.sfc"]);
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("/roms/a.sfc"), "/roms");
        assert_eq!(parent_directory("a.sfc"), ".");
    }
}
