use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::ScrapeConfig;
use crate::discovery::{Discovery, StopReason};
use crate::http::HttpFetch;
use crate::manuscript::{fetch_item, write_record};
use crate::run_log::{LogRow, RunLog, RunStatus};
use crate::sanitize::clean_folder_name;
use crate::taxonomy::{CategorySpec, SubcategorySpec, subcategory_count, subcategory_key};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub subcategories_total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub manuscripts_saved: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcategoryOutcome {
    pub status: RunStatus,
    pub discovered: usize,
    pub saved: usize,
    /// Set when discovery stopped on a failed page instead of running out.
    pub discovery_error: Option<String>,
}

pub struct Orchestrator {
    config: ScrapeConfig,
    fetcher: Arc<dyn HttpFetch>,
    checkpoints: Arc<dyn CheckpointStore>,
    run_log: RunLog,
}

impl Orchestrator {
    pub fn new(
        config: ScrapeConfig,
        fetcher: Arc<dyn HttpFetch>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        let run_log = RunLog::new(&config.output.log_file);
        Self {
            config,
            fetcher,
            checkpoints,
            run_log,
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrapes every subcategory of `taxonomy` that the checkpoint does not
    /// already list. Only a checkpoint that cannot be loaded fails the run.
    pub async fn run(&self, taxonomy: &[CategorySpec]) -> anyhow::Result<RunSummary> {
        let started = Instant::now();
        let mut checkpoint = self.checkpoints.load().await.context("load checkpoint")?;
        let mut summary = RunSummary {
            subcategories_total: subcategory_count(taxonomy),
            ..RunSummary::default()
        };

        let mut position = 0_usize;
        let mut worked = false;
        for (cat_index, category) in taxonomy.iter().enumerate() {
            tracing::info!(
                category = %category.category_name,
                subcategories = category.subcategories.len(),
                "category {}/{}",
                cat_index + 1,
                taxonomy.len()
            );

            for sub in &category.subcategories {
                position += 1;
                let key = subcategory_key(&category.category_name, &sub.name);
                if checkpoint.is_subcategory_done(&key) {
                    tracing::info!(subcategory = %sub.name, "skip: already completed");
                    summary.skipped += 1;
                    continue;
                }

                if worked {
                    tracing::debug!(delay = ?self.config.delays.subcategory, "pause before next subcategory");
                    tokio::time::sleep(self.config.delays.subcategory).await;
                }
                worked = true;

                tracing::info!(
                    category = %category.category_name,
                    subcategory = %sub.name,
                    "[{position}/{}] subcategory",
                    summary.subcategories_total
                );

                match self.scrape_subcategory(category, sub).await {
                    Ok(outcome) => {
                        tracing::info!(
                            subcategory = %sub.name,
                            status = outcome.status.as_str(),
                            saved = outcome.saved,
                            discovered = outcome.discovered,
                            "subcategory done"
                        );
                        self.append_log(LogRow::now(
                            &category.category_name,
                            &sub.name,
                            outcome.saved,
                            outcome.status,
                            "",
                        ));
                        checkpoint.mark_subcategory(&key);
                        summary.manuscripts_saved += outcome.saved;
                        if self.save_checkpoint(&checkpoint).await {
                            summary.processed += 1;
                        } else {
                            summary.failed += 1;
                        }
                    }
                    Err(err) => {
                        tracing::error!(subcategory = %sub.name, ?err, "subcategory failed");
                        self.append_log(LogRow::now(
                            &category.category_name,
                            &sub.name,
                            0,
                            RunStatus::Error,
                            format!("{err:#}"),
                        ));
                        summary.failed += 1;
                    }
                }
            }

            if is_category_complete(&checkpoint, category)
                && checkpoint.mark_category(&category.category_name)
            {
                let _ = self.save_checkpoint(&checkpoint).await;
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    pub async fn scrape_subcategory(
        &self,
        category: &CategorySpec,
        sub: &SubcategorySpec,
    ) -> anyhow::Result<SubcategoryOutcome> {
        let out_dir = self.subcategory_dir(category, sub);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("create output dir: {}", out_dir.display()))?;

        let found = Discovery::new(self.fetcher.as_ref(), &self.config)
            .discover(category.category_id, sub.subcategory_id)
            .await;

        let discovery_error = match found.stop {
            StopReason::Exhausted => None,
            StopReason::Failed(reason) => {
                tracing::warn!(
                    subcategory = %sub.name,
                    collected = found.urls.len(),
                    %reason,
                    "discovery stopped early; continuing with the links found"
                );
                Some(reason)
            }
        };

        let mut urls = found.urls;
        if urls.is_empty() {
            tracing::warn!(subcategory = %sub.name, "no manuscripts found");
            return Ok(SubcategoryOutcome {
                status: RunStatus::NoData,
                discovered: 0,
                saved: 0,
                discovery_error,
            });
        }
        let discovered = urls.len();

        if let Some(max) = self
            .config
            .max_items_per_subcategory
            .filter(|max| *max < urls.len())
        {
            tracing::info!(max, discovered, "limiting manuscripts for this subcategory");
            urls.truncate(max);
        }

        tracing::info!(count = urls.len(), dir = %out_dir.display(), "downloading manuscripts");
        let mut saved = 0_usize;
        for (i, url) in urls.iter().enumerate() {
            let index = i + 1;
            match fetch_item(self.fetcher.as_ref(), &self.config.site, url).await {
                Ok(record) => match write_record(&out_dir, index, &record) {
                    Ok(path) => {
                        saved += 1;
                        tracing::info!("[{index}/{}] saved {}", urls.len(), path.display());
                    }
                    Err(err) => {
                        tracing::warn!(index, %url, ?err, "write manuscript failed");
                    }
                },
                Err(err) => {
                    tracing::warn!(index, %url, %err, "fetch manuscript failed");
                }
            }

            tokio::time::sleep(self.config.delays.item).await;
        }

        Ok(SubcategoryOutcome {
            status: RunStatus::Success,
            discovered,
            saved,
            discovery_error,
        })
    }

    pub fn subcategory_dir(&self, category: &CategorySpec, sub: &SubcategorySpec) -> PathBuf {
        self.config
            .output
            .out_dir
            .join(clean_folder_name(&category.category_name))
            .join(clean_folder_name(&sub.name))
    }

    fn append_log(&self, row: LogRow) {
        if let Err(err) = self.run_log.append(&row) {
            tracing::warn!(?err, path = %self.run_log.path().display(), "append run log failed");
        }
    }

    /// Returns `false` when the checkpoint could not be written.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> bool {
        match self.checkpoints.save(checkpoint).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(?err, "save checkpoint failed");
                false
            }
        }
    }
}

fn is_category_complete(checkpoint: &Checkpoint, category: &CategorySpec) -> bool {
    category
        .subcategories
        .iter()
        .all(|sub| checkpoint.is_subcategory_done(&subcategory_key(&category.category_name, &sub.name)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use url::Url;

    use super::*;
    use crate::checkpoint::LocalFsCheckpointStore;
    use crate::config::{DEFAULT_SITE, Delays};
    use crate::discovery::fixtures::{listing_html, listing_query_of};
    use crate::http::HttpResponse;
    use crate::http::stub::{StubFetcher, status};

    /// Subcategory `fs` lists `items(fs)` manuscripts with ids `fs * 1000 + n`.
    fn site_stub(
        items: impl Fn(u32) -> u32 + Send + Sync + 'static,
        failing_item: Option<u32>,
    ) -> StubFetcher {
        StubFetcher::new(move |url| {
            if let Some((_, fs, ps)) = listing_query_of(url) {
                let total = items(fs);
                let start = fs * 1000 + ps.min(total);
                let end = fs * 1000 + (ps + 20).min(total);
                return Ok(HttpResponse::ok(listing_html(start..end)));
            }

            let id: u32 = url
                .path()
                .rsplit('/')
                .next()
                .and_then(|seg| seg.split('-').next())
                .and_then(|id| id.parse().ok())
                .unwrap_or(0);
            if Some(id) == failing_item {
                return Err(status(url, 502));
            }
            Ok(HttpResponse::ok(format!(
                "<h1>Naskah {id}</h1><div class=\"item-page\"><p>isi {id}</p></div>"
            )))
        })
    }

    fn kisah(subs: &[(u32, &str)]) -> CategorySpec {
        CategorySpec::new(11, "Kisah Cerita dan Kronikal", subs)
    }

    struct Harness {
        dir: tempfile::TempDir,
        fetcher: Arc<StubFetcher>,
    }

    impl Harness {
        fn new(fetcher: StubFetcher) -> anyhow::Result<Self> {
            Ok(Self {
                dir: tempfile::TempDir::new()?,
                fetcher: Arc::new(fetcher),
            })
        }

        fn config(&self) -> anyhow::Result<ScrapeConfig> {
            let mut config = ScrapeConfig::new(Url::parse(DEFAULT_SITE)?)?;
            config.delays = Delays::none();
            config.output.out_dir = self.dir.path().join("out");
            config.output.log_file = self.dir.path().join("scraping_log.csv");
            config.output.progress_file = self.dir.path().join("scraping_progress.json");
            Ok(config)
        }

        fn orchestrator(&self, config: ScrapeConfig) -> Orchestrator {
            let store = LocalFsCheckpointStore::new(&config.output.progress_file);
            Orchestrator::new(config, self.fetcher.clone(), Arc::new(store))
        }

        async fn run(&self, taxonomy: &[CategorySpec]) -> anyhow::Result<RunSummary> {
            self.orchestrator(self.config()?).run(taxonomy).await
        }

        fn log_rows(&self) -> anyhow::Result<Vec<csv::StringRecord>> {
            let mut reader = csv::Reader::from_path(self.dir.path().join("scraping_log.csv"))?;
            Ok(reader.records().collect::<Result<Vec<_>, _>>()?)
        }

        async fn checkpoint(&self) -> anyhow::Result<Checkpoint> {
            LocalFsCheckpointStore::new(self.dir.path().join("scraping_progress.json"))
                .load()
                .await
        }

        fn out(&self, sub: &str) -> PathBuf {
            self.dir
                .path()
                .join("out")
                .join("Kisah_Cerita_dan_Kronikal")
                .join(sub)
        }
    }

    fn file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
        let mut names = std::fs::read_dir(dir)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    #[tokio::test]
    async fn babad_with_25_items_writes_25_files_and_logs_success() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 25, None))?;

        let summary = harness.run(&[kisah(&[(46, "Babad")])]).await?;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.manuscripts_saved, 25);

        let names = file_names(&harness.out("Babad"))?;
        assert_eq!(names.len(), 25);
        assert_eq!(names[0], "0001_Naskah 46000.txt");
        assert_eq!(names[24], "0025_Naskah 46024.txt");
        let first = std::fs::read_to_string(harness.out("Babad").join(&names[0]))?;
        assert!(first.starts_with("Judul: Naskah 46000\nURL: https://www.sastra.org/"));
        assert!(first.ends_with("\n\nisi 46000"));

        let rows = harness.log_rows()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "Kisah Cerita dan Kronikal");
        assert_eq!(&rows[0][2], "Babad");
        assert_eq!(&rows[0][3], "25");
        assert_eq!(&rows[0][4], "SUCCESS");

        let checkpoint = harness.checkpoint().await?;
        assert!(checkpoint.is_subcategory_done("Kisah Cerita dan Kronikal_Babad"));
        assert!(checkpoint.is_category_done("Kisah Cerita dan Kronikal"));

        // 3 discovery pages + 25 items
        assert_eq!(harness.fetcher.request_count(), 28);
        Ok(())
    }

    #[tokio::test]
    async fn empty_subcategory_logs_no_data_and_is_checkpointed() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 0, None))?;

        let summary = harness.run(&[kisah(&[(46, "Babad")])]).await?;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.manuscripts_saved, 0);
        let rows = harness.log_rows()?;
        assert_eq!(&rows[0][3], "0");
        assert_eq!(&rows[0][4], "NO_DATA");
        assert!(
            harness
                .checkpoint()
                .await?
                .is_subcategory_done("Kisah Cerita dan Kronikal_Babad")
        );
        assert_eq!(harness.fetcher.request_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failing_item_is_skipped_and_the_rest_are_saved() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 25, Some(46012)))?;

        let summary = harness.run(&[kisah(&[(46, "Babad")])]).await?;

        assert_eq!(summary.manuscripts_saved, 24);
        let names = file_names(&harness.out("Babad"))?;
        assert_eq!(names.len(), 24);
        assert!(!names.iter().any(|n| n.starts_with("0013_")));
        assert!(names.iter().any(|n| n.starts_with("0012_")));
        assert!(names.iter().any(|n| n.starts_with("0014_")));

        let rows = harness.log_rows()?;
        assert_eq!(&rows[0][3], "24");
        assert_eq!(&rows[0][4], "SUCCESS");
        Ok(())
    }

    #[tokio::test]
    async fn second_run_fetches_nothing_for_completed_subcategories() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 5, None))?;
        let taxonomy = [kisah(&[(46, "Babad"), (73, "Menak")])];

        harness.run(&taxonomy).await?;
        let after_first = harness.fetcher.request_count();

        let summary = harness.run(&taxonomy).await?;

        assert_eq!(harness.fetcher.request_count(), after_first);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.processed, 0);
        assert_eq!(harness.log_rows()?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn resumed_run_starts_at_first_unfinished_subcategory() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 3, None))?;
        let mut checkpoint = Checkpoint::default();
        checkpoint.mark_subcategory("Kisah Cerita dan Kronikal_Babad");
        LocalFsCheckpointStore::new(harness.dir.path().join("scraping_progress.json"))
            .save(&checkpoint)
            .await?;

        let taxonomy = [kisah(&[(46, "Babad"), (43, "Babad Giyanti"), (42, "Babad Tanah Jawi")])];
        let summary = harness.run(&taxonomy).await?;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 2);
        let listed: HashSet<u32> = harness
            .fetcher
            .requested()
            .iter()
            .filter_map(listing_query_of)
            .map(|(_, fs, _)| fs)
            .collect();
        assert_eq!(listed, HashSet::from([43, 42]));
        assert!(!harness.out("Babad").exists());

        let rows = harness.log_rows()?;
        let subs: Vec<_> = rows.iter().map(|r| r[2].to_owned()).collect();
        assert_eq!(subs, vec!["Babad Giyanti", "Babad Tanah Jawi"]);
        Ok(())
    }

    #[tokio::test]
    async fn subcategory_error_is_logged_not_checkpointed_and_run_continues() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 2, None))?;
        let blocked = harness.out("Babad");
        std::fs::create_dir_all(blocked.parent().expect("parent"))?;
        std::fs::write(&blocked, "not a directory")?;

        let summary = harness.run(&[kisah(&[(46, "Babad"), (73, "Menak")])]).await?;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
        let rows = harness.log_rows()?;
        assert_eq!(&rows[0][4], "ERROR");
        assert!(rows[0][5].contains("create output dir"));
        assert_eq!(&rows[1][4], "SUCCESS");

        let checkpoint = harness.checkpoint().await?;
        assert!(!checkpoint.is_subcategory_done("Kisah Cerita dan Kronikal_Babad"));
        assert!(checkpoint.is_subcategory_done("Kisah Cerita dan Kronikal_Menak"));
        assert!(!checkpoint.is_category_done("Kisah Cerita dan Kronikal"));
        Ok(())
    }

    #[tokio::test]
    async fn discovery_failure_on_first_page_is_no_data_and_checkpointed() -> anyhow::Result<()> {
        let harness = Harness::new(StubFetcher::new(|url| Err(status(url, 503))))?;

        let summary = harness.run(&[kisah(&[(46, "Babad")])]).await?;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 0);
        let rows = harness.log_rows()?;
        assert_eq!(&rows[0][3], "0");
        assert_eq!(&rows[0][4], "NO_DATA");
        assert_eq!(&rows[0][5], "");
        assert!(
            harness
                .checkpoint()
                .await?
                .is_subcategory_done("Kisah Cerita dan Kronikal_Babad")
        );
        assert_eq!(harness.fetcher.request_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn partial_discovery_keeps_links_and_logs_plain_success() -> anyhow::Result<()> {
        let harness = Harness::new(StubFetcher::new(|url| match listing_query_of(url) {
            Some((_, _, 0)) => Ok(HttpResponse::ok(listing_html(0..20))),
            Some(_) => Err(status(url, 429)),
            None => Ok(HttpResponse::ok("<h1>T</h1><article>x</article>")),
        }))?;
        let taxonomy = [kisah(&[(46, "Babad")])];

        let outcome = harness
            .orchestrator(harness.config()?)
            .scrape_subcategory(&taxonomy[0], &taxonomy[0].subcategories[0])
            .await?;
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.saved, 20);
        assert!(
            outcome
                .discovery_error
                .as_deref()
                .is_some_and(|reason| reason.contains("HTTP 429"))
        );

        harness.run(&taxonomy).await?;
        let rows = harness.log_rows()?;
        assert_eq!(&rows[0][4], "SUCCESS");
        assert_eq!(&rows[0][3], "20");
        assert_eq!(&rows[0][5], "");
        Ok(())
    }

    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl CheckpointStore for ReadOnlyStore {
        async fn load(&self) -> anyhow::Result<Checkpoint> {
            Ok(Checkpoint::default())
        }

        async fn save(&self, _checkpoint: &Checkpoint) -> anyhow::Result<()> {
            anyhow::bail!("read-only file system")
        }
    }

    #[tokio::test]
    async fn unsaved_checkpoint_counts_the_subcategory_as_failed() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 2, None))?;
        let orchestrator =
            Orchestrator::new(harness.config()?, harness.fetcher.clone(), Arc::new(ReadOnlyStore));

        let summary = orchestrator.run(&[kisah(&[(46, "Babad")])]).await?;

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.manuscripts_saved, 2);
        assert_eq!(&harness.log_rows()?[0][4], "SUCCESS");
        Ok(())
    }

    #[tokio::test]
    async fn item_limit_truncates_each_subcategory() -> anyhow::Result<()> {
        let harness = Harness::new(site_stub(|_| 25, None))?;
        let mut config = harness.config()?;
        config.max_items_per_subcategory = Some(4);

        let summary = harness
            .orchestrator(config)
            .run(&[kisah(&[(46, "Babad")])])
            .await?;

        assert_eq!(summary.manuscripts_saved, 4);
        assert_eq!(file_names(&harness.out("Babad"))?.len(), 4);
        Ok(())
    }
}
