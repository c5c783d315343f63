use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;

use crate::checkpoint::LocalFsCheckpointStore;
use crate::cli::RunArgs;
use crate::config::ScrapeConfig;
use crate::http::ReqwestFetcher;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::taxonomy::{self, CategorySpec};

const RULE: &str = "================================================================================";

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Cancelled,
}

pub async fn run(args: RunArgs) -> anyhow::Result<RunOutcome> {
    let config = ScrapeConfig::from_args(&args).context("build scrape config")?;
    let taxonomy = load_taxonomy(&args)?;
    print_banner(&config, &taxonomy);

    let fetcher = Arc::new(ReqwestFetcher::new(config.timeout)?);
    let checkpoints = Arc::new(LocalFsCheckpointStore::new(&config.output.progress_file));
    let orchestrator = Orchestrator::new(config, fetcher, checkpoints);

    let started = Instant::now();
    let result = tokio::select! {
        result = confirm_and_run(&orchestrator, &taxonomy, args.yes) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            return Ok(RunOutcome::Cancelled);
        }
    };

    match result {
        Ok(summary) => {
            print_summary(orchestrator.config(), Some(&summary));
            Ok(RunOutcome::Completed(summary))
        }
        Err(err) => {
            println!("\nFatal error after {:.1?}", started.elapsed());
            print_summary(orchestrator.config(), None);
            Err(err)
        }
    }
}

fn load_taxonomy(args: &RunArgs) -> anyhow::Result<Vec<CategorySpec>> {
    let table = match args.taxonomy.as_deref() {
        Some(path) => taxonomy::load_json(Path::new(path))?,
        None => taxonomy::builtin(),
    };
    taxonomy::select_categories(table, &args.category_id).context("select categories")
}

async fn confirm_and_run(
    orchestrator: &Orchestrator,
    taxonomy: &[CategorySpec],
    skip_prompt: bool,
) -> anyhow::Result<RunSummary> {
    if !skip_prompt {
        confirm().await?;
    }
    orchestrator.run(taxonomy).await
}

/// Waits for ENTER. The read runs on its own thread so that a Ctrl-C while
/// waiting does not leave the runtime blocked on stdin at shutdown.
async fn confirm() -> anyhow::Result<()> {
    println!("Press ENTER to start scraping... (Ctrl+C to cancel)");
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = tx.send(std::io::stdin().read_line(&mut line));
    });

    let read = rx
        .await
        .context("confirmation reader stopped")?
        .context("read confirmation")?;
    if read == 0 {
        anyhow::bail!("stdin closed before confirmation (pass --yes to skip the prompt)");
    }
    Ok(())
}

fn print_banner(config: &ScrapeConfig, taxonomy: &[CategorySpec]) {
    println!("{RULE}");
    println!("sastra-harvest");
    println!("{RULE}");
    println!("categories:    {}", taxonomy.len());
    println!("subcategories: {}", taxonomy::subcategory_count(taxonomy));
    println!("output:        {}", config.output.out_dir.display());
    println!("log:           {}", config.output.log_file.display());
    println!("progress:      {}", config.output.progress_file.display());
    println!(
        "rate limit:    {:?} per manuscript, {:?} per page, {:?} per subcategory",
        config.delays.item, config.delays.page, config.delays.subcategory
    );
    println!("{RULE}");
}

fn print_summary(config: &ScrapeConfig, summary: Option<&RunSummary>) {
    println!("{RULE}");
    if let Some(summary) = summary {
        println!("done in {:.1?}", summary.elapsed);
        println!(
            "subcategories: {} processed, {} skipped, {} failed (of {})",
            summary.processed, summary.skipped, summary.failed, summary.subcategories_total
        );
        println!("manuscripts saved: {}", summary.manuscripts_saved);
    }
    println!("output: {}", config.output.out_dir.display());
    println!("log:    {}", config.output.log_file.display());
    println!("{RULE}");
}
