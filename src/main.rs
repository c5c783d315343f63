use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    sastra_harvest::logging::init().context("init logging")?;

    let cli = sastra_harvest::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Some(sastra_harvest::cli::Command::Probe(args)) => {
            sastra_harvest::probe::run(args).await.context("probe")?;
        }
        None => match sastra_harvest::runner::run(cli.run).await.context("run")? {
            sastra_harvest::runner::RunOutcome::Completed(_) => {}
            sastra_harvest::runner::RunOutcome::Cancelled => {
                println!("\nScraping cancelled by user.");
                println!("Progress saved. Run again to resume.");
            }
        },
    }

    Ok(())
}
