use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use docbatch::cli::{Cli, Command, DecisionArg};
use docbatch::ui::JobProgress;
use docbatch::{
    logging, ApprovalRequest, BatchConfig, BatchRequest, BatchService, HttpStageClient, Job,
    JobStatus,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Run {
            documents,
            needs_approval,
            decision,
        } => run(&config, documents, needs_approval, decision).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<BatchConfig> {
    let mut config = match &cli.config {
        Some(path) => BatchConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => BatchConfig::load()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(
    config: &BatchConfig,
    documents: usize,
    needs_approval: bool,
    decision: Option<DecisionArg>,
) -> Result<()> {
    let client = HttpStageClient::new(config)?;
    let service = BatchService::new(client, config);
    let poll = Duration::from_millis(config.poll_interval_ms.max(1));

    let job = service.submit_batch(&BatchRequest {
        number_of_documents: documents,
        needs_approval,
    })?;

    let progress = JobProgress::start(&job.snapshot());
    let mut status = follow(&service, &job, &progress, poll).await;

    if status == JobStatus::PendingApproval {
        if let Some(decision) = decision {
            progress.note(&format!("applying decision: {decision:?}"));
            service.submit_approval(&ApprovalRequest {
                job_id: job.id(),
                approved: decision.approved(),
            })?;
            status = follow(&service, &job, &progress, poll).await;
        }
    }

    let snapshot = job.snapshot();
    progress.complete(&snapshot);
    println!();
    print!("{}", service.results_report());
    progress.print_snapshot(&snapshot);

    service.shutdown().await;

    if status == JobStatus::Failed {
        anyhow::bail!("job {} failed", job.id());
    }
    Ok(())
}

// Refresh the spinner until the job settles. Ctrl-C cancels running pipelines.
async fn follow(
    service: &BatchService<HttpStageClient>,
    job: &Job,
    progress: &JobProgress,
    poll: Duration,
) -> JobStatus {
    let mut ticker = tokio::time::interval(poll);
    loop {
        tokio::select! {
            status = job.wait_until(JobStatus::is_settled) => {
                progress.update(&job.snapshot());
                return status;
            }
            _ = ticker.tick() => progress.update(&job.snapshot()),
            _ = tokio::signal::ctrl_c() => {
                progress.note("interrupted, cancelling pipelines");
                service.cancel_all();
            }
        }
    }
}
