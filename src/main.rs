use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};

use comment_relay::cli::{Cli, Command, LookupList};
use comment_relay::config::RelayConfig;
use comment_relay::service::CommentService;
use comment_relay::task::TaskStatus;
use comment_relay::telemetry;
use comment_relay::ui::{SubmissionProgress, print_json};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RelayConfig::load_from(&cli.config)?;
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    telemetry::init(&config.logging)?;

    let service = CommentService::from_config(&config).context("failed to set up services")?;

    match cli.command {
        Command::Submit { file } => {
            let body = read_json(&file)?;
            let progress = SubmissionProgress::start("Validating comment");
            let (ticket, handle) = match service.submit(body) {
                Ok(submitted) => submitted,
                Err(err) => {
                    progress.abort(&err.to_string());
                    return Err(err.into());
                }
            };
            progress.note(&format!("Tracking record will appear at {}", ticket.metadata_url));
            progress.set_message(&format!("Submitting comment (task {})", handle.task_id()));

            let report = handle.wait().await.context("submission task aborted")?;
            progress.complete(&report);
            progress.print_report(&report);
            if report.status != TaskStatus::Completed {
                bail!("submission task {} did not complete", report.task_id);
            }
        }
        Command::Preview { file } => {
            let body = read_json(&file)?;
            let progress = SubmissionProgress::start("Rendering preview");
            match service.preview(body).await {
                Ok(url) => {
                    progress.finish();
                    print_json(&json!({ "url": url }));
                }
                Err(err) => {
                    progress.abort(&err.to_string());
                    return Err(err.into());
                }
            }
        }
        Command::UploadUrl {
            name,
            size,
            content_type,
        } => {
            let ticket = service.request_upload(&name, size, content_type.as_deref())?;
            print_json(&ticket);
        }
        Command::Lookup { list } => {
            let values = match list {
                LookupList::FederalAgencies => service.federal_agencies().await?,
                LookupList::AgencyTypes => service.agency_types().await?,
            };
            print_json(&values);
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}
