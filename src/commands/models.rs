//! Model management commands for LAIM
//!
//! Thin CLI wrappers over the backend client: list installed models, pull a
//! model with live progress, and delete a model.

use crate::backend::{Backend, ModelTag, OllamaBackend};
use crate::config::Config;
use crate::dispatcher::action::validate_model;
use crate::error::{LaimError, Result};
use crate::relay::{self, records, RelayOptions, RelayOutcome, WriterSink};
use colored::Colorize;
use prettytable::{row, Table};
use tokio_util::sync::CancellationToken;

/// List models installed on the backend
///
/// # Examples
///
/// ```no_run
/// use laim::config::Config;
/// use laim::commands::models::list_models;
///
/// # async fn example() -> anyhow::Result<()> {
/// list_models(&Config::default(), false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(config: &Config, json: bool) -> Result<()> {
    tracing::info!("Listing models from {}", config.backend.host);

    let backend = OllamaBackend::new(config.backend.clone())?;
    let models = backend.list_models().await?;

    if models.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No models installed on {}", config.backend.host);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        output_models_table(&models, &config.backend.host);
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const GB: f64 = 1_000_000_000.0;
    const MB: f64 = 1_000_000.0;
    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else {
        format!("{:.0} MB", bytes / MB)
    }
}

fn output_models_table(models: &[ModelTag], host: &str) {
    let mut table = Table::new();
    table.add_row(row!["Model Name", "Size", "Digest", "Modified"]);

    for model in models {
        let digest: String = model.digest.chars().take(12).collect();
        table.add_row(row![
            model.name,
            format_size(model.size),
            digest,
            model.modified_at
        ]);
    }

    println!("\nInstalled models on {}:\n", host);
    table.printstd();
    println!();
}

/// Pull a model, printing each progress record to stdout
///
/// Ctrl-C stops printing and abandons the pull.
pub async fn pull_model(config: &Config, name: &str) -> Result<()> {
    validate_model(name)?;
    tracing::info!("Pulling model {}", name);

    let backend = OllamaBackend::new(config.backend.clone())?;
    let body = backend.pull(name).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut sink = WriterSink::new(tokio::io::stdout());
    let report = relay::forward(
        records(body, config.limits.max_record_bytes),
        &mut sink,
        &cancel,
        RelayOptions::default(),
    )
    .await;

    match report.outcome {
        RelayOutcome::Completed => {
            println!("{} {}", "Pulled".green().bold(), name);
            Ok(())
        }
        RelayOutcome::Truncated => Err(LaimError::Truncated(format!(
            "pull of {} ended before the backend reported success",
            name
        ))
        .into()),
        RelayOutcome::Aborted => {
            Err(LaimError::BackendUnavailable(format!("pull of {} was interrupted", name)).into())
        }
        RelayOutcome::Failed(err) => Err(err.into()),
    }
}

/// Delete an installed model
pub async fn delete_model(config: &Config, name: &str) -> Result<()> {
    validate_model(name)?;
    let backend = OllamaBackend::new(config.backend.clone())?;
    backend.delete(name).await?;
    tracing::info!("Deleted model {}", name);
    println!("{} {}", "Deleted".green().bold(), name);
    Ok(())
}
