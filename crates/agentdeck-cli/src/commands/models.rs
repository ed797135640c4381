//! Base model commands.

use std::time::Duration;

use agentdeck_client::{DeckConfig, StreamAccumulator, StreamRecord};
use indicatif::{ProgressBar, ProgressStyle};

use super::format_size;

/// List installed base models.
pub(crate) async fn list(config: &DeckConfig) -> miette::Result<()> {
    let session = super::connect(config).await?;
    let catalog = session.catalog();

    if catalog.base_models.is_empty() {
        println!("No base models installed.");
        println!();
        println!("To download one, run:");
        println!("  agentdeck pull qwen2:7b");
        return Ok(());
    }

    println!("Base models:");
    for model in &catalog.base_models {
        match model.size {
            Some(size) => println!("  - {} ({})", model.name, format_size(size)),
            None => println!("  - {}", model.name),
        }
    }

    Ok(())
}

/// Delete an installed base model.
pub(crate) async fn delete(config: &DeckConfig, name: &str) -> miette::Result<()> {
    let mut session = super::connect(config).await?;

    if session.catalog().find_base_model(name).is_none() {
        println!("'{}' is not an installed base model, trying anyway.", name);
    }

    session
        .delete_base_model(name)
        .await
        .map_err(|e| miette::miette!("Failed to delete model: {}", e))?;

    println!("Deleted '{}'.", name);
    Ok(())
}

/// Download a model with a progress bar.
pub(crate) async fn pull(config: &DeckConfig, name: &str) -> miette::Result<()> {
    let mut session = super::connect(config).await?;

    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .map_err(|e| miette::miette!("Invalid progress bar template: {}", e))?
        .progress_chars("#>-");
    let spinner_style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .map_err(|e| miette::miette!("Invalid progress bar template: {}", e))?;

    println!("Pulling model: {}", name);
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style);
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut on_update = |_: &StreamRecord, progress: &StreamAccumulator| {
        if let Some(percent) = progress.percent {
            if pb.length().is_none() {
                pb.set_length(100);
                pb.set_style(bar_style.clone());
            }
            pb.set_position(u64::from(percent));
        }
        if let Some(status) = &progress.status {
            pb.set_message(status.clone());
        }
    };

    match session.pull(name, &mut on_update).await {
        Ok(progress) => {
            let status = progress.status.unwrap_or_else(|| "done".to_string());
            pb.finish_with_message(status);
            println!("Model '{}' is ready.", name);
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            Err(miette::miette!("Failed to pull model: {}", e))
        }
    }
}
