use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use weathercast::api::AppState;
use weathercast::cli::{Cli, Command};
use weathercast::credentials::{ApiKey, Credentials, DeferredPrompt, TerminalPrompt};
use weathercast::pipeline::{Orchestrator, PipelineState, Stages};
use weathercast::{WeathercastConfig, telemetry, web};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = WeathercastConfig::load_from_path(cli.config.clone())?;
    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;

    let credentials = Credentials::new();
    if let Some(key) = config.generation.resolve_api_key() {
        credentials.select(ApiKey::new(key)?);
    }
    let stages = Stages::from_config(&config, &credentials)?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let orchestrator = Orchestrator::new(stages, credentials, Arc::new(DeferredPrompt));
            web::run(&config.server, AppState::new(orchestrator)).await
        }
        Command::Report { city, output } => {
            let orchestrator = Orchestrator::new(stages, credentials, Arc::new(TerminalPrompt));
            report(&orchestrator, &city, &output).await
        }
    }
}

async fn report(orchestrator: &Orchestrator, city: &str, output: &Path) -> Result<()> {
    let mut updates = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            if let Some(status) = updates.borrow_and_update().status_text() {
                eprintln!("{status}");
            }
        }
    });

    let mut state = orchestrator.run(city).await?;
    if matches!(state, PipelineState::AwaitingCredential { .. })
        && orchestrator.credentials().is_selected()
    {
        state = orchestrator.run(city).await?;
    }
    progress.abort();

    match state {
        PipelineState::Success(report) => {
            println!("{}", report.place.display_name());
            println!("{}", report.place.format_coordinates());
            println!();
            for day in report.forecast.days() {
                println!("  {}", day.format_line());
            }
            println!();
            println!("{}", report.summary);

            report
                .video
                .save(output)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!();
            println!("Video saved to {}", output.display());
            Ok(())
        }
        PipelineState::Error { message, .. } => bail!(message),
        PipelineState::AwaitingCredential { .. } => {
            bail!("No API key selected. Set GEMINI_API_KEY or generation.api_key.")
        }
        other => bail!("Run stopped in unexpected state: {}", other.phase()),
    }
}
