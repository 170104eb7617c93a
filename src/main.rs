//! MediLink ML service
//!
//! Main entry point: serves the prediction API, or fits a static priority
//! model from a CSV file.

use std::path::PathBuf;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::{Parser, Subcommand};
use medilink_ml::config::{self, LoggingConfig};
use medilink_ml::predictors::priority::{fit_priority_model, ModelKind, TrainingTable};
use medilink_ml::{api, telemetry, AppState};
use tracing::info;
use tracing_actix_web::TracingLogger;

#[derive(Parser)]
#[command(name = "medilink-ml", about = "MediLink patient, inventory and triage prediction service")]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Fit a static priority model and write it as JSON
    FitPriority {
        #[arg(long)]
        data: PathBuf,
        /// Feature columns, in the order the route sends them
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<String>,
        #[arg(long)]
        target: String,
        #[arg(long, value_enum, default_value_t = ModelKind::Forest)]
        kind: ModelKind,
        #[arg(long)]
        out: PathBuf,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config).await,
        Commands::FitPriority {
            data,
            features,
            target,
            kind,
            out,
        } => {
            telemetry::init(&LoggingConfig::default())?;
            let table = TrainingTable::from_csv(&data, &features, &target)?;
            let model = fit_priority_model(&table, kind)?;
            model
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            info!(rows = table.rows(), out = %out.display(), ?kind, "priority model written");
            Ok(())
        }
    }
}

async fn serve(config_dir: &str) -> anyhow::Result<()> {
    // Load configuration
    let config = config::load_config_from(config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir))?;

    // Initialize logger
    telemetry::init(&config.logging)?;

    // Train predictors and load static models
    let state = web::Data::new(AppState::from_config(&config)?);

    info!(host = %config.server.host, port = config.server.port, "starting MediLink ML API");

    // Start HTTP server
    let mut server = HttpServer::new(move || {
        App::new()
            // Add app state
            .app_data(state.clone())
            // Enable request tracing
            .wrap(TracingLogger::default())
            // API routes
            .configure(api::configure)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await?;
    Ok(())
}
