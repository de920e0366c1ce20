//! Vehicle Telemetry Risk CLI
//!
//! A command-line tool for scoring conditions, browsing risk history and
//! managing the scoring model of a running risk agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{model, risk};

/// Vehicle Telemetry Risk CLI
#[derive(Parser)]
#[command(name = "vtr")]
#[command(author, version, about = "CLI for the Vehicle Telemetry Risk agent", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via VTR_API_URL env var)
    #[arg(long, env = "VTR_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score the accident risk for the given conditions
    Risk {
        /// Outside temperature in °C
        #[arg(long, allow_negative_numbers = true)]
        temperature: Option<f64>,

        /// Relative humidity in %
        #[arg(long)]
        humidity: Option<f64>,

        /// Vehicle speed
        #[arg(long)]
        speed: Option<f64>,

        /// Visibility in km
        #[arg(long)]
        visibility: Option<f64>,
    },

    /// Show recorded risk history
    History {
        /// Maximum number of entries to show
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show predictor and model status
    Status,

    /// Retrain the scoring model
    Retrain,

    /// Save defaults to ~/.config/vtr/config.json
    Configure {
        /// Default API endpoint URL
        #[arg(long = "set-api-url")]
        set_api_url: Option<String>,

        /// Default output format
        #[arg(long = "set-format")]
        set_format: Option<output::OutputFormat>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load()?;
    let format = config.resolve_format(cli.format);
    let api_url = config.resolve_api_url(cli.api_url);
    let api = || client::ApiClient::new(&api_url);

    match cli.command {
        Commands::Risk {
            temperature,
            humidity,
            speed,
            visibility,
        } => {
            let request = client::TelemetryRequest {
                temperature,
                humidity,
                speed,
                visibility,
            };
            risk::calculate(&api()?, request, format).await?;
        }
        Commands::History { limit } => {
            risk::history(&api()?, limit, format).await?;
        }
        Commands::Status => {
            model::status(&api()?, format).await?;
        }
        Commands::Retrain => {
            model::retrain(&api()?, format).await?;
        }
        Commands::Configure {
            set_api_url,
            set_format,
        } => {
            if let Some(url) = set_api_url {
                url::Url::parse(&url)?;
                config.api_url = Some(url);
            }
            if let Some(format) = set_format {
                config.default_format = Some(format.name().to_string());
            }
            config.save()?;
            output::print_success("Configuration saved");
        }
    }

    Ok(())
}
