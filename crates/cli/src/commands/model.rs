//! Model status and retraining CLI commands

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{
    color_flag, format_probability, print_info, print_json, print_success, print_warning,
    OutputFormat,
};

/// Show predictor and model status
pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            let model = &status.model;
            println!("{}", "Risk Predictor Status".bold());
            println!("{}", "=".repeat(40));
            println!("Initialized:   {}", color_flag(status.is_initialized));
            println!("Current risk:  {}", format_probability(status.current_risk));
            println!("History size:  {}", status.history_size);
            println!();
            println!("{}", "Model".bold());
            println!("Trained:       {}", color_flag(model.is_trained));
            println!("Network ready: {}", color_flag(model.model_ready));
            println!("Training now:  {}", color_flag(model.is_training));
            println!("Accuracy:      {}", format_probability(model.accuracy));
            println!(
                "Dataset:       {} ({} samples)",
                model.data_source.cyan(),
                model.samples_count
            );
            if let Some(trained_at) = &model.trained_at {
                println!("Trained at:    {}", trained_at);
            }

            if model.consecutive_nan > 0 {
                println!();
                print_warning(&format!(
                    "Network produced {} consecutive NaN outputs",
                    model.consecutive_nan
                ));
            } else if !model.model_ready {
                println!();
                print_warning("Scoring with rule-based fallback");
            }
        }
    }

    Ok(())
}

/// Trigger a retrain and report the outcome
pub async fn retrain(client: &ApiClient, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Table {
        print_info("Retraining model, this may take a while...");
    }

    let response = client.retrain().await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.success {
                print_success("Model retrained");
            } else {
                print_warning("Retrain did not produce a new model; check agent logs");
            }
        }
    }

    Ok(())
}
