//! Risk scoring and history CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, RiskResult, TelemetryRequest};
use crate::output::{
    color_level, color_trend, format_probability, print_json, print_table, print_warning,
    OutputFormat,
};

const FEATURE_LABELS: [&str; 5] = ["Temperature", "Humidity", "Wind/Speed", "Visibility", "Hour"];

/// Row for the history table
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Risk")]
    probability: String,
    #[tabled(rename = "Level")]
    level: String,
}

/// Row for the feature breakdown of a single score
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Score a snapshot built from the given conditions
pub async fn calculate(
    client: &ApiClient,
    request: TelemetryRequest,
    format: OutputFormat,
) -> Result<()> {
    let result = client.calculate_risk(&request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_risk(&result),
    }

    Ok(())
}

fn print_risk(result: &RiskResult) {
    println!("{}", "Accident Risk".bold());
    println!("{}", "=".repeat(40));
    println!("Probability: {}", format_probability(result.probability).bold());
    println!("Level:       {}", color_level(&result.level));
    println!(
        "Scored by:   {}",
        if result.is_fallback {
            "rules".yellow()
        } else {
            "model".green()
        }
    );
    println!("Timestamp:   {}", result.timestamp);
    println!();

    let rows: Vec<FeatureRow> = FEATURE_LABELS
        .iter()
        .zip(&result.features)
        .map(|(name, value)| FeatureRow {
            name: name.to_string(),
            value: format!("{:.1}", value),
        })
        .collect();
    print_table(rows);
}

/// Show the recorded risk history, newest first
pub async fn history(client: &ApiClient, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let report = client.history(limit).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!(
                "Current risk: {}",
                format_probability(report.current).bold()
            );

            if report.history.is_empty() {
                print_warning("No risk history recorded");
                return Ok(());
            }

            let rows: Vec<HistoryRow> = report
                .history
                .iter()
                .map(|entry| HistoryRow {
                    timestamp: entry.timestamp.clone(),
                    probability: format_probability(entry.probability),
                    level: color_level(&entry.level),
                })
                .collect();
            print_table(rows);

            if let Some(stats) = report.stats {
                println!(
                    "\nAverage: {}  Min: {}  Max: {}  Trend: {}",
                    format_probability(stats.average),
                    format_probability(stats.min),
                    format_probability(stats.max),
                    color_trend(&stats.trend)
                );
                println!("Total: {} records", stats.total_records);
            }
        }
    }

    Ok(())
}
