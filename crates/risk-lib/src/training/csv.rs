//! CSV-backed training source
//!
//! Expected layout, header row first:
//! `temperature,humidity,windSpeed,visibility,hour,accident`

use super::TrainingSource;
use crate::error::DataSourceError;
use crate::models::{FeatureVector, TrainingSample, FEATURE_COUNT};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Columns a row needs: five features plus the label
const REQUIRED_COLUMNS: usize = FEATURE_COUNT + 1;

/// Reads labeled samples from a delimited text file
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: char,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

#[async_trait]
impl TrainingSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    async fn load(&self) -> Result<Vec<TrainingSample>, DataSourceError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_dataset(&text, self.delimiter)
    }
}

/// Split one line on `delimiter`, honoring double-quoted fields
pub fn parse_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Parse a whole file body into samples
///
/// The first non-blank line is a header. Short rows are dropped; cells
/// that do not parse as finite numbers read as 0.
pub fn parse_dataset(text: &str, delimiter: char) -> Result<Vec<TrainingSample>, DataSourceError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() <= 1 {
        return Err(DataSourceError::Empty);
    }

    let mut samples = Vec::with_capacity(lines.len() - 1);
    let mut skipped = 0usize;

    for line in &lines[1..] {
        let fields = parse_line(line, delimiter);
        if fields.len() < REQUIRED_COLUMNS {
            skipped += 1;
            continue;
        }

        let mut values = [0.0; REQUIRED_COLUMNS];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = parse_number(field);
        }

        let features = FeatureVector::from([values[0], values[1], values[2], values[3], values[4]]);
        samples.push(TrainingSample::new(features, values[FEATURE_COUNT] >= 0.5));
    }

    if skipped > 0 {
        debug!(skipped, kept = samples.len(), "Dropped short CSV rows");
    }

    Ok(samples)
}

/// Whole-field parse: a cell that is not entirely a finite number reads as 0,
/// so `"12.5km"` is 0 rather than 12.5.
fn parse_number(field: &str) -> f64 {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "temperature,humidity,windSpeed,visibility,hour,accident";

    #[test]
    fn test_parse_line_with_quotes() {
        let fields = parse_line(r#" 12.5 ,"1,5",abc , 3"#, ',');
        assert_eq!(fields, vec!["12.5", "1,5", "abc", "3"]);
    }

    #[test]
    fn test_parse_line_custom_delimiter() {
        let fields = parse_line("1;2;3", ';');
        assert_eq!(fields, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_parse_dataset_rows() {
        let text = format!(
            "{}\n36,85,20,1.5,18,1\n\n  20,50,5,10,12,0  \n",
            HEADER
        );
        let samples = parse_dataset(&text, ',').unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].features.temperature, 36.0);
        assert_eq!(samples[0].features.hour, 18.0);
        assert!(samples[0].label);
        assert!(!samples[1].label);
    }

    #[test]
    fn test_short_rows_dropped_and_bad_cells_zeroed() {
        let text = format!("{}\n1,2,3\nabc,50,NaN,10,inf,0.7\n", HEADER);
        let samples = parse_dataset(&text, ',').unwrap();
        assert_eq!(samples.len(), 1);

        let features = samples[0].features;
        assert_eq!(features.temperature, 0.0);
        assert_eq!(features.wind_speed, 0.0);
        assert_eq!(features.hour, 0.0);
        assert!(samples[0].label);
    }

    #[test]
    fn test_trailing_units_are_not_numbers() {
        assert_eq!(parse_number("12.5km"), 0.0);
        assert_eq!(parse_number("12.5"), 12.5);
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(matches!(
            parse_dataset(HEADER, ','),
            Err(DataSourceError::Empty)
        ));
        assert!(matches!(parse_dataset("\n\n", ','), Err(DataSourceError::Empty)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for hour in 0..12 {
            writeln!(file, "20,50,10,8,{},{}", hour, hour % 2).unwrap();
        }

        let source = CsvSource::new(file.path());
        let samples = source.load().await.unwrap();
        assert_eq!(samples.len(), 12);
        assert_eq!(samples.iter().filter(|s| s.label).count(), 6);
    }

    #[tokio::test]
    async fn test_load_with_semicolon_delimiter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temperature;humidity;windSpeed;visibility;hour;accident").unwrap();
        writeln!(file, "36;85;20;1,5;18;1").unwrap();
        writeln!(file, "20;50;5;10;12;0").unwrap();

        let samples = CsvSource::new(file.path())
            .with_delimiter(';')
            .load()
            .await
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].features.humidity, 85.0);
        assert_eq!(samples[1].features.hour, 12.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = CsvSource::new("/nonexistent/accidents.csv");
        assert!(matches!(source.load().await, Err(DataSourceError::Io(_))));
    }
}
