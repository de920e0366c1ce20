//! API client for communicating with the risk agent

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the risk agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn calculate_risk(&self, request: &TelemetryRequest) -> Result<RiskResult> {
        self.post("api/v1/risk", request).await
    }

    pub async fn history(&self, limit: Option<usize>) -> Result<HistoryReport> {
        let path = match limit {
            Some(limit) => format!("api/v1/history?limit={}", limit),
            None => "api/v1/history".to_string(),
        };
        self.get(&path).await
    }

    pub async fn status(&self) -> Result<SystemStatus> {
        self.get("api/v1/status").await
    }

    pub async fn retrain(&self) -> Result<RetrainResponse> {
        self.post("api/v1/model/retrain", &serde_json::json!({})).await
    }
}

// API request and response types

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub probability: f64,
    pub level: String,
    /// temperature, humidity, windSpeed, visibility, hour
    pub features: Vec<f64>,
    pub timestamp: String,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEntry {
    pub probability: f64,
    pub level: String,
    pub timestamp: String,
    #[serde(default)]
    pub sensor_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub trend: String,
    pub total_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryReport {
    pub current: f64,
    pub history: Vec<RiskEntry>,
    #[serde(default)]
    pub stats: Option<RiskStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub is_trained: bool,
    pub is_training: bool,
    pub accuracy: f64,
    pub model_ready: bool,
    pub samples_count: usize,
    pub data_source: String,
    #[serde(default)]
    pub consecutive_nan: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub is_initialized: bool,
    pub model: ModelStats,
    pub current_risk: f64,
    pub history_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_calculate_risk_posts_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/risk")
            .match_body(Matcher::Json(serde_json::json!({
                "temperature": 38.0,
                "speed": 90.0
            })))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"probability":0.65,"level":"high","features":[38,50,90,10,17],
                   "timestamp":"2024-03-15T17:00:00Z","isFallback":true}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result = client
            .calculate_risk(&TelemetryRequest {
                temperature: Some(38.0),
                speed: Some(90.0),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.level, "high");
        assert!(result.is_fallback);
        assert_eq!(result.features.len(), 5);
    }

    #[tokio::test]
    async fn test_history_sends_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/history")
            .match_query(Matcher::UrlEncoded("limit".into(), "2".into()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"current":0.4,"history":[{"probability":0.4,"level":"medium",
                   "timestamp":"2024-03-15T17:00:00Z","sensorData":{"speed":30}}],
                   "stats":{"average":0.4,"max":0.4,"min":0.4,"trend":"stable","totalRecords":1}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report = client.history(Some(2)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.stats.unwrap().trend, "stable");
    }

    #[tokio::test]
    async fn test_empty_history_has_no_stats() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/history")
            .with_body(r#"{"current":0.0,"history":[],"stats":null}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report = client.history(None).await.unwrap();
        assert!(report.history.is_empty());
        assert!(report.stats.is_none());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/status")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.status().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_retrain() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/model/retrain")
            .with_body(r#"{"success":false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(!client.retrain().await.unwrap().success);
        mock.assert_async().await;
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
