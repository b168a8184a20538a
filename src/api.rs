//! HTTP adapter for the fleet backend REST API.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FleetError, Result};
use crate::model::{
    BinId, BinSnapshot, DriverRecord, GenerateRequest, GenerateSummary, RouteId, RouteSnapshot,
    RouteStatus,
};
use crate::traits::FleetBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        let response = check_status(response, &url)?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder, url: &str) -> Result<()> {
        let response = request.send().await?;
        check_status(response, url)?;
        Ok(())
    }
}

fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FleetError::Status {
            status,
            url: url.to_string(),
        })
    }
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
}

impl FleetBackend for ApiClient {
    async fn bins(&self) -> Result<Vec<BinSnapshot>> {
        self.get_json(self.url("/api/bins")).await
    }

    async fn drivers(&self) -> Result<Vec<DriverRecord>> {
        self.get_json(self.url("/api/drivers")).await
    }

    async fn routes(&self, date: Option<NaiveDate>) -> Result<Vec<RouteSnapshot>> {
        let url = match date {
            Some(date) => self.url(&format!("/api/routes?date={}", date_param(date))),
            None => self.url("/api/routes"),
        };
        self.get_json(url).await
    }

    async fn auto_generate(&self, request: GenerateRequest) -> Result<GenerateSummary> {
        let mut url = self.url(&format!(
            "/api/routes/auto-generate?threshold={}&maxStops={}",
            request.threshold, request.max_stops
        ));
        if let Some(date) = request.date {
            url.push_str(&format!("&date={}", date_param(date)));
        }

        debug!(%url, "POST");
        let response = self.client.post(&url).send().await?;
        let response = check_status(response, &url)?;
        Ok(response.json::<GenerateSummary>().await?)
    }

    async fn start_collecting(&self, date: Option<NaiveDate>) -> Result<()> {
        let url = match date {
            Some(date) => self.url(&format!(
                "/api/routes/start-collecting?date={}",
                date_param(date)
            )),
            None => self.url("/api/routes/start-collecting"),
        };
        debug!(%url, "POST");
        self.send_empty(self.client.post(&url), &url).await
    }

    async fn collect_bin(&self, route_id: RouteId, bin_id: BinId) -> Result<()> {
        let url = self.url(&format!("/api/routes/{}/collect-bin/{}", route_id, bin_id));
        debug!(%url, "POST");
        self.send_empty(self.client.post(&url), &url).await
    }

    async fn update_route_status(&self, route_id: RouteId, status: RouteStatus) -> Result<()> {
        let url = self.url(&format!("/api/routes/{}/status", route_id));
        debug!(%url, %status, "PATCH");
        let request = self.client.patch(&url).json(&StatusBody {
            status: status.as_str(),
        });
        self.send_empty(request, &url).await
    }
}
