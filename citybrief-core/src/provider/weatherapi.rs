use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::{model::WeatherRecord, provider::truncate_body};

use super::WeatherSource;

pub const DEFAULT_BASE_URL: &str = "https://weatherapi-com.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "weatherapi-com.p.rapidapi.com";

/// WeatherAPI.com current conditions, accessed through RapidAPI.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    api_key: String,
    base_url: String,
    host: String,
    http: Client,
}

impl WeatherApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            host: RAPIDAPI_HOST.to_string(),
            http: Client::new(),
        }
    }

    /// Point the client at a different endpoint. The `x-rapidapi-host`
    /// header follows the host of `base_url`.
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid weather API base URL '{base_url}'"))?;
        let host = parsed
            .host_str()
            .with_context(|| format!("Weather API base URL '{base_url}' has no host"))?
            .to_string();

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
            http: Client::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    feelslike_c: f64,
    wind_kph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[async_trait]
impl WeatherSource for WeatherApiClient {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherRecord> {
        debug!(city, "fetching current weather");
        let url = format!("{}/current.json", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", city)])
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", &self.api_key)
            .send()
            .await
            .context("Failed to send request to WeatherAPI.com (current)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WeatherAPI current response body")?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WaResponse =
            serde_json::from_str(&body).context("Failed to parse WeatherAPI current JSON")?;

        Ok(WeatherRecord {
            city: parsed.location.name,
            region: parsed.location.region,
            country: parsed.location.country,
            temp_c: parsed.current.temp_c,
            condition: parsed.current.condition.text,
            icon_url: absolute_icon_url(&parsed.current.condition.icon),
            wind_kph: parsed.current.wind_kph,
            feels_like_c: parsed.current.feelslike_c,
        })
    }
}

/// The API hands out protocol-relative icon links (`//cdn...`).
fn absolute_icon_url(icon: &str) -> String {
    if icon.starts_with("//") { format!("https:{icon}") } else { icon.to_string() }
}
