use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{model::NewsRecord, provider::truncate_body};

use super::NewsSource;

pub const DEFAULT_BASE_URL: &str = "https://api.currentsapi.services";
pub const DEFAULT_LANGUAGE: &str = "es";

/// Latest headlines from the Currents API.
#[derive(Debug, Clone)]
pub struct CurrentsNewsClient {
    api_key: String,
    base_url: String,
    language: String,
    http: Client,
}

impl CurrentsNewsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.trim().to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CurrentsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    news: Vec<NewsRecord>,
}

#[async_trait]
impl NewsSource for CurrentsNewsClient {
    async fn fetch_news(&self, city: &str) -> Result<Vec<NewsRecord>> {
        debug!(city, language = %self.language, "fetching latest news");
        let url = format!("{}/v1/latest-news", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("language", self.language.as_str()),
                ("keywords", city),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to send request to Currents API (latest news)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Currents API response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Currents API latest news request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: CurrentsResponse =
            serde_json::from_str(&body).context("Failed to parse Currents API latest news JSON")?;

        if let Some(reported) = parsed.status.as_deref() {
            if !reported.eq_ignore_ascii_case("ok") {
                return Err(anyhow!(
                    "Currents API reported status '{}': {}",
                    reported,
                    truncate_body(&body),
                ));
            }
        }

        debug!(city, articles = parsed.news.len(), "news fetched");
        Ok(parsed.news)
    }
}
