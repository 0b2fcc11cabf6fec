use crate::{
    Config, NewsRecord, WeatherRecord,
    provider::{currents::CurrentsNewsClient, weatherapi::WeatherApiClient},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod currents;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Weather,
    News,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Weather => "weather",
            ProviderId::News => "news",
        }
    }

    /// Environment variable that carries this provider's credential.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::Weather => "WEATHER_API_KEY",
            ProviderId::News => "NEWS_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Weather, ProviderId::News]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weather" => Ok(ProviderId::Weather),
            "news" => Ok(ProviderId::News),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: weather, news."
            )),
        }
    }
}

/// Current weather lookup by city name.
///
/// Implementations are shared between concurrently running tasks, so they
/// must not keep mutable state beyond their read-only credentials.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch_weather(&self, city: &str) -> anyhow::Result<WeatherRecord>;
}

/// Latest news lookup by city name. Articles keep the provider's order.
#[async_trait]
pub trait NewsSource: Send + Sync + Debug {
    async fn fetch_news(&self, city: &str) -> anyhow::Result<Vec<NewsRecord>>;
}

fn require_api_key(id: ProviderId, config: &Config) -> anyhow::Result<String> {
    config
        .provider_api_key(id)
        .map(str::to_owned)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: set {} or run `citybrief configure {id}` and enter your API key.",
                id.api_key_env()
            )
        })
}

/// Construct the weather client from config.
pub fn weather_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let api_key = require_api_key(ProviderId::Weather, config)?;
    let base_url = config
        .provider_config(ProviderId::Weather)
        .and_then(|p| p.base_url.clone());

    let client = match base_url {
        Some(url) => WeatherApiClient::with_base_url(api_key, &url)?,
        None => WeatherApiClient::new(api_key),
    };

    Ok(Arc::new(client))
}

/// Construct the news client from config.
pub fn news_from_config(config: &Config) -> anyhow::Result<Arc<dyn NewsSource>> {
    let api_key = require_api_key(ProviderId::News, config)?;
    let mut client = CurrentsNewsClient::new(api_key);

    if let Some(provider) = config.provider_config(ProviderId::News) {
        if let Some(url) = &provider.base_url {
            client = client.with_base_url(url);
        }
        if let Some(language) = &provider.language {
            client = client.with_language(language);
        }
    }

    Ok(Arc::new(client))
}

/// Shorten an upstream body to its first 200 characters for an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
