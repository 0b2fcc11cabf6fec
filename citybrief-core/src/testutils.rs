//! Helpers shared by unit tests: canned records, scripted providers and
//! throwaway upstream servers.

use crate::model::{NewsRecord, WeatherRecord};
use crate::provider::{NewsSource, WeatherSource};
use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

pub fn weather_for(city: &str) -> WeatherRecord {
    WeatherRecord {
        city: city.to_string(),
        region: "Region Metropolitana".to_string(),
        country: "Chile".to_string(),
        temp_c: 7.7,
        condition: "Overcast".to_string(),
        icon_url: "https://cdn.weatherapi.com/weather/64x64/night/122.png".to_string(),
        wind_kph: 3.6,
        feels_like_c: 7.9,
    }
}

pub fn sample_news(count: usize) -> Vec<NewsRecord> {
    (0..count)
        .map(|i| NewsRecord {
            id: format!("news-{i}"),
            title: format!("Headline {i}"),
            description: format!("Story number {i}"),
            url: format!("https://news.example/{i}"),
            author: "Redacción".to_string(),
            image: "None".to_string(),
            language: "es".to_string(),
            category: vec!["regional".to_string()],
            published: "2024-07-25 00:45:00 +0000".to_string(),
        })
        .collect()
}

/// Weather provider that waits `delay` and then answers from a script.
#[derive(Debug)]
pub struct ScriptedWeather {
    pub delay: Duration,
    pub failure: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedWeather {
    pub fn ok(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay, failure: None, calls: AtomicUsize::new(0) })
    }

    pub fn failing(delay: Duration, message: &str) -> Arc<Self> {
        Arc::new(Self { delay, failure: Some(message.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedWeather {
    async fn fetch_weather(&self, city: &str) -> anyhow::Result<WeatherRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(weather_for(city)),
        }
    }
}

/// News provider that waits `delay` and then answers from a script.
#[derive(Debug)]
pub struct ScriptedNews {
    pub delay: Duration,
    pub articles: usize,
    pub failure: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedNews {
    pub fn ok(delay: Duration, articles: usize) -> Arc<Self> {
        Arc::new(Self { delay, articles, failure: None, calls: AtomicUsize::new(0) })
    }

    pub fn failing(delay: Duration, message: &str) -> Arc<Self> {
        Arc::new(Self {
            delay,
            articles: 0,
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for ScriptedNews {
    async fn fetch_news(&self, _city: &str) -> anyhow::Result<Vec<NewsRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(sample_news(self.articles)),
        }
    }
}

/// Weather provider whose task dies instead of returning.
#[derive(Debug)]
pub struct PanickingWeather;

#[async_trait]
impl WeatherSource for PanickingWeather {
    async fn fetch_weather(&self, _city: &str) -> anyhow::Result<WeatherRecord> {
        panic!("weather provider blew up");
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a local port nothing is listening on.
pub async fn closed_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
