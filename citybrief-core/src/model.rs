use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Current conditions for a city, normalised from the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WeatherRecord {
    pub city: String,
    pub region: String,
    pub country: String,
    #[serde(rename = "TempC")]
    pub temp_c: f64,
    pub condition: String,
    #[serde(rename = "IconURL")]
    pub icon_url: String,
    #[serde(rename = "WindKPH")]
    pub wind_kph: f64,
    #[serde(rename = "FeelsLikeC")]
    pub feels_like_c: f64,
}

/// A single article as returned by the news provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewsRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub published: String,
}

/// Both provider results for one request, plus the time it took to gather them.
///
/// Only ever built once weather and news have both been fetched successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub weather: WeatherRecord,
    pub news: Vec<NewsRecord>,
    pub elapsed: Duration,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
