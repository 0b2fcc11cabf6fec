//! JSON rendering of an aggregated result.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::{AggregatedResult, NewsRecord, WeatherRecord};

#[derive(Debug, Error)]
#[error("Error aggregating responses: {0}")]
pub struct FormatError(#[from] serde_json::Error);

#[derive(Serialize)]
struct Payload<'a> {
    weather: &'a WeatherRecord,
    news: &'a [NewsRecord],
    time: String,
}

/// Seconds with two decimals and a unit suffix, e.g. `0.34s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// Serialise `result` into the response body.
pub fn render(result: &AggregatedResult) -> Result<Vec<u8>, FormatError> {
    let payload = Payload {
        weather: &result.weather,
        news: &result.news,
        time: format_elapsed(result.elapsed),
    };

    Ok(serde_json::to_vec(&payload)?)
}
