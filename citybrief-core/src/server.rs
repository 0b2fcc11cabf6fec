//! HTTP surface: one GET route per aggregation strategy.
//!
//! Every request goes through the same steps: validate the `city` parameter,
//! fetch both providers under the route's strategy, render the JSON body.
//! Validation failures answer 400, anything later answers 500, both with a
//! short plain-text message.

use std::time::Instant;

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    Config,
    aggregate::{AggregateError, Aggregator, Strategy},
    format::{self, FormatError},
    provider::{news_from_config, weather_from_config},
    validate::validate_city,
};

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }

    /// Build both provider clients from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let weather = weather_from_config(config)?;
        let news = news_from_config(config)?;
        Ok(Self::new(Aggregator::new(weather, news)))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Fetch(#[from] AggregateError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchError::Fetch(_) | DispatchError::Format(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Query parameters in request order. A repeated `city` resolves to its first value.
type QueryPairs = Query<Vec<(String, String)>>;

fn city_param(pairs: &[(String, String)]) -> &str {
    pairs
        .iter()
        .find(|(key, _)| key == "city")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default()
}

/// Create the application router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/control", get(control))
        .route("/waitgroup", get(waitgroup))
        .route("/channels", get(channels))
        .route("/mutexes", get(mutexes));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind((host, port)).await?;
    info!("citybrief listening on http://{}", listener.local_addr()?);
    for strategy in Strategy::all() {
        debug!(%strategy, route = %format!("/api/{}", strategy.route()), "route registered");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health() -> &'static str {
    "ok"
}

async fn control(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Response, DispatchError> {
    dispatch(&state, city_param(&pairs), Strategy::Sequential).await
}

async fn waitgroup(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Response, DispatchError> {
    dispatch(&state, city_param(&pairs), Strategy::ParallelJoin).await
}

async fn channels(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Response, DispatchError> {
    dispatch(&state, city_param(&pairs), Strategy::Channel).await
}

async fn mutexes(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Response, DispatchError> {
    dispatch(&state, city_param(&pairs), Strategy::LockGuarded).await
}

/// Validate, aggregate and render one request.
pub async fn dispatch(
    state: &AppState,
    city: &str,
    strategy: Strategy,
) -> Result<Response, DispatchError> {
    let started = Instant::now();
    info!(%strategy, city, "handling request");

    let problems = validate_city(city);
    if !problems.is_empty() {
        warn!(%strategy, ?problems, "rejected city");
        return Err(DispatchError::Validation(problems));
    }

    let result = state.aggregator.aggregate(city.trim(), strategy, started).await?;
    let body = format::render(&result)?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{NewsSource, WeatherSource};
    use crate::testutils::{ScriptedNews, ScriptedWeather, sample_news};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(weather: Arc<dyn WeatherSource>, news: Arc<dyn NewsSource>) -> Router {
        router(AppState::new(Aggregator::new(weather, news)))
    }

    fn healthy_app() -> Router {
        app(ScriptedWeather::ok(Duration::from_millis(5)), ScriptedNews::ok(Duration::from_millis(5), 3))
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, content_type, body)
    }

    fn looks_like_elapsed(time: &str) -> bool {
        let Some(number) = time.strip_suffix('s') else { return false };
        let Some((whole, fraction)) = number.split_once('.') else { return false };
        !whole.is_empty()
            && whole.chars().all(|c| c.is_ascii_digit())
            && fraction.len() == 2
            && fraction.chars().all(|c| c.is_ascii_digit())
    }

    #[tokio::test]
    async fn waitgroup_returns_merged_json() {
        let (status, content_type, body) = call(healthy_app(), "/api/waitgroup?city=Santiago").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["weather"]["City"], "Santiago");
        assert_eq!(value["news"], serde_json::to_value(sample_news(3)).unwrap());
        assert!(looks_like_elapsed(value["time"].as_str().unwrap()), "{}", value["time"]);
    }

    #[tokio::test]
    async fn every_route_serves_the_same_payload_shape() {
        for strategy in Strategy::all() {
            let uri = format!("/api/{}?city=New%20York", strategy.route());
            let (status, _, body) = call(healthy_app(), &uri).await;

            assert_eq!(status, StatusCode::OK, "{strategy}");
            let value: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value["weather"]["City"], "New York", "{strategy}");
            assert_eq!(value["news"].as_array().unwrap().len(), 3, "{strategy}");
        }
    }

    #[tokio::test]
    async fn invalid_city_is_a_client_error() {
        let (status, _, body) = call(healthy_app(), "/api/control?city=Paris123").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "Validation error: city contains invalid characters");
    }

    #[tokio::test]
    async fn missing_city_is_reported_as_empty() {
        let (status, _, body) = call(healthy_app(), "/api/channels").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "Validation error: city cannot be empty");
    }

    #[tokio::test]
    async fn repeated_city_uses_the_first_value() {
        for strategy in Strategy::all() {
            let uri = format!("/api/{}?city=Lima&city=Quito", strategy.route());
            let (status, _, body) = call(healthy_app(), &uri).await;

            assert_eq!(status, StatusCode::OK, "{strategy}");
            let value: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value["weather"]["City"], "Lima", "{strategy}");
        }
    }

    #[tokio::test]
    async fn repeated_invalid_city_is_a_plain_text_validation_error() {
        let (status, _, body) = call(healthy_app(), "/api/control?city=Lima1&city=Quito").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "Validation error: city contains invalid characters");
    }

    #[tokio::test]
    async fn other_parameters_are_ignored() {
        let (status, _, body) = call(healthy_app(), "/api/waitgroup?units=metric&city=Santiago").await;

        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["weather"]["City"], "Santiago");
    }

    #[test]
    fn city_param_defaults_to_empty() {
        assert_eq!(city_param(&[]), "");
        let pairs = vec![("q".to_string(), "x".to_string())];
        assert_eq!(city_param(&pairs), "");
    }

    #[tokio::test]
    async fn all_validation_problems_are_listed() {
        let long = format!("{}9", "a".repeat(120));
        let (status, _, body) = call(healthy_app(), &format!("/api/mutexes?city={long}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Validation error: city name is too long; city contains invalid characters"
        );
    }

    #[tokio::test]
    async fn provider_failure_is_a_server_error_without_partial_body() {
        for strategy in Strategy::all() {
            let app = app(
                ScriptedWeather::failing(Duration::from_millis(1), "timeout"),
                ScriptedNews::ok(Duration::from_millis(1), 3),
            );
            let (status, _, body) = call(app, &format!("/api/{}?city=Santiago", strategy.route())).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{strategy}");
            let text = String::from_utf8(body).unwrap();
            assert_eq!(text, "Error fetching weather data: timeout", "{strategy}");
            assert!(serde_json::from_str::<Value>(&text).is_err());
        }
    }

    #[tokio::test]
    async fn news_failure_names_the_news_provider() {
        let app = app(
            ScriptedWeather::ok(Duration::from_millis(1)),
            ScriptedNews::failing(Duration::from_millis(1), "bad gateway"),
        );
        let (status, _, body) = call(app, "/api/control?city=Lima").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(String::from_utf8(body).unwrap(), "Error fetching news data: bad gateway");
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (status, _, body) = call(healthy_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[test]
    fn dispatch_errors_map_to_status_codes() {
        let validation = DispatchError::Validation(vec!["city cannot be empty".into()]);
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let fetch = DispatchError::from(AggregateError::Incomplete { received: 1 });
        assert_eq!(fetch.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn state_from_config_requires_credentials() {
        let err = AppState::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }
}
