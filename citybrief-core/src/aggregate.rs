//! Fan-out/fan-in of the weather and news lookups.
//!
//! The same two fetches are run under four coordination disciplines so they
//! can be compared side by side:
//!
//! - [`Strategy::Sequential`]: weather, then news, on the request's own task.
//! - [`Strategy::ParallelJoin`]: two spawned tasks joined on their handles.
//! - [`Strategy::Channel`]: two spawned tasks reporting over channels, collected
//!   with `select!`.
//! - [`Strategy::LockGuarded`]: two spawned tasks writing into one
//!   mutex-protected structure.
//!
//! None of the concurrent strategies cancel a fetch once it has started, and
//! no strategy ever returns a partial result.

use std::{fmt, sync::Arc, time::Instant};

use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinError,
};
use tracing::{debug, info, warn};

use crate::{
    model::{AggregatedResult, NewsRecord, WeatherRecord},
    provider::{NewsSource, ProviderId, WeatherSource},
};

/// Number of concurrent producers per request, one per provider.
const FAN_OUT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Sequential,
    ParallelJoin,
    Channel,
    LockGuarded,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::ParallelJoin => "parallel-join",
            Strategy::Channel => "channel",
            Strategy::LockGuarded => "lock-guarded",
        }
    }

    /// Last path segment of the HTTP route that runs this strategy.
    pub fn route(&self) -> &'static str {
        match self {
            Strategy::Sequential => "control",
            Strategy::ParallelJoin => "waitgroup",
            Strategy::Channel => "channels",
            Strategy::LockGuarded => "mutexes",
        }
    }

    pub const fn all() -> &'static [Strategy] {
        &[
            Strategy::Sequential,
            Strategy::ParallelJoin,
            Strategy::Channel,
            Strategy::LockGuarded,
        ]
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Strategy {
    type Error = anyhow::Error;

    /// Accepts either the descriptive name or the route name.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        Strategy::all()
            .iter()
            .copied()
            .find(|s| s.as_str() == lower || s.route() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown strategy '{value}'. Supported strategies: \
                     sequential (control), parallel-join (waitgroup), \
                     channel (channels), lock-guarded (mutexes)."
                )
            })
    }
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Error fetching {provider} data: {source:#}")]
    Fetch {
        provider: ProviderId,
        source: anyhow::Error,
    },

    /// Provider tasks went away without reporting either a value or an error.
    #[error("Error fetching data: provider tasks stopped after {received} of {} reports", FAN_OUT)]
    Incomplete { received: usize },
}

impl AggregateError {
    fn fetch(provider: ProviderId, source: anyhow::Error) -> Self {
        AggregateError::Fetch { provider, source }
    }

    /// The provider whose failure ended the request, if known.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            AggregateError::Fetch { provider, .. } => Some(*provider),
            AggregateError::Incomplete { .. } => None,
        }
    }
}

type Fetched = (WeatherRecord, Vec<NewsRecord>);

/// Runs both provider lookups for a city and merges the outcome.
#[derive(Debug, Clone)]
pub struct Aggregator {
    weather: Arc<dyn WeatherSource>,
    news: Arc<dyn NewsSource>,
}

impl Aggregator {
    pub fn new(weather: Arc<dyn WeatherSource>, news: Arc<dyn NewsSource>) -> Self {
        Self { weather, news }
    }

    /// Fetch weather and news for `city` under `strategy`.
    ///
    /// `started` marks the beginning of the request; the elapsed time in the
    /// result is measured from it. `city` is expected to be validated already.
    pub async fn aggregate(
        &self,
        city: &str,
        strategy: Strategy,
        started: Instant,
    ) -> Result<AggregatedResult, AggregateError> {
        debug!(city, %strategy, "starting aggregation");

        let outcome = match strategy {
            Strategy::Sequential => self.sequential(city).await,
            Strategy::ParallelJoin => self.parallel_join(city).await,
            Strategy::Channel => self.channel(city).await,
            Strategy::LockGuarded => self.lock_guarded(city).await,
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok((weather, news)) => {
                info!(
                    city,
                    %strategy,
                    elapsed_ms = elapsed.as_millis() as u64,
                    articles = news.len(),
                    "aggregated weather and news"
                );
                Ok(AggregatedResult { weather, news, elapsed })
            }
            Err(err) => {
                warn!(
                    city,
                    %strategy,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "aggregation failed"
                );
                Err(err)
            }
        }
    }

    async fn sequential(&self, city: &str) -> Result<Fetched, AggregateError> {
        let weather = self
            .weather
            .fetch_weather(city)
            .await
            .map_err(|e| AggregateError::fetch(ProviderId::Weather, e))?;

        let news = self
            .news
            .fetch_news(city)
            .await
            .map_err(|e| AggregateError::fetch(ProviderId::News, e))?;

        Ok((weather, news))
    }

    /// Each task's `JoinHandle` is its private result slot; the join is the
    /// only point where those slots are read.
    async fn parallel_join(&self, city: &str) -> Result<Fetched, AggregateError> {
        let weather_task = {
            let source = Arc::clone(&self.weather);
            let city = city.to_owned();
            tokio::spawn(async move { source.fetch_weather(&city).await })
        };
        let news_task = {
            let source = Arc::clone(&self.news);
            let city = city.to_owned();
            tokio::spawn(async move { source.fetch_news(&city).await })
        };

        let (weather, news) = tokio::join!(weather_task, news_task);

        let weather = settle(ProviderId::Weather, weather)?;
        let news = settle(ProviderId::News, news)?;
        Ok((weather, news))
    }

    /// Successes travel on one `oneshot` per provider, failures on a shared
    /// queue sized for every producer so a failing task never waits on the
    /// coordinator. The coordinator stops after exactly [`FAN_OUT`] reports.
    async fn channel(&self, city: &str) -> Result<Fetched, AggregateError> {
        let (weather_tx, mut weather_rx) = oneshot::channel::<WeatherRecord>();
        let (news_tx, mut news_rx) = oneshot::channel::<Vec<NewsRecord>>();
        let (error_tx, mut error_rx) = mpsc::channel::<(ProviderId, anyhow::Error)>(FAN_OUT);

        {
            let source = Arc::clone(&self.weather);
            let city = city.to_owned();
            let error_tx = error_tx.clone();
            tokio::spawn(async move {
                match source.fetch_weather(&city).await {
                    Ok(record) => {
                        let _ = weather_tx.send(record);
                    }
                    Err(err) => {
                        let _ = error_tx.try_send((ProviderId::Weather, err));
                    }
                }
            });
        }
        {
            let source = Arc::clone(&self.news);
            let city = city.to_owned();
            let error_tx = error_tx.clone();
            tokio::spawn(async move {
                match source.fetch_news(&city).await {
                    Ok(records) => {
                        let _ = news_tx.send(records);
                    }
                    Err(err) => {
                        let _ = error_tx.try_send((ProviderId::News, err));
                    }
                }
            });
        }
        // Only the tasks hold senders now, so the queue closes once both are gone.
        drop(error_tx);

        let mut weather = None;
        let mut news = None;
        let mut first_error = None;
        let mut errors = 0usize;
        let mut received = 0usize;
        let mut weather_open = true;
        let mut news_open = true;

        while received < FAN_OUT {
            tokio::select! {
                res = &mut weather_rx, if weather_open => {
                    // A closed sender means the task failed; its error arrives separately.
                    weather_open = false;
                    if let Ok(record) = res {
                        weather = Some(record);
                        received += 1;
                    }
                }
                res = &mut news_rx, if news_open => {
                    news_open = false;
                    if let Ok(records) = res {
                        news = Some(records);
                        received += 1;
                    }
                }
                Some((provider, err)) = error_rx.recv() => {
                    received += 1;
                    errors += 1;
                    let detail = format!("{err:#}");
                    warn!(city, %provider, error = %detail, "provider fetch failed");
                    first_error.get_or_insert((provider, err));
                }
                else => break,
            }
        }

        if let Some((provider, source)) = first_error {
            debug!(city, errors, "channel fan-in finished with errors");
            return Err(AggregateError::fetch(provider, source));
        }

        match (weather, news) {
            (Some(weather), Some(news)) => Ok((weather, news)),
            _ => Err(AggregateError::Incomplete { received }),
        }
    }

    /// Both tasks write into one shared structure. The lock is taken only to
    /// store an outcome, never across a fetch, and the coordinator reads the
    /// structure once, after both tasks have finished.
    async fn lock_guarded(&self, city: &str) -> Result<Fetched, AggregateError> {
        let slots = Arc::new(Mutex::new(SharedSlots::default()));

        let weather_task = {
            let source = Arc::clone(&self.weather);
            let slots = Arc::clone(&slots);
            let city = city.to_owned();
            tokio::spawn(async move {
                let outcome = source.fetch_weather(&city).await;
                slots.lock().await.weather = Some(outcome);
            })
        };
        let news_task = {
            let source = Arc::clone(&self.news);
            let slots = Arc::clone(&slots);
            let city = city.to_owned();
            tokio::spawn(async move {
                let outcome = source.fetch_news(&city).await;
                slots.lock().await.news = Some(outcome);
            })
        };

        let (weather_joined, news_joined) = tokio::join!(weather_task, news_task);

        let SharedSlots { weather, news } = std::mem::take(&mut *slots.lock().await);

        let weather = from_slot(ProviderId::Weather, weather, weather_joined)?;
        let news = from_slot(ProviderId::News, news, news_joined)?;
        Ok((weather, news))
    }
}

#[derive(Default)]
struct SharedSlots {
    weather: Option<anyhow::Result<WeatherRecord>>,
    news: Option<anyhow::Result<Vec<NewsRecord>>>,
}

fn task_failure(provider: ProviderId, err: JoinError) -> AggregateError {
    AggregateError::fetch(provider, anyhow::anyhow!("{provider} task failed: {err}"))
}

fn settle<T>(
    provider: ProviderId,
    joined: Result<anyhow::Result<T>, JoinError>,
) -> Result<T, AggregateError> {
    match joined {
        Ok(outcome) => outcome.map_err(|e| AggregateError::fetch(provider, e)),
        Err(err) => Err(task_failure(provider, err)),
    }
}

fn from_slot<T>(
    provider: ProviderId,
    slot: Option<anyhow::Result<T>>,
    joined: Result<(), JoinError>,
) -> Result<T, AggregateError> {
    joined.map_err(|err| task_failure(provider, err))?;
    match slot {
        Some(outcome) => outcome.map_err(|e| AggregateError::fetch(provider, e)),
        None => Err(AggregateError::fetch(
            provider,
            anyhow::anyhow!("{provider} task finished without storing a result"),
        )),
    }
}
