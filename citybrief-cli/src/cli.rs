use std::time::Instant;

use anyhow::{Context, bail};
use citybrief_core::{
    Aggregator, Config, ProviderId, Strategy, format,
    provider::{news_from_config, weather_from_config},
    server::{self, AppState},
    validate_city,
};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use tracing::{info, warn};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "citybrief", version, about = "Weather and news for a city, fetched concurrently")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Interface to bind; overrides HOST and the config file.
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on; overrides PORT and the config file.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name: "weather" or "news".
        provider: String,
    },

    /// Fetch weather and news for a city and print the JSON payload.
    Show {
        /// City name.
        city: String,

        /// Strategy or route name, e.g. "sequential" or "channels".
        #[arg(long, default_value = "waitgroup")]
        strategy: String,
    },

    /// List the aggregation strategies and the routes that serve them.
    Strategies,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { host, port } => {
                let mut config = Config::from_env()?;
                if host.is_some() {
                    config.host = host;
                }
                if port.is_some() {
                    config.port = port;
                }

                info!(host = config.host(), port = config.port(), "starting server");
                let state = AppState::from_config(&config)?;
                server::serve(config.host(), config.port(), state).await?;
            }
            Command::Configure { provider } => {
                let id = ProviderId::try_from(provider.as_str())?;
                configure(id)?;
            }
            Command::Show { city, strategy } => {
                let strategy = Strategy::try_from(strategy.as_str())?;
                show(&city, strategy).await?;
            }
            Command::Strategies => {
                for strategy in Strategy::all() {
                    println!("{:<14} GET /api/{}?city=<name>", strategy.as_str(), strategy.route());
                }
            }
        }

        Ok(())
    }
}

/// Prompt for a provider's credential and persist it. Only the config file is
/// touched; environment overrides are never written back.
fn configure(id: ProviderId) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for the {id} provider:"))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key for provider '{id}' cannot be empty");
    }
    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if id == ProviderId::News {
        let current = config
            .provider_config(id)
            .and_then(|p| p.language.clone())
            .unwrap_or_else(|| "es".to_string());
        let language = Text::new("News language:")
            .with_default(&current)
            .prompt()
            .context("Failed to read news language")?;

        if let Some(provider) = config.providers.get_mut(id.as_str()) {
            provider.language = Some(language.trim().to_string());
        }
    }

    let path = config.save()?;
    info!(provider = %id, path = %path.display(), "saved provider credentials");
    println!("Saved {id} credentials to {}", path.display());
    Ok(())
}

async fn show(city: &str, strategy: Strategy) -> anyhow::Result<()> {
    let started = Instant::now();

    let problems = validate_city(city);
    if !problems.is_empty() {
        warn!(city, ?problems, "rejected city");
        bail!("Validation error: {}", problems.join("; "));
    }

    info!(city = city.trim(), %strategy, "running one-shot aggregation");
    let config = Config::from_env()?;
    let aggregator = Aggregator::new(weather_from_config(&config)?, news_from_config(&config)?);

    let result = aggregator.aggregate(city.trim(), strategy, started).await?;
    let body = format::render(&result)?;

    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}
