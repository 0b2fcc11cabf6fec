//! Core library for `citybrief`.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather and news provider clients behind async traits
//! - The aggregation core that fans out to both providers under several
//!   concurrency strategies
//! - Validation, JSON rendering and the HTTP router built on top of them
//!
//! It is used by `citybrief-cli`, but can also be embedded in other binaries.

pub mod aggregate;
pub mod config;
pub mod format;
pub mod model;
pub mod provider;
pub mod server;
pub mod validate;

#[cfg(test)]
mod testutils;

pub use aggregate::{AggregateError, Aggregator, Strategy};
pub use config::{Config, ProviderConfig};
pub use model::{AggregatedResult, NewsRecord, WeatherRecord};
pub use provider::{NewsSource, ProviderId, WeatherSource};
pub use server::{AppState, DispatchError};
pub use validate::validate_city;
