//! College basketball data collector.
//!
//! Pulls teams, games, season stats, betting lines and ratings from the
//! college basketball data API, deduplicates and caches them, and writes
//! season-scoped JSON/CSV output.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod persist;
pub mod progress;
pub mod summary;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::CbbApi;
pub use cache::CollectionCache;
pub use collector::{CollectionReport, Collector};
pub use config::Config;
pub use error::{CollectError, FetchError, ParamError};
pub use export::OutputLayout;
pub use orchestrator::FetchMode;
pub use progress::{LogProgress, NullProgress, ProgressSink};
pub use transport::{ApiTransport, HttpTransport};
