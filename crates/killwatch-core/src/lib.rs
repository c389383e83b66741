//! Core types and pure logic for the Killwatch notification bot.
//!
//! This crate provides:
//! - The killmail data model as delivered by the zKillboard RedisQ feed
//! - The watchlist relevance decision
//! - The liveness model reported by the health endpoint
//! - Prometheus metrics helpers
//! - Shared error types
//!
//! Nothing in here performs network I/O apart from the metrics server; the
//! feed, reference-data and chat clients live in `killwatch-bot`.

mod error;
pub mod health;
mod killmail;
pub mod metrics;
mod relevance;

pub use error::{Error, Result};
pub use health::{Category, CategoryReport, HealthMonitor, HealthReport, Status};
pub use killmail::{Attacker, FeedPackage, FeedResponse, Killmail, ValueEnvelope, Victim};
pub use relevance::{RelevanceReason, RelevanceVerdict, Watchlist, evaluate};

/// Base URL for zKillboard pages linked from notifications.
pub const ZKILLBOARD_BASE_URL: &str = "https://zkillboard.com";
