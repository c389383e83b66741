//! Killwatch - zKillboard to Matrix notification bot.
//!
//! Long-polls the zKillboard RedisQ feed, keeps the killmails that involve
//! a watched corporation or alliance, resolves names through ESI and posts
//! a rich notification to a Matrix room.
//!
//! # Architecture
//!
//! ```text
//! RedisQ ─▶ KillmailPoller ─▶ evaluate ─▶ MessageFormatter ─▶ NotificationSender ─▶ Matrix
//!                                              │
//!                                        ReferenceCache ─▶ ESI / image server
//! ```
//!
//! - **Poll**: [`KillmailPoller`] drives the loop and owns the retry policy
//! - **Enrich**: [`ReferenceCache`] memoizes ESI lookups per entity kind
//! - **Format**: [`MessageFormatter`] builds plain-text and HTML bodies with maud
//! - **Deliver**: [`NotificationSender`] posts to the room, best effort
//!
//! Every stage reports progress to a shared [`killwatch_core::HealthMonitor`],
//! exposed on `GET /health` by [`routes::router`].
//!
//! The network clients sit behind the [`FeedSource`], [`ReferenceSource`]
//! and [`ChatBackend`] traits so the pipeline can run against in-memory
//! fakes.

pub mod cache;
pub mod config;
pub mod error;
pub mod esi;
pub mod format;
pub mod matrix;
pub mod poller;
pub mod redisq;
pub mod routes;
pub mod sender;

pub use cache::ReferenceCache;
pub use config::Config;
pub use error::{Error, Result};
pub use esi::{EntityKind, EsiClient, ReferenceRecord, ReferenceSource};
pub use format::{MessageFormatter, Notification};
pub use matrix::{ChatBackend, MatrixClient};
pub use poller::{BackoffPolicy, KillmailPoller, PollSettings, PollStats};
pub use redisq::{FeedSource, PollError, PollErrorKind, RedisqClient};
pub use routes::router;
pub use sender::NotificationSender;
