//! EVE Swagger Interface (ESI) reference-data client.
//!
//! Resolves numeric ids on a killmail to display names. Only the public,
//! unauthenticated endpoints are used; ESI requires a descriptive
//! `User-Agent` with a contact address, which is set on every request.

use bytes::Bytes;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Per-request timeout for ESI and image server calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Icon size requested from the image server.
const ICON_SIZE: u32 = 128;

/// Kinds of entity referenced by a killmail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Character,
    ShipType,
    SolarSystem,
    Corporation,
    Alliance,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Character,
        EntityKind::ShipType,
        EntityKind::SolarSystem,
        EntityKind::Corporation,
        EntityKind::Alliance,
    ];

    /// ESI path for an entity of this kind, relative to the versioned base URL.
    pub fn path(self, id: i64) -> String {
        match self {
            Self::Character => format!("/characters/{id}/"),
            Self::ShipType => format!("/universe/types/{id}/"),
            Self::SolarSystem => format!("/universe/systems/{id}/"),
            Self::Corporation => format!("/corporations/{id}/"),
            Self::Alliance => format!("/alliances/{id}/"),
        }
    }

    /// Name shown when an entity cannot be resolved.
    pub fn placeholder_name(self) -> &'static str {
        match self {
            Self::ShipType => "Unknown Ship",
            Self::SolarSystem => "Unknown System",
            Self::Character | Self::Corporation | Self::Alliance => "Unknown",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::ShipType => "ship_type",
            Self::SolarSystem => "solar_system",
            Self::Corporation => "corporation",
            Self::Alliance => "alliance",
        }
    }
}

/// Display data for a resolved entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceRecord {
    pub name: String,
    /// Corporation and alliance ticker.
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(skip)]
    placeholder: bool,
}

impl ReferenceRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticker: None,
            placeholder: false,
        }
    }

    /// The stand-in record returned for absent ids and failed lookups.
    pub fn placeholder(kind: EntityKind) -> Self {
        Self {
            name: kind.placeholder_name().to_string(),
            ticker: None,
            placeholder: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Source of reference data and type icons.
pub trait ReferenceSource: Send + Sync + 'static {
    /// Fetch the record for one entity.
    fn fetch(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> impl Future<Output = Result<ReferenceRecord>> + Send;

    /// Fetch the PNG icon for an item type.
    fn fetch_type_icon(&self, type_id: i64) -> impl Future<Output = Result<Bytes>> + Send;
}

impl<T: ReferenceSource> ReferenceSource for std::sync::Arc<T> {
    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<ReferenceRecord> {
        self.as_ref().fetch(kind, id).await
    }

    async fn fetch_type_icon(&self, type_id: i64) -> Result<Bytes> {
        self.as_ref().fetch_type_icon(type_id).await
    }
}

/// HTTP client for ESI and the EVE image server.
#[derive(Debug, Clone)]
pub struct EsiClient {
    http: reqwest::Client,
    base_url: String,
    image_base_url: String,
}

impl EsiClient {
    pub fn new(base_url: &str, image_base_url: &str, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        Ok(self.get(url).await?.json::<T>().await?)
    }
}

impl ReferenceSource for EsiClient {
    async fn fetch(&self, kind: EntityKind, id: i64) -> Result<ReferenceRecord> {
        let url = format!("{}{}", self.base_url, kind.path(id));

        let result = self.get_json::<ReferenceRecord>(&url).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(killwatch_core::metrics::ESI_REQUESTS_TOTAL, "outcome" => outcome)
            .increment(1);

        result
    }

    async fn fetch_type_icon(&self, type_id: i64) -> Result<Bytes> {
        let url = format!(
            "{}/types/{type_id}/icon?size={ICON_SIZE}",
            self.image_base_url
        );
        Ok(self.get(&url).await?.bytes().await?)
    }
}
