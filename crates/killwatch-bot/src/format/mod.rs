//! Notification construction.
//!
//! Turns a relevant killmail into a Matrix `m.room.message` payload with a
//! Markdown-ish plain-text `body` and an inline-styled HTML
//! `formatted_body`.
//!
//! Formatting resolves every referenced id through the [`ReferenceCache`],
//! so a lookup failure only degrades a name to its placeholder. The event is
//! dropped only when the attacker list makes the summary impossible to
//! build (no attackers, or no final-blow attacker).

mod html;
mod text;

use bytes::Bytes;
use killwatch_core::{Killmail, RelevanceVerdict, ValueEnvelope, ZKILLBOARD_BASE_URL};
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::ReferenceCache;
use crate::esi::{EntityKind, ReferenceSource};
use crate::matrix::ChatBackend;

/// Timestamp layout shown in notifications (always UTC).
const TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// A Matrix `m.text` message with an HTML rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub msgtype: &'static str,
    pub body: String,
    pub format: &'static str,
    pub formatted_body: String,
}

impl Notification {
    pub fn new(body: String, formatted_body: String) -> Self {
        Self {
            msgtype: "m.text",
            body,
            format: "org.matrix.custom.html",
            formatted_body,
        }
    }
}

/// Why a killmail could not be turned into a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("killmail has no attackers")]
    NoAttackers,

    #[error("killmail has no final-blow attacker")]
    NoFinalBlow,
}

/// Whether the watched side scored the kill or took the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Kill,
    Loss,
}

impl Direction {
    pub fn from_verdict(verdict: &RelevanceVerdict) -> Self {
        if verdict.is_kill() {
            Self::Kill
        } else {
            Self::Loss
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Kill => "KILL",
            Self::Loss => "LOSS",
        }
    }

    /// Badge color as a `#RRGGBB` hex string.
    pub fn color(self) -> &'static str {
        match self {
            Self::Kill => "#4CAF50",
            Self::Loss => "#F44336",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Kill => "🎯",
            Self::Loss => "💀",
        }
    }
}

/// A display name with an optional zKillboard link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub url: Option<String>,
}

impl Link {
    fn new(name: String, url: Option<String>) -> Self {
        Self { name, url }
    }
}

/// Everything a rendering needs, already resolved to display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillSummary {
    pub direction: Direction,
    pub time: String,
    pub kill_url: String,
    pub victim: Link,
    pub corporation: Link,
    pub alliance: Option<Link>,
    pub ship: String,
    pub system: String,
    pub final_blow: String,
    pub top_damage: String,
    pub attacker_ship: String,
    pub attacker_ship_count: usize,
    pub value: String,
    /// `mxc://` URI of the uploaded victim ship icon.
    pub icon_uri: Option<String>,
}

impl KillSummary {
    pub fn to_notification(&self) -> Notification {
        Notification::new(text::render(self), html::render(self))
    }
}

/// Format an ISK amount with thousands separators and no fractional part.
pub fn format_isk(value: f64) -> String {
    (value.round() as i64).to_formatted_string(&Locale::en)
}

/// zKillboard page for an entity, e.g. `character` or `kill`.
pub fn zkill_url(section: &str, id: i64) -> String {
    format!("{ZKILLBOARD_BASE_URL}/{section}/{id}/")
}

/// Builds notifications for relevant killmails.
pub struct MessageFormatter<S, C> {
    cache: Arc<ReferenceCache<S>>,
    chat: Arc<C>,
}

impl<S: ReferenceSource, C: ChatBackend> MessageFormatter<S, C> {
    pub fn new(cache: Arc<ReferenceCache<S>>, chat: Arc<C>) -> Self {
        Self { cache, chat }
    }

    /// Build the notification, or `None` if the killmail cannot be summarized.
    pub async fn format(
        &self,
        killmail: &Killmail,
        verdict: &RelevanceVerdict,
        zkb: &ValueEnvelope,
    ) -> Option<Notification> {
        match self.summarize(killmail, verdict, zkb).await {
            Ok(summary) => Some(summary.to_notification()),
            Err(e) => {
                tracing::warn!(
                    killmail_id = killmail.killmail_id,
                    error = %e,
                    "failed to format killmail"
                );
                metrics::counter!(killwatch_core::metrics::FORMAT_FAILURES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Resolve every name the notification shows.
    pub async fn summarize(
        &self,
        killmail: &Killmail,
        verdict: &RelevanceVerdict,
        zkb: &ValueEnvelope,
    ) -> Result<KillSummary, FormatError> {
        if killmail.attackers.is_empty() {
            return Err(FormatError::NoAttackers);
        }
        let final_blow = killmail
            .final_blow_attacker()
            .ok_or(FormatError::NoFinalBlow)?;
        let top_damage = killmail
            .top_damage_attacker()
            .ok_or(FormatError::NoAttackers)?;
        let (attacker_ship_id, attacker_ship_count) = killmail
            .most_used_attacker_ship()
            .ok_or(FormatError::NoAttackers)?;

        let victim = &killmail.victim;
        let cache = &self.cache;

        let (
            victim_name,
            corporation,
            alliance,
            ship,
            system,
            final_blow_name,
            top_damage_name,
            attacker_ship,
        ) = tokio::join!(
            cache.lookup(EntityKind::Character, victim.character_id),
            cache.lookup(EntityKind::Corporation, victim.corporation_id),
            async {
                match victim.alliance_id {
                    Some(id) => Some(cache.lookup(EntityKind::Alliance, Some(id)).await),
                    None => None,
                }
            },
            cache.lookup(EntityKind::ShipType, Some(victim.ship_type_id)),
            cache.lookup(EntityKind::SolarSystem, Some(killmail.solar_system_id)),
            cache.lookup(EntityKind::Character, final_blow.character_id),
            cache.lookup(EntityKind::Character, top_damage.character_id),
            cache.lookup(EntityKind::ShipType, attacker_ship_id),
        );

        let icon_uri = self.upload_ship_icon(victim.ship_type_id, &ship.name).await;

        Ok(KillSummary {
            direction: Direction::from_verdict(verdict),
            time: killmail.killmail_time.format(TIME_FORMAT).to_string(),
            kill_url: zkill_url("kill", killmail.killmail_id),
            victim: Link::new(
                victim_name.name,
                victim.character_id.map(|id| zkill_url("character", id)),
            ),
            corporation: Link::new(
                corporation.name,
                victim.corporation_id.map(|id| zkill_url("corporation", id)),
            ),
            alliance: alliance.zip(victim.alliance_id).map(|(record, id)| {
                Link::new(record.name, Some(zkill_url("alliance", id)))
            }),
            ship: ship.name,
            system: system.name,
            final_blow: final_blow_name.name,
            top_damage: top_damage_name.name,
            attacker_ship: attacker_ship.name,
            attacker_ship_count,
            value: format_isk(zkb.total_value),
            icon_uri,
        })
    }

    /// Download the ship icon and re-host it on the homeserver.
    ///
    /// Failures are logged; the notification is rendered without an image.
    async fn upload_ship_icon(&self, ship_type_id: i64, ship_name: &str) -> Option<String> {
        let icon: Bytes = match self.cache.source().fetch_type_icon(ship_type_id).await {
            Ok(icon) => icon,
            Err(e) => {
                tracing::warn!(ship_type_id, error = %e, "failed to download ship icon");
                return None;
            }
        };

        let filename = format!("{ship_name}.png");
        match self.chat.upload_media(icon, "image/png", &filename).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::warn!(ship_type_id, error = %e, "failed to upload ship icon");
                None
            }
        }
    }
}
