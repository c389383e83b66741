//! Killmail data model.
//!
//! Mirrors the JSON shapes served by the zKillboard RedisQ feed: an ESI
//! killmail plus the `zkb` value envelope. Ids that ESI marks optional (NPC
//! attackers have no character, structures no alliance, and so on) are
//! `Option<i64>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Result;

/// Top-level RedisQ response. A `null` package means "no event, poll again".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedResponse {
    pub package: Option<FeedPackage>,
}

impl FeedResponse {
    /// Parse a RedisQ response body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// One event from the feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedPackage {
    #[serde(rename = "killID", default)]
    pub kill_id: Option<i64>,
    pub killmail: Killmail,
    pub zkb: ValueEnvelope,
}

/// A single combat-death record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Killmail {
    pub killmail_id: i64,
    pub killmail_time: DateTime<Utc>,
    pub solar_system_id: i64,
    pub victim: Victim,
    #[serde(default)]
    pub attackers: Vec<Attacker>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Victim {
    #[serde(default)]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub corporation_id: Option<i64>,
    #[serde(default)]
    pub alliance_id: Option<i64>,
    pub ship_type_id: i64,
    #[serde(default)]
    pub damage_taken: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Attacker {
    #[serde(default)]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub corporation_id: Option<i64>,
    #[serde(default)]
    pub alliance_id: Option<i64>,
    #[serde(default)]
    pub ship_type_id: Option<i64>,
    #[serde(default)]
    pub damage_done: u64,
    #[serde(default)]
    pub final_blow: bool,
}

/// zKillboard's computed market data for a killmail.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueEnvelope {
    pub total_value: f64,
    #[serde(default)]
    pub fitted_value: Option<f64>,
    #[serde(default)]
    pub dropped_value: Option<f64>,
    #[serde(default)]
    pub destroyed_value: Option<f64>,
    #[serde(rename = "locationID", default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub npc: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub awox: bool,
    #[serde(default)]
    pub hash: Option<String>,
}

impl Killmail {
    /// The attacker credited with the final blow.
    ///
    /// Returns the first attacker flagged `final_blow`, or `None` when no
    /// attacker carries the flag (including an empty attacker list).
    pub fn final_blow_attacker(&self) -> Option<&Attacker> {
        self.attackers.iter().find(|a| a.final_blow)
    }

    /// The attacker with the strictly greatest damage.
    ///
    /// Ties keep the attacker that appears first in the list.
    pub fn top_damage_attacker(&self) -> Option<&Attacker> {
        let mut attackers = self.attackers.iter();
        let first = attackers.next()?;
        Some(attackers.fold(first, |best, current| {
            if current.damage_done > best.damage_done {
                current
            } else {
                best
            }
        }))
    }

    /// The attacker ship type used most often, with its occurrence count.
    ///
    /// Attackers without a ship type are counted under `None`. Ties go to the
    /// ship type that appears first in the attacker list.
    pub fn most_used_attacker_ship(&self) -> Option<(Option<i64>, usize)> {
        let mut counts: HashMap<Option<i64>, usize> = HashMap::new();
        for attacker in &self.attackers {
            *counts.entry(attacker.ship_type_id).or_default() += 1;
        }

        let mut best: Option<(Option<i64>, usize)> = None;
        for attacker in &self.attackers {
            let count = counts[&attacker.ship_type_id];
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((attacker.ship_type_id, count));
            }
        }
        best
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn attacker(corporation_id: i64, ship_type_id: i64, damage_done: u64) -> Attacker {
        Attacker {
            character_id: Some(90_000_000 + damage_done as i64),
            corporation_id: Some(corporation_id),
            alliance_id: None,
            ship_type_id: Some(ship_type_id),
            damage_done,
            final_blow: false,
        }
    }

    pub fn killmail(victim_corporation: i64, attackers: Vec<Attacker>) -> Killmail {
        Killmail {
            killmail_id: 123_456_789,
            killmail_time: "2024-03-01T18:30:00Z".parse().unwrap(),
            solar_system_id: 30_000_142,
            victim: Victim {
                character_id: Some(95_000_001),
                corporation_id: Some(victim_corporation),
                alliance_id: None,
                ship_type_id: 587,
                damage_taken: 1_000,
            },
            attackers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{attacker, killmail};
    use super::*;

    const SAMPLE_PACKAGE: &str = r#"{
        "package": {
            "killID": 117000001,
            "killmail": {
                "killmail_id": 117000001,
                "killmail_time": "2024-03-01T18:30:00Z",
                "solar_system_id": 30000142,
                "victim": {
                    "character_id": 2112000001,
                    "corporation_id": 98000001,
                    "alliance_id": 99000002,
                    "ship_type_id": 587,
                    "damage_taken": 2400
                },
                "attackers": [
                    {"character_id": 2112000002, "corporation_id": 98000003, "ship_type_id": 11987, "damage_done": 2400, "final_blow": true, "security_status": 5.0},
                    {"corporation_id": 1000125, "damage_done": 0, "final_blow": false, "faction_id": 500024}
                ]
            },
            "zkb": {
                "locationID": 60003760,
                "hash": "abcdef",
                "fittedValue": 10000.5,
                "totalValue": 1234567.89,
                "points": 1,
                "npc": false,
                "solo": true,
                "awox": false
            }
        }
    }"#;

    #[test]
    fn test_parse_feed_package() {
        let response = FeedResponse::from_json(SAMPLE_PACKAGE).unwrap();
        let package = response.package.expect("package present");

        assert_eq!(package.kill_id, Some(117000001));
        assert_eq!(package.killmail.victim.alliance_id, Some(99000002));
        assert_eq!(package.killmail.attackers.len(), 2);

        let npc = &package.killmail.attackers[1];
        assert_eq!(npc.character_id, None);
        assert_eq!(npc.ship_type_id, None);

        assert_eq!(package.zkb.total_value, 1234567.89);
        assert_eq!(package.zkb.location_id, Some(60003760));
        assert!(package.zkb.solo);
    }

    #[test]
    fn test_parse_null_package() {
        let response = FeedResponse::from_json(r#"{"package":null}"#).unwrap();
        assert!(response.package.is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(FeedResponse::from_json("<html>502 Bad Gateway</html>").is_err());
    }

    #[test]
    fn test_final_blow_attacker() {
        let mut attackers = vec![attacker(1, 10, 100), attacker(2, 20, 200)];
        attackers[1].final_blow = true;
        let km = killmail(5, attackers);

        assert_eq!(km.final_blow_attacker().unwrap().corporation_id, Some(2));
    }

    #[test]
    fn test_final_blow_missing() {
        let km = killmail(5, vec![attacker(1, 10, 100)]);
        assert!(km.final_blow_attacker().is_none());
    }

    #[test]
    fn test_top_damage_picks_greatest() {
        let km = killmail(
            5,
            vec![attacker(1, 10, 10), attacker(2, 10, 50), attacker(3, 10, 30)],
        );
        assert_eq!(km.top_damage_attacker().unwrap().damage_done, 50);
    }

    #[test]
    fn test_top_damage_tie_keeps_first() {
        let km = killmail(
            5,
            vec![attacker(1, 10, 40), attacker(2, 10, 40), attacker(3, 10, 5)],
        );
        assert_eq!(km.top_damage_attacker().unwrap().corporation_id, Some(1));
    }

    #[test]
    fn test_most_used_ship() {
        let km = killmail(
            5,
            vec![attacker(1, 100, 1), attacker(2, 200, 2), attacker(3, 100, 3)],
        );
        assert_eq!(km.most_used_attacker_ship(), Some((Some(100), 2)));
    }

    #[test]
    fn test_most_used_ship_tie_keeps_first() {
        let km = killmail(
            5,
            vec![
                attacker(1, 200, 1),
                attacker(2, 100, 2),
                attacker(3, 100, 3),
                attacker(4, 200, 4),
            ],
        );
        assert_eq!(km.most_used_attacker_ship(), Some((Some(200), 2)));
    }

    #[test]
    fn test_empty_attackers() {
        let km = killmail(5, vec![]);
        assert!(km.final_blow_attacker().is_none());
        assert!(km.top_damage_attacker().is_none());
        assert!(km.most_used_attacker_ship().is_none());
    }
}
