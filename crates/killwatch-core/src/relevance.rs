//! Watchlist relevance decision.

use serde::Serialize;
use std::collections::HashSet;

use crate::killmail::Killmail;
use crate::{Error, Result};

/// Set of corporation or alliance ids a deployment cares about.
///
/// An empty watchlist matches every killmail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    ids: HashSet<i64>,
}

impl Watchlist {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Parse a comma-separated list of ids. Blank entries are skipped.
    pub fn parse(input: &str) -> Result<Self> {
        let ids = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>().map_err(|e| Error::InvalidEntityId {
                    value: s.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { ids })
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// True if either id is present in the watchlist.
    fn matches(&self, corporation_id: Option<i64>, alliance_id: Option<i64>) -> bool {
        corporation_id.is_some_and(|id| self.contains(id))
            || alliance_id.is_some_and(|id| self.contains(id))
    }
}

/// Why a killmail was (or wasn't) considered relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceReason {
    /// The watchlist is empty, so everything matches.
    All,
    /// The victim belongs to a watched entity.
    Victim,
    /// At least one attacker belongs to a watched entity.
    Attacker,
    /// Nobody on the killmail is watched.
    None,
}

impl RelevanceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Victim => "victim",
            Self::Attacker => "attacker",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    pub reason: RelevanceReason,
}

impl RelevanceVerdict {
    const fn relevant(reason: RelevanceReason) -> Self {
        Self {
            is_relevant: true,
            reason,
        }
    }

    const IRRELEVANT: Self = Self {
        is_relevant: false,
        reason: RelevanceReason::None,
    };

    /// True when the watched side scored the kill rather than took the loss.
    pub fn is_kill(&self) -> bool {
        self.reason == RelevanceReason::Attacker
    }
}

/// Decide whether a killmail matters to the watchlist.
///
/// The first matching rule wins: empty watchlist, then the victim, then any
/// attacker. A victim match takes precedence even if an attacker matches too.
pub fn evaluate(killmail: &Killmail, watchlist: &Watchlist) -> RelevanceVerdict {
    if watchlist.is_empty() {
        return RelevanceVerdict::relevant(RelevanceReason::All);
    }

    let victim = &killmail.victim;
    if watchlist.matches(victim.corporation_id, victim.alliance_id) {
        return RelevanceVerdict::relevant(RelevanceReason::Victim);
    }

    if killmail
        .attackers
        .iter()
        .any(|a| watchlist.matches(a.corporation_id, a.alliance_id))
    {
        return RelevanceVerdict::relevant(RelevanceReason::Attacker);
    }

    RelevanceVerdict::IRRELEVANT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::killmail::fixtures::{attacker, killmail};

    #[test]
    fn test_empty_watchlist_matches_all() {
        let km = killmail(98_000_001, vec![attacker(98_000_002, 1, 1)]);
        let verdict = evaluate(&km, &Watchlist::default());
        assert!(verdict.is_relevant);
        assert_eq!(verdict.reason, RelevanceReason::All);
    }

    #[test]
    fn test_empty_watchlist_matches_without_attackers() {
        let km = killmail(98_000_001, vec![]);
        assert_eq!(
            evaluate(&km, &Watchlist::default()).reason,
            RelevanceReason::All
        );
    }

    #[test]
    fn test_victim_takes_precedence() {
        let km = killmail(98_000_001, vec![attacker(98_000_001, 1, 1)]);
        let verdict = evaluate(&km, &Watchlist::new([98_000_001]));
        assert!(verdict.is_relevant);
        assert_eq!(verdict.reason, RelevanceReason::Victim);
        assert!(!verdict.is_kill());
    }

    #[test]
    fn test_victim_alliance_match() {
        let mut km = killmail(98_000_001, vec![]);
        km.victim.alliance_id = Some(99_000_001);
        let verdict = evaluate(&km, &Watchlist::new([99_000_001]));
        assert_eq!(verdict.reason, RelevanceReason::Victim);
    }

    #[test]
    fn test_attacker_corporation_match() {
        let km = killmail(
            98_000_001,
            vec![attacker(98_000_005, 1, 1), attacker(98_000_002, 1, 1)],
        );
        let verdict = evaluate(&km, &Watchlist::new([98_000_002]));
        assert!(verdict.is_relevant);
        assert_eq!(verdict.reason, RelevanceReason::Attacker);
        assert!(verdict.is_kill());
    }

    #[test]
    fn test_attacker_alliance_match() {
        let mut npc = attacker(98_000_005, 1, 1);
        npc.corporation_id = None;
        let mut watched = attacker(98_000_006, 1, 1);
        watched.alliance_id = Some(99_000_042);
        let km = killmail(98_000_001, vec![npc, watched]);

        let verdict = evaluate(&km, &Watchlist::new([99_000_042]));
        assert_eq!(verdict.reason, RelevanceReason::Attacker);
    }

    #[test]
    fn test_no_match() {
        let km = killmail(98_000_001, vec![attacker(98_000_002, 1, 1)]);
        let verdict = evaluate(&km, &Watchlist::new([12_345]));
        assert!(!verdict.is_relevant);
        assert_eq!(verdict.reason, RelevanceReason::None);
    }

    #[test]
    fn test_missing_victim_corporation_does_not_match() {
        let mut km = killmail(98_000_001, vec![]);
        km.victim.corporation_id = None;
        let verdict = evaluate(&km, &Watchlist::new([98_000_001]));
        assert!(!verdict.is_relevant);
    }

    #[test]
    fn test_watchlist_parse() {
        let watchlist = Watchlist::parse(" 99000001, 98000002,,").unwrap();
        assert_eq!(watchlist.len(), 2);
        assert!(watchlist.contains(99_000_001));
        assert!(watchlist.contains(98_000_002));
    }

    #[test]
    fn test_watchlist_parse_empty() {
        assert!(Watchlist::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_watchlist_parse_rejects_garbage() {
        let err = Watchlist::parse("99000001,goonswarm").unwrap_err();
        assert!(matches!(err, Error::InvalidEntityId { ref value, .. } if value == "goonswarm"));
    }

    #[test]
    fn test_reason_serializes_lowercase() {
        let json = serde_json::to_string(&RelevanceReason::Attacker).unwrap();
        assert_eq!(json, "\"attacker\"");
    }
}
