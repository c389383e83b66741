//! Plain-text (Markdown) body for clients without HTML support.

use super::{KillSummary, Link};

pub(super) fn render(summary: &KillSummary) -> String {
    let mut affiliation = vec![link(&summary.corporation)];
    if let Some(alliance) = &summary.alliance {
        affiliation.push(link(alliance));
    }

    format!(
        "_{time}_ [zKill]({kill_url})\n\
         {victim} {affiliation}\n\
         {ship} in {system}\n\
         \n\
         **Final Blow**: {final_blow}\n\
         **Top Damage**: {top_damage}\n\
         **Attacker Ship**: {attacker_ship} ({count})\n\
         \n\
         Estimated value: {value} ISK",
        time = summary.time,
        kill_url = summary.kill_url,
        victim = link(&summary.victim),
        affiliation = affiliation.join(" "),
        ship = summary.ship,
        system = summary.system,
        final_blow = summary.final_blow,
        top_damage = summary.top_damage,
        attacker_ship = summary.attacker_ship,
        count = summary.attacker_ship_count,
        value = summary.value,
    )
}

fn link(link: &Link) -> String {
    match &link.url {
        Some(url) => format!("[{}]({url})", link.name),
        None => link.name.clone(),
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::format::Direction;

    pub(crate) fn summary() -> KillSummary {
        KillSummary {
            direction: Direction::Kill,
            time: "01-03-2024 18:30".to_string(),
            kill_url: "https://zkillboard.com/kill/118000001/".to_string(),
            victim: Link {
                name: "Victim Pilot".to_string(),
                url: Some("https://zkillboard.com/character/95000001/".to_string()),
            },
            corporation: Link {
                name: "Victim Corp".to_string(),
                url: Some("https://zkillboard.com/corporation/98000001/".to_string()),
            },
            alliance: None,
            ship: "Rifter".to_string(),
            system: "Jita".to_string(),
            final_blow: "Closer".to_string(),
            top_damage: "Wingman".to_string(),
            attacker_ship: "Vagabond".to_string(),
            attacker_ship_count: 3,
            value: "15,000,000".to_string(),
            icon_uri: Some("mxc://example.org/abc".to_string()),
        }
    }

    #[test]
    fn test_plain_text_layout() {
        let body = render(&summary());
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(
            lines[0],
            "_01-03-2024 18:30_ [zKill](https://zkillboard.com/kill/118000001/)"
        );
        assert_eq!(
            lines[1],
            "[Victim Pilot](https://zkillboard.com/character/95000001/) [Victim Corp](https://zkillboard.com/corporation/98000001/)"
        );
        assert_eq!(lines[2], "Rifter in Jita");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "**Final Blow**: Closer");
        assert_eq!(lines[5], "**Top Damage**: Wingman");
        assert_eq!(lines[6], "**Attacker Ship**: Vagabond (3)");
        assert_eq!(lines[8], "Estimated value: 15,000,000 ISK");
    }

    #[test]
    fn test_alliance_follows_corporation() {
        let mut summary = summary();
        summary.alliance = Some(Link {
            name: "Victim Alliance".to_string(),
            url: Some("https://zkillboard.com/alliance/99000001/".to_string()),
        });

        let body = render(&summary);
        assert!(body.contains(
            "[Victim Corp](https://zkillboard.com/corporation/98000001/) [Victim Alliance](https://zkillboard.com/alliance/99000001/)"
        ));
    }

    #[test]
    fn test_unlinked_victim() {
        let mut summary = summary();
        summary.victim = Link {
            name: "Unknown".to_string(),
            url: None,
        };

        let body = render(&summary);
        assert!(body.lines().nth(1).unwrap().starts_with("Unknown ["));
    }
}
