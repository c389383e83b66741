//! HTML `formatted_body`.
//!
//! Matrix clients strip `<style>` blocks, so everything is styled inline.
//! The card is tinted with the direction color at low alpha (`#RRGGBB20`).

use maud::{Markup, html};

use super::{KillSummary, Link};

pub(super) fn render(summary: &KillSummary) -> String {
    let color = summary.direction.color();

    let markup = html! {
        div style={ "background-color: " (color) "20; padding: 10px; border-radius: 5px; margin: 5px 0; border-left: 4px solid " (color) ";" } {
            div style="display: flex; align-items: center; gap: 10px;" {
                @if let Some(uri) = &summary.icon_uri {
                    img src=(uri) alt=(summary.ship) style="width: 64px; height: 64px; border-radius: 5px;";
                }
                div style="flex: 1;" {
                    div style="display: flex; align-items: center; gap: 8px; margin-bottom: 5px;" {
                        span style={ "background-color: " (color) "; color: white; padding: 2px 8px; border-radius: 12px; font-size: 0.8em; font-weight: bold;" } {
                            (summary.direction.emoji()) " " (summary.direction.label())
                        }
                        span style="font-size: 0.9em; color: #666;" {
                            em { (summary.time) }
                            " • "
                            a href=(summary.kill_url) { "zKill" }
                        }
                    }
                    div style="font-weight: bold; margin: 5px 0;" {
                        (link(&summary.victim))
                        " "
                        span style="color: #666;" {
                            (link(&summary.corporation))
                            @if let Some(alliance) = &summary.alliance {
                                " "
                                (link(alliance))
                            }
                        }
                    }
                    div { (summary.ship) " in " (summary.system) }
                }
            }
            div style="margin-top: 10px; padding: 10px; background-color: white; border-radius: 5px;" {
                div { strong { "Final Blow:" } " " (summary.final_blow) }
                div { strong { "Top Damage:" } " " (summary.top_damage) }
                div {
                    strong { "Attacker Ship:" }
                    " " (summary.attacker_ship) " (" (summary.attacker_ship_count) ")"
                }
                div style="margin-top: 10px; color: #666;" {
                    "Estimated value: " (summary.value) " ISK"
                }
            }
        }
    };

    markup.into_string()
}

fn link(link: &Link) -> Markup {
    html! {
        @match &link.url {
            Some(url) => { a href=(url) { (link.name) } }
            None => { (link.name) }
        }
    }
}
