//! Relay set resolution.

use nostr_event_model::WriteRelayConf;

/// The relay lists an event can be written to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayLists {
    pub defaults: Vec<String>,
    pub user: Vec<String>,
    pub contacts: Vec<String>,
}

/// Trim whitespace and a trailing slash.
pub fn normalize_relay_url(url: &str) -> String {
    let trimmed = url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Target relays for one event, de-duplicated in first-seen order.
///
/// Without a conf the event goes to the user's relays, or to the defaults
/// when the user has none. With a conf it goes to the union of the selected
/// lists plus `extra`.
pub fn resolve_relays(conf: Option<&WriteRelayConf>, lists: &RelayLists) -> Vec<String> {
    let mut selected: Vec<&String> = Vec::new();
    match conf {
        None if lists.user.is_empty() => selected.extend(&lists.defaults),
        None => selected.extend(&lists.user),
        Some(conf) => {
            if conf.defaults {
                selected.extend(&lists.defaults);
            }
            if conf.user {
                selected.extend(&lists.user);
            }
            if conf.contacts {
                selected.extend(&lists.contacts);
            }
            selected.extend(&conf.extra);
        }
    }

    let mut urls: Vec<String> = Vec::with_capacity(selected.len());
    for url in selected {
        let url = normalize_relay_url(url);
        if !url.is_empty() && !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists() -> RelayLists {
        RelayLists {
            defaults: vec!["wss://default.example".into()],
            user: vec!["wss://mine.example/".into(), "wss://shared.example".into()],
            contacts: vec!["wss://shared.example/".into(), "wss://friend.example".into()],
        }
    }

    #[test]
    fn test_no_conf_uses_user_relays() {
        assert_eq!(
            resolve_relays(None, &lists()),
            vec!["wss://mine.example", "wss://shared.example"]
        );
    }

    #[test]
    fn test_no_conf_falls_back_to_defaults() {
        let lists = RelayLists {
            user: vec![],
            ..lists()
        };
        assert_eq!(resolve_relays(None, &lists), vec!["wss://default.example"]);
    }

    #[test]
    fn test_conf_union_is_deduplicated() {
        let conf = WriteRelayConf {
            defaults: true,
            user: true,
            contacts: true,
            extra: vec![" wss://mine.example ".into(), "wss://extra.example".into()],
        };
        assert_eq!(
            resolve_relays(Some(&conf), &lists()),
            vec![
                "wss://default.example",
                "wss://mine.example",
                "wss://shared.example",
                "wss://friend.example",
                "wss://extra.example",
            ]
        );
    }

    #[test]
    fn test_conf_with_nothing_selected_is_empty() {
        assert!(resolve_relays(Some(&WriteRelayConf::default()), &lists()).is_empty());
    }

    #[test]
    fn test_extra_only() {
        let conf = WriteRelayConf::only(["wss://only.example/"]);
        assert_eq!(resolve_relays(Some(&conf), &lists()), vec!["wss://only.example"]);
    }
}
