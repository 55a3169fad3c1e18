//! Event shapes exchanged with relays.

use serde::{Deserialize, Serialize};

pub const KIND_SHORT_TEXT_NOTE: u16 = 1;
pub const KIND_CONTACTS: u16 = 3;
/// NIP-09 deletion request.
pub const KIND_DELETE: u16 = 5;
/// NIP-65 relay list metadata.
pub const KIND_RELAY_LIST: u16 = 10002;
/// Addressable knowledge node, keyed by its `d` tag alone.
pub const KIND_KNOWLEDGE_NODE: u16 = 34751;

/// Which relay lists an event should be written to.
///
/// Events without a conf go to the author's own relays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRelayConf {
    #[serde(default)]
    pub defaults: bool,
    #[serde(default)]
    pub user: bool,
    #[serde(default)]
    pub contacts: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl WriteRelayConf {
    /// Target only the user's own relays.
    pub fn user_only() -> Self {
        Self {
            user: true,
            ..Default::default()
        }
    }

    /// Target a fixed set of relays and nothing else.
    pub fn only(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extra: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// A locally authored event that has not been signed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub kind: u16,
    /// 32-byte lowercase hex x-only public key of the author.
    pub pubkey: String,
    /// Unix timestamp in seconds.
    pub created_at: u64,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    /// Per-event override of the targeted relay lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_relay_conf: Option<WriteRelayConf>,
}

impl UnsignedEvent {
    pub fn new(
        kind: u16,
        pubkey: impl Into<String>,
        created_at: u64,
        tags: Vec<Vec<String>>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            pubkey: pubkey.into(),
            created_at,
            tags,
            content: content.into(),
            write_relay_conf: None,
        }
    }

    pub fn with_write_relay_conf(mut self, conf: WriteRelayConf) -> Self {
        self.write_relay_conf = Some(conf);
        self
    }

    pub fn is_delete(&self) -> bool {
        self.kind == KIND_DELETE
    }

    /// First value of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        first_tag_value(&self.tags, name)
    }

    /// The template handed to a signer. The pubkey comes from the key.
    pub fn to_template(&self) -> EventTemplate {
        EventTemplate {
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }
}

/// Event data without the author, as accepted by signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// A signed NIP-01 event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Lowercase hex sha256 of the serialized event.
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    /// Lowercase hex BIP-340 signature over `id`.
    pub sig: String,
}

impl Event {
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        first_tag_value(&self.tags, name)
    }

    /// Strip the signature, keeping the relay conf the caller supplies.
    pub fn to_unsigned(&self, write_relay_conf: Option<WriteRelayConf>) -> UnsignedEvent {
        UnsignedEvent {
            kind: self.kind,
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            tags: self.tags.clone(),
            content: self.content.clone(),
            write_relay_conf,
        }
    }
}

fn first_tag_value<'a>(tags: &'a [Vec<String>], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.first().map(String::as_str) == Some(name))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}
