//! Signing capabilities.

use crate::SignerError;
use async_trait::async_trait;
use nostr_event_model::{finalize_event, public_key_hex, Event, EventTemplate, UnsignedEvent};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Signer living outside this process (browser extension, remote bunker).
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    async fn sign_event(&self, template: &EventTemplate) -> Result<Event, SignerError>;
}

/// How an authenticated user signs.
#[derive(Clone)]
pub enum Signer {
    /// Raw secret key held in memory.
    Local([u8; 32]),
    External(Arc<dyn ExternalSigner>),
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::Local(_) => f.write_str("Signer::Local(..)"),
            Signer::External(_) => f.write_str("Signer::External(..)"),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone)]
pub struct User {
    pub pubkey: String,
    pub signer: Signer,
}

impl User {
    /// User signing locally; the pubkey is derived from the key.
    pub fn local(secret_key: [u8; 32]) -> Result<Self, SignerError> {
        Ok(Self {
            pubkey: public_key_hex(&secret_key)?,
            signer: Signer::Local(secret_key),
        })
    }

    pub fn external(pubkey: impl Into<String>, signer: Arc<dyn ExternalSigner>) -> Self {
        Self {
            pubkey: pubkey.into(),
            signer: Signer::External(signer),
        }
    }
}

/// Sign a batch of events in order.
///
/// Without a user this returns an empty list. External signers are called
/// one event at a time; the first failure aborts the batch.
pub async fn sign_events(
    events: &[UnsignedEvent],
    user: Option<&User>,
) -> Result<Vec<Event>, SignerError> {
    let Some(user) = user else {
        debug!(count = events.len(), "No user, skipping signing");
        return Ok(Vec::new());
    };

    let mut signed = Vec::with_capacity(events.len());
    match &user.signer {
        Signer::Local(secret_key) => {
            for event in events {
                signed.push(finalize_event(&event.to_template(), secret_key)?);
            }
        }
        Signer::External(signer) => {
            for event in events {
                signed.push(signer.sign_event(&event.to_template()).await?);
            }
        }
    }
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_event_model::{parse_secret_key, verify_event, KIND_SHORT_TEXT_NOTE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "d217c1ff2f8a65c3e3a1740db3b9f58b8c848bb45e26d00ed4714e4a0f4ceecf";

    fn note(content: &str) -> UnsignedEvent {
        UnsignedEvent::new(KIND_SHORT_TEXT_NOTE, "", 10, vec![], content)
    }

    struct CountingSigner {
        key: [u8; 32],
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl ExternalSigner for CountingSigner {
        async fn sign_event(&self, template: &EventTemplate) -> Result<Event, SignerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                return Err(SignerError::External("user declined".to_string()));
            }
            Ok(finalize_event(template, &self.key)?)
        }
    }

    #[tokio::test]
    async fn test_no_user_signs_nothing() {
        let signed = sign_events(&[note("a")], None).await.unwrap();
        assert!(signed.is_empty());
    }

    #[tokio::test]
    async fn test_local_signing_preserves_order() {
        let user = User::local(parse_secret_key(SECRET).unwrap()).unwrap();
        let signed = sign_events(&[note("a"), note("b")], Some(&user)).await.unwrap();
        assert_eq!(signed.len(), 2);
        assert_eq!(signed[0].content, "a");
        assert_eq!(signed[1].content, "b");
        assert_eq!(signed[0].pubkey, user.pubkey);
        assert!(verify_event(&signed[1]).unwrap());
    }

    #[tokio::test]
    async fn test_external_signer_called_once_per_event() {
        let signer = Arc::new(CountingSigner {
            key: parse_secret_key(SECRET).unwrap(),
            calls: AtomicUsize::new(0),
            fail_on: None,
        });
        let user = User::external("ignored", signer.clone());
        let signed = sign_events(&[note("a"), note("b"), note("c")], Some(&user))
            .await
            .unwrap();
        assert_eq!(signed.len(), 3);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_external_failure_propagates() {
        let signer = Arc::new(CountingSigner {
            key: parse_secret_key(SECRET).unwrap(),
            calls: AtomicUsize::new(0),
            fail_on: Some(1),
        });
        let user = User::external("ignored", signer.clone());
        let err = sign_events(&[note("a"), note("b"), note("c")], Some(&user))
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::External(_)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_hides_secret() {
        let user = User::local(parse_secret_key(SECRET).unwrap()).unwrap();
        assert!(!format!("{user:?}").contains("d217c1"));
    }
}
