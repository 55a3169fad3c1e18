//! NIP-01 hashing plus BIP-340 signing and verification.

use crate::{Event, EventError, EventResult, EventTemplate, UnsignedEvent};
use rand::RngCore;
use secp256k1::{schnorr, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::{Digest, Sha256};

/// Generate a random valid 32-byte secret key.
pub fn generate_secret_key() -> [u8; 32] {
    let mut rng = rand::thread_rng();
    loop {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        if SecretKey::from_slice(&key).is_ok() {
            return key;
        }
    }
}

/// Parse a hex secret key, rejecting values outside the curve order.
pub fn parse_secret_key(hex_key: &str) -> EventResult<[u8; 32]> {
    let bytes = hex::decode(hex_key.trim())?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| EventError::InvalidKey("secret key must be 32 bytes".to_string()))?;
    SecretKey::from_slice(&key).map_err(|e| EventError::InvalidKey(e.to_string()))?;
    Ok(key)
}

/// Lowercase hex x-only public key for a secret key.
pub fn public_key_hex(secret_key: &[u8; 32]) -> EventResult<String> {
    let secp = Secp256k1::signing_only();
    let sk = SecretKey::from_slice(secret_key).map_err(|e| EventError::InvalidKey(e.to_string()))?;
    let (xonly, _parity) = sk.x_only_public_key(&secp);
    Ok(hex::encode(xonly.serialize()))
}

/// Canonical serialization used for the event id:
/// `[0, pubkey, created_at, kind, tags, content]`.
pub fn serialize_event(event: &UnsignedEvent) -> EventResult<String> {
    if !is_lower_hex(&event.pubkey, 64) {
        return Err(EventError::InvalidEvent(
            "pubkey must be 64 lowercase hex characters".to_string(),
        ));
    }
    Ok(serde_json::to_string(&(
        0,
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    ))?)
}

/// Event id: hex sha256 of the canonical serialization.
pub fn get_event_hash(event: &UnsignedEvent) -> EventResult<String> {
    Ok(hex::encode(event_digest(event)?))
}

fn event_digest(event: &UnsignedEvent) -> EventResult<[u8; 32]> {
    let serialized = serialize_event(event)?;
    Ok(Sha256::digest(serialized.as_bytes()).into())
}

/// Sign a template with a secret key.
///
/// Signing uses no auxiliary randomness, so the same template and key always
/// produce the same id and signature.
pub fn finalize_event(template: &EventTemplate, secret_key: &[u8; 32]) -> EventResult<Event> {
    let secp = Secp256k1::signing_only();
    let sk = SecretKey::from_slice(secret_key).map_err(|e| EventError::Signing(e.to_string()))?;
    let keypair = Keypair::from_secret_key(&secp, &sk);
    let (xonly, _parity) = keypair.x_only_public_key();
    let pubkey = hex::encode(xonly.serialize());

    let unsigned = UnsignedEvent {
        kind: template.kind,
        pubkey,
        created_at: template.created_at,
        tags: template.tags.clone(),
        content: template.content.clone(),
        write_relay_conf: None,
    };
    let digest = event_digest(&unsigned)?;
    let sig = secp.sign_schnorr_no_aux_rand(&Message::from_digest(digest), &keypair);

    Ok(Event {
        id: hex::encode(digest),
        pubkey: unsigned.pubkey,
        created_at: unsigned.created_at,
        kind: unsigned.kind,
        tags: unsigned.tags,
        content: unsigned.content,
        sig: hex::encode(sig.serialize()),
    })
}

/// Check an event's id and signature. Malformed fields are `Ok(false)`.
pub fn verify_event(event: &Event) -> EventResult<bool> {
    if !is_lower_hex(&event.id, 64) || !is_lower_hex(&event.sig, 128) {
        return Ok(false);
    }
    let unsigned = event.to_unsigned(None);
    if !is_lower_hex(&unsigned.pubkey, 64) {
        return Ok(false);
    }
    let digest = event_digest(&unsigned)?;
    if hex::encode(digest) != event.id {
        return Ok(false);
    }

    let sig = schnorr::Signature::from_slice(&hex::decode(&event.sig)?)
        .map_err(|e| EventError::Verification(e.to_string()))?;
    let pubkey = match XOnlyPublicKey::from_slice(&hex::decode(&event.pubkey)?) {
        Ok(pk) => pk,
        Err(_) => return Ok(false),
    };
    let secp = Secp256k1::verification_only();
    Ok(secp
        .verify_schnorr(&sig, &Message::from_digest(digest), &pubkey)
        .is_ok())
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
