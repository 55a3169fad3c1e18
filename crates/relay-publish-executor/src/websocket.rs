//! NIP-01 relay transport.

use crate::{RelayCapability, RelayRejection};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use nostr_event_model::Event;
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

/// Publishes over a short-lived WebSocket per call.
///
/// Sends `["EVENT", event]` and waits for the matching
/// `["OK", id, accepted, message]`. Callers bound the wait with a timeout.
#[derive(Debug, Clone, Default)]
pub struct WebSocketRelay;

impl WebSocketRelay {
    pub fn new() -> Self {
        Self
    }
}

/// Outcome carried by an `OK` frame for `event_id`, if `text` is one.
fn parse_ok_frame(text: &str, event_id: &str) -> Option<Result<(), RelayRejection>> {
    let frame: Vec<Value> = serde_json::from_str(text).ok()?;
    match frame.first().and_then(Value::as_str) {
        Some("OK") if frame.get(1).and_then(Value::as_str) == Some(event_id) => {
            let accepted = frame.get(2).and_then(Value::as_bool).unwrap_or(false);
            let message = frame
                .get(3)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(if accepted {
                Ok(())
            } else if message.is_empty() {
                Err(RelayRejection::Rejected("rejected".to_string()))
            } else {
                Err(RelayRejection::Rejected(message))
            })
        }
        Some("NOTICE") => {
            debug!(notice = %text, "Relay notice");
            None
        }
        _ => None,
    }
}

#[async_trait]
impl RelayCapability for WebSocketRelay {
    async fn publish(&self, url: &str, event: &Event) -> Result<(), RelayRejection> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| RelayRejection::Connection(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let frame = serde_json::to_string(&("EVENT", event))
            .map_err(|e| RelayRejection::Protocol(e.to_string()))?;
        write
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| RelayRejection::Connection(e.to_string()))?;
        debug!(relay = %url, event_id = %event.id, "Sent EVENT");

        let outcome = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(outcome) = parse_ok_frame(&text, &event.id) {
                        break outcome;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(relay = %url, ?frame, "Relay closed connection");
                    break Err(RelayRejection::Connection(
                        "closed before acknowledging".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(RelayRejection::Connection(e.to_string())),
                None => {
                    break Err(RelayRejection::Connection(
                        "stream ended before acknowledging".to_string(),
                    ))
                }
            }
        };

        let _ = write.send(Message::Close(None)).await;
        outcome
    }
}
