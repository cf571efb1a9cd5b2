//! Relay transport: the alternate deployment where orchestration runs in a
//! separate process and the client exchanges JSON envelopes with it over an
//! asynchronous message channel.
//!
//! Every outbound request carries a `messageId`; every relay response must
//! echo it. The transport correlates responses to pending requests by that
//! id, discards unmatched or stale frames, and enforces the round-trip
//! timeout by removing the pending entry on expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use charla_core::config::RelayConfig;
use charla_core::error::CharlaError;
use charla_core::types::{Message, ToolResult};

// =============================================================================
// Wire envelopes
// =============================================================================

/// Frames sent from the client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEnvelope {
    #[serde(rename = "INIT")]
    Init { payload: InitPayload },
    #[serde(rename = "USER_MESSAGE")]
    UserMessage {
        #[serde(rename = "messageId")]
        message_id: Uuid,
        payload: UserMessagePayload,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMessagePayload {
    pub content: String,
    pub history: Vec<Message>,
}

/// Frames sent from the relay back to the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEnvelope {
    #[serde(rename = "ASSISTANT_RESPONSE")]
    AssistantResponse {
        #[serde(rename = "messageId")]
        message_id: Uuid,
        payload: AssistantPayload,
    },
    #[serde(rename = "ERROR")]
    Error {
        #[serde(rename = "messageId")]
        message_id: Uuid,
        payload: ErrorPayload,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantPayload {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolResult>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

// =============================================================================
// Channel seam
// =============================================================================

/// Send half of whatever carries frames to the relay process. Socket
/// plumbing lives outside this crate; tests use an in-process loopback.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn send(&self, frame: String) -> Result<(), CharlaError>;
}

#[async_trait]
impl RelayChannel for tokio::sync::mpsc::Sender<String> {
    async fn send(&self, frame: String) -> Result<(), CharlaError> {
        tokio::sync::mpsc::Sender::send(self, frame)
            .await
            .map_err(|_| CharlaError::Network("relay channel closed".to_string()))
    }
}

// =============================================================================
// RelayTransport
// =============================================================================

/// Client side of the relay deployment.
pub struct RelayTransport<C: RelayChannel> {
    channel: C,
    connect_timeout: Duration,
    request_timeout: Duration,
    pending: Mutex<HashMap<Uuid, oneshot::Sender<RelayEnvelope>>>,
}

impl<C: RelayChannel> RelayTransport<C> {
    pub fn new(channel: C, config: &RelayConfig) -> Self {
        Self {
            channel,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Send the INIT handshake. Bounded by the connect timeout.
    pub async fn init(&self, api_key: &str, model: &str) -> Result<(), CharlaError> {
        let frame = serde_json::to_string(&ClientEnvelope::Init {
            payload: InitPayload {
                api_key: api_key.to_string(),
                model: model.to_string(),
            },
        })?;
        tokio::time::timeout(self.connect_timeout, self.channel.send(frame))
            .await
            .map_err(|_| CharlaError::Timeout("relay handshake".to_string()))?
    }

    /// Send one user message and await the relay response with the matching
    /// `messageId`. On timeout the pending entry is removed and `Timeout`
    /// returned; a response arriving later is then discarded as unmatched.
    pub async fn send_user_message(
        &self,
        content: &str,
        history: &[Message],
    ) -> Result<AssistantPayload, CharlaError> {
        let message_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.register_pending(message_id, tx)?;

        let frame = serde_json::to_string(&ClientEnvelope::UserMessage {
            message_id,
            payload: UserMessagePayload {
                content: content.to_string(),
                history: history.to_vec(),
            },
        })?;

        if let Err(e) = self.channel.send(frame).await {
            self.remove_pending(message_id);
            return Err(e);
        }
        debug!(%message_id, "User message sent to relay");

        let envelope = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(_)) => {
                self.remove_pending(message_id);
                return Err(CharlaError::Network(
                    "relay dropped the pending request".to_string(),
                ));
            }
            Err(_) => {
                self.remove_pending(message_id);
                return Err(CharlaError::Timeout("relay round trip".to_string()));
            }
        };

        match envelope {
            RelayEnvelope::AssistantResponse { payload, .. } => Ok(payload),
            RelayEnvelope::Error { payload, .. } => Err(CharlaError::Provider {
                status: 502,
                message: payload.error,
            }),
        }
    }

    /// Feed one inbound frame into the transport. Frames with an unknown or
    /// already-expired `messageId` are discarded with a warning; stale
    /// responses never reach a caller.
    pub fn handle_incoming(&self, frame: &str) {
        let envelope: RelayEnvelope = match serde_json::from_str(frame) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable relay frame");
                return;
            }
        };

        let message_id = match &envelope {
            RelayEnvelope::AssistantResponse { message_id, .. } => *message_id,
            RelayEnvelope::Error { message_id, .. } => *message_id,
        };

        let sender = self.remove_pending(message_id);
        match sender {
            Some(tx) => {
                // Receiver may have timed out between lookup and send.
                if tx.send(envelope).is_err() {
                    warn!(%message_id, "Pending request gone; relay response discarded");
                }
            }
            None => warn!(%message_id, "No pending request for relay response; discarded"),
        }
    }

    /// Number of requests currently awaiting a relay response.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|p| p.len())
            .unwrap_or(0)
    }

    fn register_pending(
        &self,
        message_id: Uuid,
        tx: oneshot::Sender<RelayEnvelope>,
    ) -> Result<(), CharlaError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| CharlaError::Network("pending map poisoned".to_string()))?;
        pending.insert(message_id, tx);
        Ok(())
    }

    fn remove_pending(&self, message_id: Uuid) -> Option<oneshot::Sender<RelayEnvelope>> {
        self.pending.lock().ok()?.remove(&message_id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use charla_core::types::Role;

    fn short_config() -> RelayConfig {
        RelayConfig {
            url: Some("wss://relay.example".to_string()),
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
        }
    }

    fn loopback() -> (
        RelayTransport<tokio::sync::mpsc::Sender<String>>,
        tokio::sync::mpsc::Receiver<String>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        (RelayTransport::new(tx, &short_config()), rx)
    }

    fn extract_message_id(frame: &str) -> Uuid {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["messageId"].as_str().unwrap().parse().unwrap()
    }

    // ---- Envelope wire shapes ----

    #[test]
    fn test_init_envelope_wire_shape() {
        let envelope = ClientEnvelope::Init {
            payload: InitPayload {
                api_key: "sk-test".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "INIT");
        assert_eq!(json["payload"]["apiKey"], "sk-test");
        assert_eq!(json["payload"]["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_user_message_envelope_wire_shape() {
        let id = Uuid::new_v4();
        let envelope = ClientEnvelope::UserMessage {
            message_id: id,
            payload: UserMessagePayload {
                content: "hola".to_string(),
                history: vec![Message::new(Role::User, "anterior")],
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "USER_MESSAGE");
        assert_eq!(json["messageId"], id.to_string());
        assert_eq!(json["payload"]["content"], "hola");
        assert_eq!(json["payload"]["history"][0]["content"], "anterior");
    }

    #[test]
    fn test_relay_envelope_parses_both_variants() {
        let id = Uuid::new_v4();
        let ok = format!(
            r#"{{"type":"ASSISTANT_RESPONSE","messageId":"{}","payload":{{"content":"hola"}}}}"#,
            id
        );
        assert!(matches!(
            serde_json::from_str::<RelayEnvelope>(&ok).unwrap(),
            RelayEnvelope::AssistantResponse { .. }
        ));

        let err = format!(
            r#"{{"type":"ERROR","messageId":"{}","payload":{{"error":"boom"}}}}"#,
            id
        );
        assert!(matches!(
            serde_json::from_str::<RelayEnvelope>(&err).unwrap(),
            RelayEnvelope::Error { .. }
        ));
    }

    // ---- Round trip ----

    #[tokio::test]
    async fn test_round_trip_matches_message_id() {
        let (transport, mut rx) = loopback();
        let transport = std::sync::Arc::new(transport);

        let responder = std::sync::Arc::clone(&transport);
        let echo = tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            let id = extract_message_id(&frame);
            let response = format!(
                r#"{{"type":"ASSISTANT_RESPONSE","messageId":"{}","payload":{{"content":"respuesta"}}}}"#,
                id
            );
            responder.handle_incoming(&response);
        });

        let payload = transport.send_user_message("hola", &[]).await.unwrap();
        assert_eq!(payload.content, "respuesta");
        assert_eq!(transport.pending_count(), 0);
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_error_becomes_provider_error() {
        let (transport, mut rx) = loopback();
        let transport = std::sync::Arc::new(transport);

        let responder = std::sync::Arc::clone(&transport);
        tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            let id = extract_message_id(&frame);
            let response = format!(
                r#"{{"type":"ERROR","messageId":"{}","payload":{{"error":"model unavailable"}}}}"#,
                id
            );
            responder.handle_incoming(&response);
        });

        let err = transport.send_user_message("hola", &[]).await.unwrap_err();
        match err {
            CharlaError::Provider { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "model unavailable");
            }
            other => panic!("expected Provider error, got {:?}", other),
        }
    }

    // ---- Timeout ----

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (transport, _rx) = loopback();

        // Nothing ever answers. The 1s test timeout elapses.
        let err = transport.send_user_message("hola", &[]).await.unwrap_err();
        assert!(matches!(err, CharlaError::Timeout(_)));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_response_after_timeout_is_discarded() {
        let (transport, mut rx) = loopback();

        let err = transport.send_user_message("hola", &[]).await.unwrap_err();
        assert!(matches!(err, CharlaError::Timeout(_)));

        // The response arrives late; it must be dropped, not delivered.
        let frame = rx.recv().await.unwrap();
        let id = extract_message_id(&frame);
        let late = format!(
            r#"{{"type":"ASSISTANT_RESPONSE","messageId":"{}","payload":{{"content":"tarde"}}}}"#,
            id
        );
        transport.handle_incoming(&late);
        assert_eq!(transport.pending_count(), 0);
    }

    // ---- Unmatched / malformed frames ----

    #[tokio::test]
    async fn test_unmatched_message_id_is_ignored() {
        let (transport, _rx) = loopback();
        let frame = format!(
            r#"{{"type":"ASSISTANT_RESPONSE","messageId":"{}","payload":{{"content":"x"}}}}"#,
            Uuid::new_v4()
        );
        transport.handle_incoming(&frame);
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_ignored() {
        let (transport, _rx) = loopback();
        transport.handle_incoming("not json at all");
        transport.handle_incoming(r#"{"type":"UNKNOWN"}"#);
        assert_eq!(transport.pending_count(), 0);
    }

    // ---- Init ----

    #[tokio::test]
    async fn test_init_sends_handshake_frame() {
        let (transport, mut rx) = loopback();
        transport.init("sk-test", "gpt-4o-mini").await.unwrap();

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "INIT");
        assert_eq!(value["payload"]["apiKey"], "sk-test");
    }

    #[tokio::test]
    async fn test_closed_channel_is_network_error() {
        let (tx, rx) = tokio::sync::mpsc::channel::<String>(1);
        drop(rx);
        let transport = RelayTransport::new(tx, &short_config());
        let err = transport.send_user_message("hola", &[]).await.unwrap_err();
        assert!(matches!(err, CharlaError::Network(_)));
        assert_eq!(transport.pending_count(), 0);
    }

    // ---- Concurrent requests correlate independently ----

    #[tokio::test]
    async fn test_overlapping_requests_resolve_by_id() {
        let (transport, mut rx) = loopback();
        let transport = std::sync::Arc::new(transport);

        let responder = std::sync::Arc::clone(&transport);
        tokio::spawn(async move {
            // Answer the two requests in reverse arrival order.
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            for (frame, reply) in [(second, "segunda"), (first, "primera")] {
                let id = extract_message_id(&frame);
                responder.handle_incoming(&format!(
                    r#"{{"type":"ASSISTANT_RESPONSE","messageId":"{}","payload":{{"content":"{}"}}}}"#,
                    id, reply
                ));
            }
        });

        let t1 = std::sync::Arc::clone(&transport);
        let t2 = std::sync::Arc::clone(&transport);
        let (a, b) = tokio::join!(
            t1.send_user_message("uno", &[]),
            t2.send_user_message("dos", &[])
        );
        assert_eq!(a.unwrap().content, "primera");
        assert_eq!(b.unwrap().content, "segunda");
    }
}
