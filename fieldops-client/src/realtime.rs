//! Realtime change feed over a Phoenix-channel WebSocket, with reconnect backoff.
//!
//! Each subscription owns one socket and one channel
//! (`realtime:public:<table>`) joined with a `postgres_changes` filter for
//! every event on that table. The feed task reconnects forever; it only
//! stops when the subscriber goes away.

use crate::backend::Subscription;
use crate::config::{ClientConfig, ReconnectConfig};
use crate::error::{BackendError, BackendResult};
use fieldops_core::{ChangeEvent, FeedMessage, FeedStatus, Record, RecordId};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type SocketStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

/// What one inbound frame means for the feed.
#[derive(Debug, PartialEq)]
enum Frame {
    Deliver(FeedMessage),
    ChannelFailed(String),
    Ignore,
}

enum FeedEnd {
    SubscriberGone,
    Disconnected(String),
}

#[derive(Clone)]
pub struct RealtimeClient {
    endpoint: String,
    api_key: String,
    access_token: String,
    heartbeat: Duration,
    reconnect: ReconnectConfig,
    buffer: usize,
}

impl RealtimeClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.realtime_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.bearer_token().to_string(),
            heartbeat: Duration::from_millis(config.heartbeat_interval_ms),
            reconnect: config.reconnect.clone(),
            buffer: config.feed_buffer.max(1),
        }
    }

    /// Socket URL with the API key and protocol version in the query string.
    pub fn socket_url(&self) -> BackendResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}/websocket", self.endpoint))
            .map_err(|e| BackendError::Config(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    /// Start a feed task for `table`. Must be called inside a tokio runtime.
    pub fn subscribe(&self, table: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let client = self.clone();
        let table_name = table.to_string();
        let task = tokio::spawn(async move { client.run_feed(table_name, sender).await });
        Subscription::new(table, receiver, task)
    }

    async fn connect(&self) -> BackendResult<SocketStream> {
        let url = self.socket_url()?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(stream)
    }

    async fn run_feed(self, table: String, sender: mpsc::Sender<FeedMessage>) {
        let mut backoff = self.reconnect.initial_ms;
        loop {
            let status = match self.connect().await {
                Ok(stream) => {
                    backoff = self.reconnect.initial_ms;
                    match self.stream_changes(stream, &table, &sender).await {
                        FeedEnd::SubscriberGone => {
                            debug!(table = %table, "Subscriber gone, stopping change feed");
                            return;
                        }
                        FeedEnd::Disconnected(reason) => {
                            info!(table = %table, reason = %reason, "Change feed disconnected");
                            FeedStatus::Disconnected { reason }
                        }
                    }
                }
                Err(err) => {
                    warn!(table = %table, error = %err, "Change feed connection failed");
                    FeedStatus::Error {
                        message: err.to_string(),
                    }
                }
            };

            if sender.send(FeedMessage::Status(status)).await.is_err() {
                return;
            }

            let delay = self.reconnect.jittered_delay_ms(backoff);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = sender.closed() => return,
            }
            backoff = self.reconnect.next_delay_ms(backoff);
        }
    }

    async fn stream_changes(
        &self,
        stream: SocketStream,
        table: &str,
        sender: &mpsc::Sender<FeedMessage>,
    ) -> FeedEnd {
        let (mut sink, mut source) = stream.split();
        let topic = channel_topic(table);
        let mut next_ref: u64 = 1;
        let join_ref = next_ref.to_string();

        let join = join_message(&topic, table, &self.access_token, &join_ref);
        if let Err(err) = sink.send(Message::Text(join.to_string())).await {
            return FeedEnd::Disconnected(err.to_string());
        }

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = sender.closed() => {
                    next_ref += 1;
                    let leave = leave_message(&topic, &next_ref.to_string());
                    let _ = sink.send(Message::Text(leave.to_string())).await;
                    let _ = sink.close().await;
                    return FeedEnd::SubscriberGone;
                }
                _ = heartbeat.tick() => {
                    next_ref += 1;
                    let beat = heartbeat_message(&next_ref.to_string());
                    if let Err(err) = sink.send(Message::Text(beat.to_string())).await {
                        return FeedEnd::Disconnected(err.to_string());
                    }
                }
                message = source.next() => {
                    let text = match message {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            return FeedEnd::Disconnected("connection closed".to_string());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return FeedEnd::Disconnected(err.to_string()),
                    };

                    let outgoing = match decode_frame(&topic, &join_ref, &text) {
                        Ok(Frame::Deliver(message)) => message,
                        Ok(Frame::ChannelFailed(reason)) => return FeedEnd::Disconnected(reason),
                        Ok(Frame::Ignore) => continue,
                        Err(err) => {
                            warn!(table = %table, error = %err, "Undecodable change feed frame");
                            FeedMessage::Status(FeedStatus::Error {
                                message: format!("Change feed decode error: {}", err),
                            })
                        }
                    };
                    if sender.send(outgoing).await.is_err() {
                        return FeedEnd::SubscriberGone;
                    }
                }
            }
        }
    }
}

fn channel_topic(table: &str) -> String {
    format!("realtime:public:{}", table)
}

fn join_message(topic: &str, table: &str, access_token: &str, join_ref: &str) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token
        },
        "ref": join_ref,
        "join_ref": join_ref
    })
}

fn leave_message(topic: &str, reference: &str) -> Value {
    json!({ "topic": topic, "event": "phx_leave", "payload": {}, "ref": reference })
}

fn heartbeat_message(reference: &str) -> Value {
    json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": reference })
}

fn decode_frame(topic: &str, join_ref: &str, text: &str) -> BackendResult<Frame> {
    let message: PhoenixMessage = serde_json::from_str(text)?;
    if message.topic != topic {
        return Ok(Frame::Ignore);
    }

    match message.event.as_str() {
        "phx_reply" => {
            if message.reference.as_deref() != Some(join_ref) {
                return Ok(Frame::Ignore);
            }
            let status = message.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                Ok(Frame::Deliver(FeedMessage::Status(FeedStatus::Connected)))
            } else {
                let reason = message
                    .payload
                    .get("response")
                    .map(|response| match response.get("reason").and_then(Value::as_str) {
                        Some(reason) => reason.to_string(),
                        None => response.to_string(),
                    })
                    .unwrap_or_else(|| "join rejected".to_string());
                Ok(Frame::ChannelFailed(format!("join rejected: {}", reason)))
            }
        }
        "phx_error" => Ok(Frame::ChannelFailed("channel error".to_string())),
        "phx_close" => Ok(Frame::ChannelFailed("channel closed".to_string())),
        "postgres_changes" => {
            let data = message
                .payload
                .get("data")
                .ok_or_else(|| BackendError::Decode("postgres_changes without data".to_string()))?;
            let kind = data
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| BackendError::Decode("postgres_changes without type".to_string()))?;
            let event = decode_change(kind, data.get("record"), data.get("old_record"))?;
            Ok(Frame::Deliver(FeedMessage::Change(event)))
        }
        "INSERT" | "UPDATE" | "DELETE" => {
            let event = decode_change(
                &message.event,
                message.payload.get("record"),
                message.payload.get("old_record"),
            )?;
            Ok(Frame::Deliver(FeedMessage::Change(event)))
        }
        "system" => {
            if message.payload.get("status").and_then(Value::as_str) == Some("error") {
                let text = message
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("realtime system error")
                    .to_string();
                Ok(Frame::Deliver(FeedMessage::Status(FeedStatus::Error { message: text })))
            } else {
                Ok(Frame::Ignore)
            }
        }
        _ => Ok(Frame::Ignore),
    }
}

fn decode_change(
    kind: &str,
    record: Option<&Value>,
    old_record: Option<&Value>,
) -> BackendResult<ChangeEvent> {
    let required = |value: Option<&Value>, name: &str| {
        value
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| BackendError::Decode(format!("{} change without {}", kind, name)))
    };

    match kind {
        "INSERT" => Ok(ChangeEvent::Created {
            record: Record::from_value(required(record, "record")?)?,
        }),
        "UPDATE" => Ok(ChangeEvent::Updated {
            record: Record::from_value(required(record, "record")?)?,
        }),
        "DELETE" => {
            let old = required(old_record, "old_record")?;
            let id_value = old
                .get("id")
                .cloned()
                .ok_or_else(|| BackendError::Decode("DELETE change without id".to_string()))?;
            let id: RecordId = serde_json::from_value(id_value)?;
            Ok(ChangeEvent::Deleted {
                id,
                old_record: Record::from_value(old).ok(),
            })
        }
        other => Err(BackendError::Decode(format!("unknown change type: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use fieldops_core::ChangeKind;

    const TOPIC: &str = "realtime:public:job_cards";

    fn client() -> RealtimeClient {
        RealtimeClient::new(&ClientConfig {
            rest_url: "http://localhost:54321/rest/v1".to_string(),
            realtime_url: "ws://localhost:54321/realtime/v1/".to_string(),
            api_key: "anon key".to_string(),
            access_token: None,
            request_timeout_ms: 1_000,
            heartbeat_interval_ms: 30_000,
            feed_buffer: 16,
            reconnect: ReconnectConfig {
                initial_ms: 100,
                max_ms: 1_000,
                multiplier: 2.0,
                jitter_ms: 0,
            },
        })
    }

    #[test]
    fn test_socket_url() {
        let url = client().socket_url().expect("url");
        assert_eq!(
            url.as_str(),
            "ws://localhost:54321/realtime/v1/websocket?apikey=anon+key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_join_message_filters_table() {
        let join = join_message(TOPIC, "job_cards", "token", "1");
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["payload"]["config"]["postgres_changes"][0]["table"], "job_cards");
        assert_eq!(join["payload"]["access_token"], "token");
    }

    #[test]
    fn test_join_reply_ok_means_connected() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(
            decode_frame(TOPIC, "1", text).expect("frame"),
            Frame::Deliver(FeedMessage::Status(FeedStatus::Connected))
        );
    }

    #[test]
    fn test_join_reply_error_fails_channel() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#;
        assert_eq!(
            decode_frame(TOPIC, "1", text).expect("frame"),
            Frame::ChannelFailed("join rejected: unauthorized".to_string())
        );
    }

    #[test]
    fn test_heartbeat_reply_ignored() {
        let text = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"2"}"#;
        assert_eq!(decode_frame(TOPIC, "1", text).expect("frame"), Frame::Ignore);
    }

    #[test]
    fn test_postgres_changes_insert() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"postgres_changes","payload":{"data":{"type":"INSERT","table":"job_cards","record":{"id":"c","created_at":"2024-01-03T00:00:00Z","title":"Replace belt"},"old_record":null}},"ref":null}"#;
        match decode_frame(TOPIC, "1", text).expect("frame") {
            Frame::Deliver(FeedMessage::Change(event)) => {
                assert_eq!(event.kind(), ChangeKind::Created);
                assert_eq!(event.record_id(), &RecordId::from("c"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_delete_with_key_only_old_record() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"DELETE","payload":{"type":"DELETE","old_record":{"id":17}},"ref":null}"#;
        match decode_frame(TOPIC, "1", text).expect("frame") {
            Frame::Deliver(FeedMessage::Change(ChangeEvent::Deleted { id, old_record })) => {
                assert_eq!(id, RecordId::Number(17));
                assert!(old_record.is_none());
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_update_without_record_is_decode_error() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"postgres_changes","payload":{"data":{"type":"UPDATE","record":null}},"ref":null}"#;
        assert!(matches!(
            decode_frame(TOPIC, "1", text),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn test_system_error_surfaces_as_status() {
        let text = r#"{"topic":"realtime:public:job_cards","event":"system","payload":{"status":"error","message":"publication missing"},"ref":null}"#;
        assert_eq!(
            decode_frame(TOPIC, "1", text).expect("frame"),
            Frame::Deliver(FeedMessage::Status(FeedStatus::Error {
                message: "publication missing".to_string()
            }))
        );
    }
}
