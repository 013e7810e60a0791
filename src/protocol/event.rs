//! Inbound frame classification.
//!
//! Turns raw JSON frames into [`ProtocolEvent`] values. Classification never
//! fails loudly: malformed frames, unknown discriminators and the heartbeat
//! ack are dropped so a bad frame cannot affect the ones after it.

use serde_json::Value;
use tracing::debug;

use crate::protocol::HEARTBEAT_ECHO;

/// Placeholder substituted for image segments when flattening a message.
pub const IMAGE_PLACEHOLDER: &str = "[image]";

/// Which kind of channel a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Private,
    Group,
}

/// A chat message from the platform, flattened to plain text.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub channel: ChannelKind,
    /// Group id for group messages, sender id for private messages.
    pub channel_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub text: String,
}

/// Classified inbound protocol event.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    Message(MessageEvent),
    Notice { kind: String },
    Request { kind: String },
    Meta { kind: String },
}

/// Classify one raw frame.
///
/// Returns `None` for the heartbeat ack, frames without a `post_type`,
/// unknown discriminators and frames that fail to parse.
pub fn classify_frame(raw: &str) -> Option<ProtocolEvent> {
    let json: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("Dropping malformed frame: {}", e);
            return None;
        }
    };

    // The liveness probe ack is consumed here and never surfaced.
    if json.get("echo").and_then(Value::as_str) == Some(HEARTBEAT_ECHO) {
        return None;
    }

    let post_type = json.get("post_type").and_then(Value::as_str)?;
    match post_type {
        "message" => classify_message(&json),
        "notice" => Some(ProtocolEvent::Notice {
            kind: str_field(&json, "notice_type"),
        }),
        "request" => Some(ProtocolEvent::Request {
            kind: str_field(&json, "request_type"),
        }),
        "meta_event" => Some(ProtocolEvent::Meta {
            kind: str_field(&json, "meta_event_type"),
        }),
        other => {
            debug!("Dropping frame with unknown post_type '{}'", other);
            None
        }
    }
}

fn classify_message(json: &Value) -> Option<ProtocolEvent> {
    let sender_id = json.get("user_id").and_then(Value::as_i64)?;

    let channel = match json.get("message_type").and_then(Value::as_str)? {
        "private" => ChannelKind::Private,
        "group" => ChannelKind::Group,
        other => {
            debug!("Dropping message with unknown message_type '{}'", other);
            return None;
        }
    };

    let channel_id = match channel {
        ChannelKind::Group => json.get("group_id").and_then(Value::as_i64)?,
        ChannelKind::Private => sender_id,
    };

    Some(ProtocolEvent::Message(MessageEvent {
        channel,
        channel_id,
        sender_id,
        sender_name: sender_name(json, sender_id),
        text: message_text(json)?,
    }))
}

/// Display name: the group card when set, else the nickname, else the id.
fn sender_name(json: &Value, sender_id: i64) -> String {
    let sender = json.get("sender");
    sender
        .and_then(|s| s.get("card"))
        .and_then(Value::as_str)
        .filter(|card| !card.is_empty())
        .or_else(|| sender.and_then(|s| s.get("nickname")).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| sender_id.to_string())
}

/// Extract the message text, flattening structured segments when the frame
/// carries them.
fn message_text(json: &Value) -> Option<String> {
    let is_array_format = json.get("message_format").and_then(Value::as_str) == Some("array");
    if is_array_format {
        if let Some(segments) = json.get("message").and_then(Value::as_array) {
            return Some(flatten_segments(segments));
        }
    }

    json.get("raw_message")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Flatten an ordered list of `{type, data}` segments to plain text.
///
/// `text` contributes its content, mentions become `@name`, images become a
/// placeholder, unrecognized segment types are skipped.
fn flatten_segments(segments: &[Value]) -> String {
    let mut out = String::new();
    for segment in segments {
        let data = segment.get("data");
        match segment.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = data.and_then(|d| d.get("text")).and_then(Value::as_str) {
                    out.push_str(text);
                }
            }
            Some("at") => {
                let name = data
                    .and_then(|d| d.get("name").or_else(|| d.get("qq")))
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                out.push('@');
                out.push_str(name);
                out.push(' ');
            }
            Some("image") => {
                out.push_str(IMAGE_PLACEHOLDER);
                out.push(' ');
            }
            _ => {}
        }
    }
    out.trim().to_string()
}

fn str_field(json: &Value, key: &str) -> String {
    json.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_ack_is_consumed() {
        let frame = r#"{"echo":"heartbeat","status":"ok","retcode":0}"#;
        assert!(classify_frame(frame).is_none());
    }

    #[test]
    fn test_frame_without_post_type_is_dropped() {
        assert!(classify_frame(r#"{"status":"ok"}"#).is_none());
    }

    #[test]
    fn test_unknown_post_type_is_dropped() {
        assert!(classify_frame(r#"{"post_type":"whatever"}"#).is_none());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        assert!(classify_frame("{not json").is_none());
        assert!(classify_frame("").is_none());
    }

    #[test]
    fn test_group_message_raw_text() {
        let frame = r#"{
            "post_type": "message",
            "message_type": "group",
            "group_id": 123456,
            "user_id": 1001,
            "raw_message": "hello world",
            "sender": {"nickname": "Alice"}
        }"#;

        match classify_frame(frame) {
            Some(ProtocolEvent::Message(msg)) => {
                assert_eq!(msg.channel, ChannelKind::Group);
                assert_eq!(msg.channel_id, 123456);
                assert_eq!(msg.sender_id, 1001);
                assert_eq!(msg.sender_name, "Alice");
                assert_eq!(msg.text, "hello world");
            }
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[test]
    fn test_private_message_uses_sender_as_channel() {
        let frame = r#"{
            "post_type": "message",
            "message_type": "private",
            "user_id": 42,
            "message": "hi",
            "sender": {"nickname": "Bob"}
        }"#;

        match classify_frame(frame) {
            Some(ProtocolEvent::Message(msg)) => {
                assert_eq!(msg.channel, ChannelKind::Private);
                assert_eq!(msg.channel_id, 42);
                assert_eq!(msg.text, "hi");
            }
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[test]
    fn test_segment_array_is_flattened() {
        let frame = r#"{
            "post_type": "message",
            "message_type": "group",
            "group_id": 1,
            "user_id": 2,
            "message_format": "array",
            "message": [
                {"type": "at", "data": {"name": "Carol"}},
                {"type": "text", "data": {"text": "look at this"}},
                {"type": "image", "data": {"file": "abc.png"}},
                {"type": "sticker", "data": {"id": "9"}}
            ],
            "sender": {"nickname": "Dave"}
        }"#;

        match classify_frame(frame) {
            Some(ProtocolEvent::Message(msg)) => {
                assert_eq!(msg.text, "@Carol look at this[image]");
            }
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[test]
    fn test_card_preferred_over_nickname() {
        let frame = r#"{
            "post_type": "message",
            "message_type": "group",
            "group_id": 1,
            "user_id": 2,
            "raw_message": "x",
            "sender": {"nickname": "Real Name", "card": "Group Card"}
        }"#;

        match classify_frame(frame) {
            Some(ProtocolEvent::Message(msg)) => assert_eq!(msg.sender_name, "Group Card"),
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[test]
    fn test_notice_and_meta_events() {
        let notice = r#"{"post_type":"notice","notice_type":"group_increase"}"#;
        match classify_frame(notice) {
            Some(ProtocolEvent::Notice { kind }) => assert_eq!(kind, "group_increase"),
            other => panic!("expected notice, got {:?}", other),
        }

        let meta = r#"{"post_type":"meta_event","meta_event_type":"heartbeat"}"#;
        match classify_frame(meta) {
            Some(ProtocolEvent::Meta { kind }) => assert_eq!(kind, "heartbeat"),
            other => panic!("expected meta event, got {:?}", other),
        }
    }
}
