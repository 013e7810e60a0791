//! Outbound action envelopes and the shared send handle.

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::event::{ChannelKind, MessageEvent};
use crate::protocol::HEARTBEAT_ECHO;

/// Destination of an outbound action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    Private(i64),
    Group(i64),
}

/// One outbound message. Immutable once constructed, transmitted exactly
/// once, no acknowledgement awaited.
#[derive(Debug, Clone)]
pub struct OutboundAction {
    pub target: ActionTarget,
    pub text: String,
}

#[derive(Serialize)]
struct Envelope<'a, P: Serialize> {
    action: &'a str,
    params: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    echo: Option<&'a str>,
}

#[derive(Serialize)]
struct SendMsgParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<i64>,
    message: &'a str,
}

impl OutboundAction {
    pub fn private(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            target: ActionTarget::Private(user_id),
            text: text.into(),
        }
    }

    pub fn group(group_id: i64, text: impl Into<String>) -> Self {
        Self {
            target: ActionTarget::Group(group_id),
            text: text.into(),
        }
    }

    /// Serialize into the wire action envelope.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let (action, params) = match self.target {
            ActionTarget::Private(user_id) => (
                "send_private_msg",
                SendMsgParams {
                    user_id: Some(user_id),
                    group_id: None,
                    message: &self.text,
                },
            ),
            ActionTarget::Group(group_id) => (
                "send_group_msg",
                SendMsgParams {
                    user_id: None,
                    group_id: Some(group_id),
                    message: &self.text,
                },
            ),
        };

        serde_json::to_string(&Envelope {
            action,
            params,
            echo: None,
        })
    }
}

/// The liveness probe frame, tagged with the reserved echo value.
pub fn heartbeat_frame() -> String {
    json!({
        "action": "get_status",
        "params": {},
        "echo": HEARTBEAT_ECHO,
    })
    .to_string()
}

/// Cloneable handle for queueing outbound actions.
///
/// The connection task is the only consumer; every producer (frame handler,
/// heartbeat timer, game-side collaborators) funnels through this channel,
/// which serializes concurrent senders onto the single write half.
#[derive(Clone)]
pub struct ActionSender {
    tx: mpsc::UnboundedSender<OutboundAction>,
}

impl ActionSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, action: OutboundAction) {
        if self.tx.send(action).is_err() {
            debug!("Dropping outbound action - connection task has ended");
        }
    }

    pub fn send_private(&self, user_id: i64, text: impl Into<String>) {
        self.send(OutboundAction::private(user_id, text));
    }

    pub fn send_group(&self, group_id: i64, text: impl Into<String>) {
        self.send(OutboundAction::group(group_id, text));
    }

    /// Reply on the channel a message arrived on.
    pub fn reply(&self, event: &MessageEvent, text: impl Into<String>) {
        match event.channel {
            ChannelKind::Private => self.send_private(event.channel_id, text),
            ChannelKind::Group => self.send_group(event.channel_id, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_group_action_envelope() {
        let action = OutboundAction::group(123456, "hello");
        let frame: Value = serde_json::from_str(&action.to_frame().unwrap()).unwrap();

        assert_eq!(frame["action"], "send_group_msg");
        assert_eq!(frame["params"]["group_id"], 123456);
        assert_eq!(frame["params"]["message"], "hello");
        assert!(frame["params"].get("user_id").is_none());
        assert!(frame.get("echo").is_none());
    }

    #[test]
    fn test_private_action_envelope() {
        let action = OutboundAction::private(42, "psst");
        let frame: Value = serde_json::from_str(&action.to_frame().unwrap()).unwrap();

        assert_eq!(frame["action"], "send_private_msg");
        assert_eq!(frame["params"]["user_id"], 42);
        assert!(frame["params"].get("group_id").is_none());
    }

    #[test]
    fn test_heartbeat_frame_carries_reserved_echo() {
        let frame: Value = serde_json::from_str(&heartbeat_frame()).unwrap();
        assert_eq!(frame["action"], "get_status");
        assert_eq!(frame["echo"], HEARTBEAT_ECHO);
    }

    #[test]
    fn test_reply_targets_originating_channel() {
        use crate::protocol::event::{ChannelKind, MessageEvent};

        let (sender, mut rx) = ActionSender::new();
        let event = MessageEvent {
            channel: ChannelKind::Group,
            channel_id: 99,
            sender_id: 1,
            sender_name: "x".to_string(),
            text: String::new(),
        };
        sender.reply(&event, "denied");

        let action = rx.try_recv().unwrap();
        assert_eq!(action.target, ActionTarget::Group(99));
        assert_eq!(action.text, "denied");
    }
}
