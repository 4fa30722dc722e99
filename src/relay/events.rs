//! Event tables for the two relay families.
//!
//! Everything that varies per directed event — wire name and payload
//! shape — lives in [`ChatEvent`]; the relay itself is one parameterized
//! function. The opaque family only varies in which payload field names
//! the target, recorded in [`OPAQUE_EVENTS`].

use serde_json::{json, Value};

/// A directed chat event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent {
    /// Free-text message.
    Message,
    /// Open a chat request, optionally carrying client key-exchange data.
    Request,
    /// Acknowledge that a request was seen.
    RequestAck,
    /// Accept a request, optionally carrying client key-exchange data.
    RequestAccept,
    /// Reject a request, optionally with a free-text reason.
    RequestReject,
    /// Withdraw a previously sent request.
    RequestCancel,
    /// Notify the other side that the conversation was deleted.
    Delete,
}

impl ChatEvent {
    /// Wire name of the event delivered to the target connection.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Message => "chat-message",
            Self::Request => "chat-request",
            Self::RequestAck => "chat-request-ack",
            Self::RequestAccept => "chat-request-accept",
            Self::RequestReject => "chat-request-reject",
            Self::RequestCancel => "chat-request-cancel",
            Self::Delete => "chat-delete",
        }
    }

    /// Build the payload delivered to the target.
    ///
    /// Every event names the sender; the extra field depends on the kind
    /// (free-text message, rejection reason, or key-exchange data) and is
    /// omitted when absent rather than sent as null.
    pub fn payload(self, from_user_name: &str, extra: Option<&str>) -> Value {
        let mut payload = json!({ "fromUserName": from_user_name });
        match self {
            Self::Message => {
                payload["message"] = json!(extra.unwrap_or(""));
            }
            Self::Request | Self::RequestAccept => {
                if let Some(data) = extra {
                    payload["encryptionData"] = json!(data);
                }
            }
            Self::RequestReject => {
                if let Some(reason) = extra {
                    payload["reason"] = json!(reason);
                }
            }
            Self::RequestAck | Self::RequestCancel | Self::Delete => {}
        }
        payload
    }
}

/// Routing field per opaque matching-protocol phase.
///
/// The initiate message addresses the responder via `target_user_id`; once
/// the conversational roles reverse, response and result messages address
/// the initiator via `initiator_id`. The two field names are part of the
/// client protocol and must both be preserved.
pub const OPAQUE_EVENTS: &[(&str, &str)] = &[
    ("match-init", "target_user_id"),
    ("match-response", "initiator_id"),
    ("match-result", "initiator_id"),
];

/// Routing field for `event`, or `None` when the event is not part of the
/// matching sub-protocol.
pub fn opaque_routing_field(event: &str) -> Option<&'static str> {
    OPAQUE_EVENTS
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, field)| *field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_shape() {
        let payload = ChatEvent::Message.payload("alice", Some("hi"));
        assert_eq!(payload, json!({"fromUserName": "alice", "message": "hi"}));
    }

    #[test]
    fn test_request_payload_omits_absent_encryption_data() {
        let payload = ChatEvent::Request.payload("alice", None);
        assert_eq!(payload, json!({"fromUserName": "alice"}));

        let payload = ChatEvent::Request.payload("alice", Some("pk-blob"));
        assert_eq!(
            payload,
            json!({"fromUserName": "alice", "encryptionData": "pk-blob"})
        );
    }

    #[test]
    fn test_reject_payload_carries_reason() {
        let payload = ChatEvent::RequestReject.payload("bob", Some("busy"));
        assert_eq!(payload, json!({"fromUserName": "bob", "reason": "busy"}));
    }

    #[test]
    fn test_bare_events_carry_only_sender() {
        for event in [
            ChatEvent::RequestAck,
            ChatEvent::RequestCancel,
            ChatEvent::Delete,
        ] {
            let payload = event.payload("carol", Some("ignored"));
            assert_eq!(payload, json!({"fromUserName": "carol"}));
        }
    }

    #[test]
    fn test_opaque_routing_fields_per_phase() {
        assert_eq!(opaque_routing_field("match-init"), Some("target_user_id"));
        assert_eq!(opaque_routing_field("match-response"), Some("initiator_id"));
        assert_eq!(opaque_routing_field("match-result"), Some("initiator_id"));
        assert_eq!(opaque_routing_field("chat-message"), None);
    }
}
