//! Request/response directed sends.
//!
//! There is deliberately no conversation state machine across these calls:
//! nothing stops an accept without a prior request, or a cancel after an
//! accept. Each call is independently authorized and relayed; if a phase
//! order matters, it is the clients' contract to enforce.

use tracing::info;

use crate::identity::{normalize_name, Identity};
use crate::util::epoch_ms;

use super::events::ChatEvent;
use super::{Relay, RelayError};

impl Relay {
    /// Relay a directed event from `sender` to the user named `target_name`.
    ///
    /// Each step fails with its own condition: empty target, self-target,
    /// unknown name, no connection binding, stale liveness. On success the
    /// event was handed to the transport for the currently-bound,
    /// currently-live connection — nothing stronger.
    pub async fn send_directed(
        &self,
        sender: &Identity,
        target_name: &str,
        event: ChatEvent,
        extra: Option<&str>,
    ) -> Result<(), RelayError> {
        let target_name = normalize_name(target_name);
        let sender_name = normalize_name(&sender.name);

        if target_name.is_empty() {
            return Err(RelayError::MissingTarget);
        }
        // Rejected before any lookup, whatever the registries say.
        if target_name == sender_name {
            return Err(RelayError::SelfTarget);
        }

        let target = self
            .resolver
            .resolve(&sender.tenant, &target_name)
            .await?
            .ok_or(RelayError::TargetNotFound)?;

        let handle = self
            .directory
            .lookup(target.id)
            .await?
            .ok_or(RelayError::TargetNotConnected)?;

        let liveness = self.liveness.is_live(target.id, epoch_ms()).await?;
        if !liveness.live {
            return Err(RelayError::TargetNotOnline);
        }

        let payload = event.payload(&sender_name, extra);
        self.outbound
            .send_event(&handle, event.wire_name(), payload)
            .await;

        info!(
            from = %sender_name,
            to = %target_name,
            event = event.wire_name(),
            "Relayed directed event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::test_support::{harness, Harness};
    use super::*;
    use crate::identity::StaticResolver;

    fn sender() -> Identity {
        Identity {
            tenant: "acme".into(),
            id: 7,
            name: "alice".into(),
        }
    }

    fn two_users() -> Harness {
        harness(
            StaticResolver::new()
                .with("acme", 7, "alice")
                .with("acme", 42, "bob"),
        )
    }

    #[tokio::test]
    async fn test_missing_target_rejected() {
        let h = two_users();
        let err = h
            .relay
            .send_directed(&sender(), "   ", ChatEvent::Message, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MissingTarget));
    }

    #[tokio::test]
    async fn test_self_target_rejected_before_lookup() {
        let h = two_users();
        // Bound and live — the self-check must still win.
        h.directory.bind(7, "sock-self").await.unwrap();
        h.liveness.touch(Some(7), epoch_ms()).await.unwrap();

        let err = h
            .relay
            .send_directed(&sender(), "  ALICE ", ChatEvent::Message, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::SelfTarget));
        assert!(h.outbound.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_not_found() {
        let h = two_users();
        let err = h
            .relay
            .send_directed(&sender(), "mallory", ChatEvent::Message, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TargetNotFound));
    }

    #[tokio::test]
    async fn test_unbound_target_not_connected() {
        let h = two_users();
        // Known and even live, but no binding.
        h.liveness.touch(Some(42), epoch_ms()).await.unwrap();

        let err = h
            .relay
            .send_directed(&sender(), "bob", ChatEvent::Message, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TargetNotConnected));
        assert!(h.outbound.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_target_not_online() {
        let h = two_users();
        h.directory.bind(42, "sock-A").await.unwrap();
        // Heartbeat 15 s in the past, threshold 10 s.
        h.liveness
            .touch(Some(42), epoch_ms() - 15_000)
            .await
            .unwrap();

        let err = h
            .relay
            .send_directed(&sender(), "bob", ChatEvent::Message, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TargetNotOnline));
        assert!(h.outbound.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_live_target_gets_exactly_one_event() {
        let h = two_users();
        h.directory.bind(42, "sock-A").await.unwrap();
        h.liveness.touch(Some(42), epoch_ms() - 1_000).await.unwrap();

        h.relay
            .send_directed(&sender(), "Bob", ChatEvent::Message, Some("hi"))
            .await
            .unwrap();

        let sent = h.outbound.sent.lock().await;
        assert_eq!(sent.len(), 1);
        let (handle, event, payload) = &sent[0];
        assert_eq!(handle, "sock-A");
        assert_eq!(event, "chat-message");
        assert_eq!(
            payload,
            &json!({"fromUserName": "alice", "message": "hi"})
        );
    }

    #[tokio::test]
    async fn test_reject_carries_reason_in_payload() {
        let h = two_users();
        h.directory.bind(42, "sock-A").await.unwrap();
        h.liveness.touch(Some(42), epoch_ms()).await.unwrap();

        h.relay
            .send_directed(&sender(), "bob", ChatEvent::RequestReject, Some("busy"))
            .await
            .unwrap();

        let sent = h.outbound.sent.lock().await;
        assert_eq!(sent[0].1, "chat-request-reject");
        assert_eq!(
            sent[0].2,
            json!({"fromUserName": "alice", "reason": "busy"})
        );
    }

    #[tokio::test]
    async fn test_accept_without_prior_request_is_relayed() {
        // No conversation state machine: an accept out of thin air still
        // relays as long as the target is reachable.
        let h = two_users();
        h.directory.bind(42, "sock-A").await.unwrap();
        h.liveness.touch(Some(42), epoch_ms()).await.unwrap();

        h.relay
            .send_directed(&sender(), "bob", ChatEvent::RequestAccept, None)
            .await
            .unwrap();
        assert_eq!(h.outbound.sent.lock().await.len(), 1);
    }
}
