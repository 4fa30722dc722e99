//! Keepalive probe responder.

use serde_json::json;

use super::Relay;

/// Fixed acknowledgement event sent in answer to a liveness probe.
const PONG_EVENT: &str = "pong";

impl Relay {
    /// Answer a liveness probe with a fixed ack to the probing connection.
    ///
    /// No identity resolution and no liveness check: answering the probe is
    /// orthogonal to the liveness bookkeeping the probe feeds, and must
    /// work even for a connection whose session state is gone.
    pub async fn respond_to_probe(&self, origin_handle: &str) {
        self.outbound
            .send_event(origin_handle, PONG_EVENT, json!({}))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::test_support::harness;
    use crate::identity::StaticResolver;

    #[tokio::test]
    async fn test_probe_gets_one_ack_on_same_handle() {
        let h = harness(StaticResolver::new());

        // No binding, no liveness record — the ack must go out regardless.
        h.relay.respond_to_probe("sock-B").await;

        let sent = h.outbound.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "sock-B");
        assert_eq!(sent[0].1, "pong");
        assert_eq!(sent[0].2, json!({}));
    }
}
