//! Blind forwarding for the privacy-preserving matching sub-protocol.
//!
//! These payloads run end-to-end between clients; the relay reads exactly
//! one routing field and forwards everything else untouched. The calls
//! arrive on a fire-and-forget event channel with no caller waiting, so
//! every failure here is a logged drop — surfacing an error would crash a
//! notification path that has nowhere to report it.

use serde_json::Value;
use tracing::{debug, warn};

use crate::identity::Identity;
use crate::util::epoch_ms;

use super::events::opaque_routing_field;
use super::Relay;

impl Relay {
    /// Forward an opaque sub-protocol event from a connected sender.
    ///
    /// The sender comes from the connection's session, never from the
    /// payload. The target is read from the phase's routing field inside
    /// `payload`; the payload itself is forwarded unmodified under the
    /// same event name.
    pub async fn relay_opaque(&self, origin: &Identity, event: &str, payload: Value) {
        let Some(field) = opaque_routing_field(event) else {
            warn!(event, from = origin.id, "Unknown opaque event, dropping");
            return;
        };

        let Some(target_id) = payload[field].as_i64() else {
            warn!(
                event,
                field,
                from = origin.id,
                "Opaque event missing routing field, dropping"
            );
            return;
        };

        let handle = match self.directory.lookup(target_id).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!(event, target = target_id, "Opaque target not connected, dropping");
                return;
            }
            Err(e) => {
                warn!(event, target = target_id, error = %e, "Store failure on opaque relay, dropping");
                return;
            }
        };

        match self.liveness.is_live(target_id, epoch_ms()).await {
            Ok(liveness) if liveness.live => {}
            Ok(_) => {
                debug!(event, target = target_id, "Opaque target not online, dropping");
                return;
            }
            Err(e) => {
                warn!(event, target = target_id, error = %e, "Store failure on opaque relay, dropping");
                return;
            }
        }

        self.outbound.send_event(&handle, event, payload).await;
    }
}
