//! The outbound request guard.
//!
//! Every call a snap makes back out through an injected request channel is
//! checked before it leaves the sandbox. Two channel flavors carry
//! different policies: the snap-to-host control channel requires one of
//! two namespace prefixes, while the provider-compatible channel is
//! deny-list only and additionally rejects the snap namespace to keep the
//! two concerns separated. Violations are reported as a standard
//! method-not-found error, deliberately indistinguishable from a
//! genuinely unknown method.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use warden_core::{EpochGuard, JsonRpcError, SnapId, TeardownEpoch, codes, sanitize_json};
use warden_endowments::OutboundChannel;

use crate::notify::Notifier;

/// Namespace prefixes permitted on the snap control channel.
pub const SNAP_CHANNEL_PREFIXES: [&str; 2] = ["wallet_", "snap_"];

/// Methods always rejected on both flavors, regardless of prefix.
pub const BLOCKED_METHODS: [&str; 4] = [
    "wallet_requestSnaps",
    "wallet_requestPermissions",
    "wallet_revokePermissions",
    "eth_sendRawTransaction",
];

/// The namespace prefix rejected on the provider channel.
const PROVIDER_DISALLOWED_PREFIX: &str = "snap_";

/// Which policy a guarded channel enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFlavor {
    /// The snap-to-host control channel: prefix allow-list plus deny-list.
    SnapChannel,
    /// The blockchain-provider-compatible channel: deny-list only, snap
    /// namespace disallowed.
    Provider,
}

/// Validate a method name against a flavor's policy.
///
/// # Errors
///
/// Returns the canonical method-not-found error on any violation; blocked
/// methods and unknown methods are indistinguishable by design.
pub fn check_method(flavor: ChannelFlavor, method: &str) -> Result<(), JsonRpcError> {
    if BLOCKED_METHODS.contains(&method) {
        return Err(JsonRpcError::method_not_found(method));
    }
    match flavor {
        ChannelFlavor::SnapChannel => {
            if !SNAP_CHANNEL_PREFIXES
                .iter()
                .any(|prefix| method.starts_with(prefix))
            {
                return Err(JsonRpcError::method_not_found(method));
            }
        },
        ChannelFlavor::Provider => {
            if method.starts_with(PROVIDER_DISALLOWED_PREFIX) {
                return Err(JsonRpcError::method_not_found(method));
            }
        },
    }
    Ok(())
}

/// A policy-enforcing, epoch-guarded wrapper over the host channel.
pub struct GuardedChannel {
    inner: Arc<dyn OutboundChannel>,
    flavor: ChannelFlavor,
    snap_id: SnapId,
    guard: EpochGuard,
    notifier: Notifier,
}

impl GuardedChannel {
    /// Wrap `inner` with the given flavor's policy for one snap.
    #[must_use]
    pub fn new(
        inner: Arc<dyn OutboundChannel>,
        flavor: ChannelFlavor,
        snap_id: SnapId,
        epoch: Arc<TeardownEpoch>,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner,
            flavor,
            snap_id,
            guard: EpochGuard::new(epoch),
            notifier,
        }
    }
}

#[async_trait]
impl OutboundChannel for GuardedChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        check_method(self.flavor, method)?;

        // Round-trip the arguments through the JSON-only subset before
        // they can smuggle structure out of the sandbox.
        let params = sanitize_json(params)
            .map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))?;

        self.notifier.outbound_request(&self.snap_id, method);
        let outcome = self.guard.run(self.inner.request(method, params)).await;
        self.notifier.outbound_response(&self.snap_id, method);

        match outcome {
            Ok(result) => result,
            // The snap was torn down while the call was in flight; the
            // response is dropped rather than delivered.
            Err(_) => Err(JsonRpcError::new(
                codes::TERMINATED,
                "the snap was torn down before the response arrived",
            )),
        }
    }
}
