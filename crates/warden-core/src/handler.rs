//! Handler kinds a snap may export.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The entry points a snap can export.
///
/// The set mirrors the handler-kind registry supplied by the host; unknown
/// export names are dropped during export validation rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    /// Request/response handler for RPC calls originating from dapps or
    /// other snaps.
    #[serde(rename = "onRpcRequest")]
    OnRpcRequest,
    /// Scheduled job trigger.
    #[serde(rename = "onCronjob")]
    OnCronjob,
    /// Post-installation hook.
    #[serde(rename = "onInstall")]
    OnInstall,
    /// Post-update hook.
    #[serde(rename = "onUpdate")]
    OnUpdate,
    /// Transaction insight handler.
    #[serde(rename = "onTransaction")]
    OnTransaction,
    /// Name resolution handler.
    #[serde(rename = "onNameLookup")]
    OnNameLookup,
    /// Keyring request handler.
    #[serde(rename = "onKeyringRequest")]
    OnKeyringRequest,
}

impl HandlerKind {
    /// All known handler kinds, in a stable order.
    pub const ALL: [HandlerKind; 7] = [
        HandlerKind::OnRpcRequest,
        HandlerKind::OnCronjob,
        HandlerKind::OnInstall,
        HandlerKind::OnUpdate,
        HandlerKind::OnTransaction,
        HandlerKind::OnNameLookup,
        HandlerKind::OnKeyringRequest,
    ];

    /// The wire name of this handler kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnRpcRequest => "onRpcRequest",
            Self::OnCronjob => "onCronjob",
            Self::OnInstall => "onInstall",
            Self::OnUpdate => "onUpdate",
            Self::OnTransaction => "onTransaction",
            Self::OnNameLookup => "onNameLookup",
            Self::OnKeyringRequest => "onKeyringRequest",
        }
    }

    /// Whether invoking this kind on a snap that does not export it is an
    /// error (`true`) or resolves to `null` (`false`).
    ///
    /// Request/response kinds are mandatory when invoked; lifecycle and
    /// event kinds are optional.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::OnRpcRequest | Self::OnKeyringRequest)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownHandlerKind {
                kind: s.to_string(),
            })
    }
}
