//! Core types used throughout the system
//!
//! These are the identifiers shared by the engine client, the trackers
//! and the workflows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Queue ID - opaque handle returned once by the engine on submission.
///
/// # Constraints:
/// - **Immutable**: Once issued, NEVER changes
/// - **Sole key**: every status query and retry addresses this handle
/// - **Never re-issued**: retries act on the same handle, a new handle
///   means a new on-chain operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Chain ID as the engine expects it in routes ("1", "1923", ...)
pub type ChainId = String;

/// Hex-encoded account or contract address
pub type Address = String;

/// Contract address the engine uses to denote the chain's native asset
pub const NATIVE_ASSET_SENTINEL: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Check whether a contract address is the native-asset sentinel (case-insensitive)
#[inline]
pub fn is_native_asset(contract: &str) -> bool {
    contract.eq_ignore_ascii_case(NATIVE_ASSET_SENTINEL)
}
