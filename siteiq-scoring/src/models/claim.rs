//! Idempotency claim result

use serde::Serialize;

/// Result of presenting an idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    /// True when another caller claimed the key first
    pub already_existed: bool,
    /// The winning caller's resource id
    pub resource_id: String,
}
