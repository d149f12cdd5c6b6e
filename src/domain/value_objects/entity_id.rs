use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a post or reply.
///
/// `Local` carries a session-unique token assigned when an entity is created
/// optimistically; it is never persisted and never compared across sessions.
/// `Durable` carries the opaque value assigned by the remote store.
/// Reconciliation switches on the variant, never on the shape of the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Local(String),
    Durable(String),
}

impl EntityId {
    /// Mint a fresh session-unique local identifier.
    pub fn local() -> Self {
        Self::Local(uuid::Uuid::new_v4().to_string())
    }

    pub fn durable(value: impl Into<String>) -> Self {
        Self::Durable(value.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, EntityId::Local(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityId::Local(token) => token,
            EntityId::Durable(value) => value,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
