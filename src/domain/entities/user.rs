use serde::{Deserialize, Serialize};

/// The acting identity as currently known to the engine. May be absent; the
/// engine then falls back to [`CurrentUser::placeholder`] when stamping
/// author fields on optimistic entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub display_name: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Best-effort author fields for an optimistic entity created while the
    /// identity is unresolved. The server stamps the real author either way.
    pub fn placeholder() -> Self {
        Self {
            id: "unknown".to_string(),
            display_name: "Guest".to_string(),
        }
    }
}
