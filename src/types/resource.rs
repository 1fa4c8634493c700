use serde::{Deserialize, Serialize};

/// A document or knowledge-base entry the user attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Location of the resource, e.g. `rag://dataset/123`.
    pub uri: String,
    /// Display title.
    pub title: String,
}

impl Resource {
    /// Creates a new resource reference.
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}
