use serde::Serialize;

/// A stored document and the key it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub data: String,
    pub key: String,
}
