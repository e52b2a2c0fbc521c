//! Composite cache key.

use std::fmt;

/// Identity of a cached document: the conversation it was requested in and
/// the document URL.
///
/// Both parts are kept as separate fields, so no choice of separator can make
/// two different pairs collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    conversation_id: String,
    document_url: String,
}

impl DocumentKey {
    /// Create a key for a document within a conversation.
    pub fn new(conversation_id: impl Into<String>, document_url: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            document_url: document_url.into(),
        }
    }

    /// The conversation this entry is scoped to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The document URL.
    pub fn document_url(&self) -> &str {
        &self.document_url
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.conversation_id, self.document_url)
    }
}
