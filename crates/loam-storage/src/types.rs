//! Shared storage value types.

use serde_json::Value;

/// A document as the store persists it: the template discriminator plus
/// the raw, unvalidated field values.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Name of the template the document conforms to.
    pub template: String,
    /// Raw persisted values (frontmatter + body payload).
    pub values: Value,
}

impl StoredDocument {
    /// Creates a stored document.
    #[must_use]
    pub fn new(template: impl Into<String>, values: Value) -> Self {
        Self {
            template: template.into(),
            values,
        }
    }
}
