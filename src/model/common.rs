use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Guid = String;

/// Property name carrying the business key of every Referenceable.
pub const QUALIFIED_NAME: &str = "qualifiedName";

pub fn generate_guid() -> Guid {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateSemantic {
    /// Children missing from the new payload are removed
    #[default]
    Replace,
    /// Children are only ever added
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteSemantic {
    /// Mark as deleted, keep in the repository
    #[default]
    Soft,
    /// Delete and purge
    Hard,
}

/// Outcome of a find-or-create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Build a child qualified name from its parent's qualified name.
pub fn child_qualified_name(parent_qualified_name: &str, name: &str) -> String {
    format!("{}::{}", parent_qualified_name, name)
}
