use crate::model::{generate_guid, Guid, QUALIFIED_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property bag attached to entities and relationships
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceProperties(BTreeMap<String, serde_json::Value>);

impl InstanceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. `None` and empty strings are skipped so that
    /// optional bean fields never end up as explicit nulls.
    pub fn with<V: Into<serde_json::Value>>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            let value = value.into();
            let empty = matches!(&value, serde_json::Value::String(s) if s.is_empty());
            if !value.is_null() && !empty {
                self.0.insert(name.to_string(), value);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.string(QUALIFIED_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Draft,
    Active,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Draft => "DRAFT",
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Deleted => "DELETED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(InstanceStatus::Draft),
            "ACTIVE" => Some(InstanceStatus::Active),
            "DELETED" => Some(InstanceStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetail {
    pub guid: Guid,
    pub type_name: String,
    pub status: InstanceStatus,
    pub properties: InstanceProperties,
    /// Name of the metadata collection (engine or local server) that owns this entity
    pub metadata_collection_name: Option<String>,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
    pub version: i64,
}

impl EntityDetail {
    pub fn new(
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        status: InstanceStatus,
        metadata_collection_name: Option<String>,
    ) -> Self {
        Self {
            guid: generate_guid(),
            type_name: type_name.to_string(),
            status,
            properties,
            metadata_collection_name,
            created_by: user_id.to_string(),
            updated_by: None,
            create_time: Utc::now(),
            update_time: None,
            version: 1,
        }
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.properties.qualified_name()
    }

    pub fn is_deleted(&self) -> bool {
        self.status == InstanceStatus::Deleted
    }

    pub fn touch(&mut self, user_id: &str) {
        self.updated_by = Some(user_id.to_string());
        self.update_time = Some(Utc::now());
        self.version += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub guid: Guid,
    pub type_name: String,
    pub end1_guid: Guid,
    pub end2_guid: Guid,
    pub status: InstanceStatus,
    pub properties: InstanceProperties,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Relationship {
    pub fn new(
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: InstanceProperties,
    ) -> Self {
        Self {
            guid: generate_guid(),
            type_name: type_name.to_string(),
            end1_guid: end1_guid.to_string(),
            end2_guid: end2_guid.to_string(),
            status: InstanceStatus::Active,
            properties,
            created_by: user_id.to_string(),
            updated_by: None,
            create_time: Utc::now(),
            update_time: None,
            version: 1,
        }
    }

    /// The GUID at the opposite end from `guid`, if `guid` is one of the ends.
    pub fn other_end(&self, guid: &str) -> Option<&str> {
        if self.end1_guid == guid {
            Some(&self.end2_guid)
        } else if self.end2_guid == guid {
            Some(&self.end1_guid)
        } else {
            None
        }
    }

    pub fn connects(&self, end1_guid: &str, end2_guid: &str) -> bool {
        self.end1_guid == end1_guid && self.end2_guid == end2_guid
    }

    pub fn touch(&mut self, user_id: &str) {
        self.updated_by = Some(user_id.to_string());
        self.update_time = Some(Utc::now());
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_skips_missing_and_empty_values() {
        let props = InstanceProperties::new()
            .with(QUALIFIED_NAME, Some("db::sales"))
            .with("description", None::<String>)
            .with("displayName", Some(""))
            .with("position", Some(3));

        assert_eq!(props.qualified_name(), Some("db::sales"));
        assert_eq!(props.get("position").and_then(|v| v.as_i64()), Some(3));
        assert!(props.get("description").is_none());
        assert!(props.get("displayName").is_none());
    }

    #[test]
    fn other_end_resolves_both_directions() {
        let rel = Relationship::new("user", "ProcessPort", "a", "b", InstanceProperties::new());
        assert_eq!(rel.other_end("a"), Some("b"));
        assert_eq!(rel.other_end("b"), Some("a"));
        assert_eq!(rel.other_end("c"), None);
    }

    #[test]
    fn touch_bumps_version() {
        let mut entity = EntityDetail::new(
            "alice",
            "Process",
            InstanceProperties::new(),
            InstanceStatus::Draft,
            None,
        );
        entity.touch("bob");
        assert_eq!(entity.version, 2);
        assert_eq!(entity.updated_by.as_deref(), Some("bob"));
    }
}
