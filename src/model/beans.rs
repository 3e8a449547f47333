//! Data Engine beans: the shapes an external data engine sends to describe
//! its processes, ports, schemas and the data stores it reads and writes.

use crate::model::UpdateSemantic;
use serde::{Deserialize, Serialize};

/// The engine (external source) that publishes metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareServerCapability {
    #[serde(default)]
    pub qualified_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub engine_type: Option<String>,
    pub engine_version: Option<String>,
    pub patch_level: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(default)]
    pub qualified_name: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub formula: Option<String>,
    pub implementation_language: Option<String>,
    #[serde(default)]
    pub port_implementations: Vec<PortImplementation>,
    #[serde(default)]
    pub port_aliases: Vec<PortAlias>,
    #[serde(default)]
    pub lineage_mappings: Vec<LineageMapping>,
    #[serde(default)]
    pub parent_processes: Vec<ParentProcess>,
    #[serde(default)]
    pub update_semantic: UpdateSemantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortType {
    InIn,
    OutOut,
    InOut,
    OutIn,
    #[default]
    Other,
}

impl PortType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::InIn => "IN_IN",
            PortType::OutOut => "OUT_OUT",
            PortType::InOut => "IN_OUT",
            PortType::OutIn => "OUT_IN",
            PortType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortImplementation {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub port_type: PortType,
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub update_semantic: UpdateSemantic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAlias {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub port_type: PortType,
    /// Qualified name of the port this alias delegates to
    pub delegates_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaType {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub author: Option<String>,
    pub usage: Option<String>,
    pub encoding_standard: Option<String>,
    pub version_number: Option<String>,
    #[serde(default)]
    pub attribute_list: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub data_type: Option<String>,
    pub default_value: Option<String>,
    pub nullable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageMapping {
    #[serde(default)]
    pub source_attribute: String,
    #[serde(default)]
    pub target_attribute: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessContainmentType {
    #[default]
    Owned,
    Used,
    Other,
}

impl ProcessContainmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessContainmentType::Owned => "OWNED",
            ProcessContainmentType::Used => "USED",
            ProcessContainmentType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentProcess {
    #[serde(default)]
    pub qualified_name: String,
    #[serde(default)]
    pub process_containment_type: ProcessContainmentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlow {
    #[serde(default)]
    pub data_supplier: String,
    #[serde(default)]
    pub data_consumer: String,
    pub formula: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub database_type: Option<String>,
    pub database_version: Option<String>,
    pub database_instance: Option<String>,
    pub database_imported_from: Option<String>,
    pub database_schema: Option<DatabaseSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tables: Vec<RelationalTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalTable {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<RelationalColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalColumn {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub data_type: Option<String>,
    pub default_value: Option<String>,
    pub nullable: Option<bool>,
    pub primary_key: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub topic_type: Option<String>,
    #[serde(default)]
    pub event_types: Vec<EventType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    #[serde(default)]
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub attribute_list: Vec<Attribute>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn process_deserializes_with_defaults() {
        let process: Process = serde_json::from_value(json!({
            "qualifiedName": "etl::load_customers",
            "displayName": "Load customers",
            "portImplementations": [{
                "qualifiedName": "etl::load_customers::in",
                "portType": "IN_IN",
                "schemaType": {
                    "qualifiedName": "etl::load_customers::in::schema",
                    "attributeList": [{"qualifiedName": "etl::load_customers::in::id", "position": 0}]
                }
            }]
        }))
        .unwrap();

        assert_eq!(process.update_semantic, UpdateSemantic::Replace);
        assert!(process.port_aliases.is_empty());
        let port = &process.port_implementations[0];
        assert_eq!(port.port_type, PortType::InIn);
        assert_eq!(port.schema_type.as_ref().unwrap().attribute_list.len(), 1);
    }

    #[test]
    fn missing_qualified_name_is_left_for_validation() {
        let database: Database =
            serde_json::from_value(json!({"displayName": "Sales"})).unwrap();
        assert!(database.qualified_name.is_empty());
    }

    #[test]
    fn parent_process_defaults_to_owned() {
        let parent: ParentProcess =
            serde_json::from_value(json!({"qualifiedName": "etl::job"})).unwrap();
        assert_eq!(parent.process_containment_type, ProcessContainmentType::Owned);
    }
}
