use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Names of the open metadata types used by the access services.
pub mod type_names {
    pub const REFERENCEABLE: &str = "Referenceable";
    pub const ASSET: &str = "Asset";
    pub const PROCESS: &str = "Process";
    pub const DATA_SET: &str = "DataSet";
    pub const DATA_STORE: &str = "DataStore";
    pub const DATABASE: &str = "Database";
    pub const DEPLOYED_DATABASE_SCHEMA: &str = "DeployedDatabaseSchema";
    pub const TOPIC: &str = "Topic";
    pub const DEPLOYED_REPORT: &str = "DeployedReport";
    pub const INFORMATION_VIEW: &str = "InformationView";
    pub const SOFTWARE_SERVER_CAPABILITY: &str = "SoftwareServerCapability";
    pub const PORT: &str = "Port";
    pub const PORT_IMPLEMENTATION: &str = "PortImplementation";
    pub const PORT_ALIAS: &str = "PortAlias";
    pub const SCHEMA_ELEMENT: &str = "SchemaElement";
    pub const SCHEMA_TYPE: &str = "SchemaType";
    pub const COMPLEX_SCHEMA_TYPE: &str = "ComplexSchemaType";
    pub const TABULAR_SCHEMA_TYPE: &str = "TabularSchemaType";
    pub const RELATIONAL_DB_SCHEMA_TYPE: &str = "RelationalDBSchemaType";
    pub const DOCUMENT_SCHEMA_TYPE: &str = "DocumentSchemaType";
    pub const EVENT_TYPE: &str = "EventType";
    pub const SCHEMA_ATTRIBUTE: &str = "SchemaAttribute";
    pub const TABULAR_COLUMN: &str = "TabularColumn";
    pub const RELATIONAL_TABLE: &str = "RelationalTable";
    pub const RELATIONAL_COLUMN: &str = "RelationalColumn";
    pub const DOCUMENT_SCHEMA_ATTRIBUTE: &str = "DocumentSchemaAttribute";
    pub const DERIVED_SCHEMA_ATTRIBUTE: &str = "DerivedSchemaAttribute";
    pub const EVENT_SCHEMA_ATTRIBUTE: &str = "EventSchemaAttribute";

    pub const PROCESS_PORT: &str = "ProcessPort";
    pub const PORT_DELEGATION: &str = "PortDelegation";
    pub const PORT_SCHEMA: &str = "PortSchema";
    pub const ASSET_SCHEMA_TYPE: &str = "AssetSchemaType";
    pub const ATTRIBUTE_FOR_SCHEMA: &str = "AttributeForSchema";
    pub const NESTED_SCHEMA_ATTRIBUTE: &str = "NestedSchemaAttribute";
    pub const DATA_CONTENT_FOR_DATA_SET: &str = "DataContentForDataSet";
    pub const LINEAGE_MAPPING: &str = "LineageMapping";
    pub const DATA_FLOW: &str = "DataFlow";
    pub const PROCESS_HIERARCHY: &str = "ProcessHierarchy";
    pub const SCHEMA_QUERY_IMPLEMENTATION: &str = "SchemaQueryImplementation";
    pub const SERVER_ASSET_USE: &str = "ServerAssetUse";
}

use type_names::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefCategory {
    Entity,
    Relationship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDef {
    pub name: String,
    pub category: TypeDefCategory,
    pub super_type: Option<String>,
    pub end1_type: Option<String>,
    pub end2_type: Option<String>,
    /// End 2 is owned by end 1 and goes away with it
    pub containment: bool,
}

impl TypeDef {
    fn entity(name: &str, super_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            category: TypeDefCategory::Entity,
            super_type: super_type.map(str::to_string),
            end1_type: None,
            end2_type: None,
            containment: false,
        }
    }

    fn relationship(name: &str, end1: &str, end2: &str, containment: bool) -> Self {
        Self {
            name: name.to_string(),
            category: TypeDefCategory::Relationship,
            super_type: None,
            end1_type: Some(end1.to_string()),
            end2_type: Some(end2.to_string()),
            containment,
        }
    }
}

/// Type mismatch reported by the registry; the repository turns it into its own error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type '{0}' is not known to the repository")]
    UnknownType(String),
    #[error("type '{name}' is not an {expected:?} type")]
    WrongCategory {
        name: String,
        expected: TypeDefCategory,
    },
    #[error("relationship '{relationship}' cannot connect '{end1}' to '{end2}'")]
    InvalidEnds {
        relationship: String,
        end1: String,
        end2: String,
    },
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::open_metadata()
    }
}

impl TypeRegistry {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// The subset of the open metadata type system the access services write.
    pub fn open_metadata() -> Self {
        let mut registry = Self::empty();
        let entities = [
            (REFERENCEABLE, None),
            (ASSET, Some(REFERENCEABLE)),
            (PROCESS, Some(ASSET)),
            (DATA_SET, Some(ASSET)),
            (DEPLOYED_DATABASE_SCHEMA, Some(DATA_SET)),
            (TOPIC, Some(DATA_SET)),
            (DEPLOYED_REPORT, Some(DATA_SET)),
            (INFORMATION_VIEW, Some(DATA_SET)),
            (DATA_STORE, Some(ASSET)),
            (DATABASE, Some(DATA_STORE)),
            (SOFTWARE_SERVER_CAPABILITY, Some(REFERENCEABLE)),
            (PORT, Some(REFERENCEABLE)),
            (PORT_IMPLEMENTATION, Some(PORT)),
            (PORT_ALIAS, Some(PORT)),
            (SCHEMA_ELEMENT, Some(REFERENCEABLE)),
            (SCHEMA_TYPE, Some(SCHEMA_ELEMENT)),
            (COMPLEX_SCHEMA_TYPE, Some(SCHEMA_TYPE)),
            (TABULAR_SCHEMA_TYPE, Some(COMPLEX_SCHEMA_TYPE)),
            (RELATIONAL_DB_SCHEMA_TYPE, Some(COMPLEX_SCHEMA_TYPE)),
            (DOCUMENT_SCHEMA_TYPE, Some(COMPLEX_SCHEMA_TYPE)),
            (EVENT_TYPE, Some(COMPLEX_SCHEMA_TYPE)),
            (SCHEMA_ATTRIBUTE, Some(SCHEMA_ELEMENT)),
            (TABULAR_COLUMN, Some(SCHEMA_ATTRIBUTE)),
            (RELATIONAL_TABLE, Some(SCHEMA_ATTRIBUTE)),
            (RELATIONAL_COLUMN, Some(SCHEMA_ATTRIBUTE)),
            (DOCUMENT_SCHEMA_ATTRIBUTE, Some(SCHEMA_ATTRIBUTE)),
            (DERIVED_SCHEMA_ATTRIBUTE, Some(SCHEMA_ATTRIBUTE)),
            (EVENT_SCHEMA_ATTRIBUTE, Some(SCHEMA_ATTRIBUTE)),
        ];
        for (name, super_type) in entities {
            registry.register(TypeDef::entity(name, super_type));
        }

        let relationships = [
            (PROCESS_PORT, PROCESS, PORT, true),
            (PORT_DELEGATION, PORT, PORT, false),
            (PORT_SCHEMA, PORT, SCHEMA_TYPE, true),
            (ASSET_SCHEMA_TYPE, ASSET, SCHEMA_TYPE, true),
            (ATTRIBUTE_FOR_SCHEMA, COMPLEX_SCHEMA_TYPE, SCHEMA_ATTRIBUTE, true),
            (NESTED_SCHEMA_ATTRIBUTE, SCHEMA_ATTRIBUTE, SCHEMA_ATTRIBUTE, true),
            (DATA_CONTENT_FOR_DATA_SET, ASSET, DATA_SET, true),
            (LINEAGE_MAPPING, SCHEMA_ELEMENT, SCHEMA_ELEMENT, false),
            (DATA_FLOW, REFERENCEABLE, REFERENCEABLE, false),
            (PROCESS_HIERARCHY, PROCESS, PROCESS, false),
            (SCHEMA_QUERY_IMPLEMENTATION, SCHEMA_ELEMENT, SCHEMA_ELEMENT, false),
            (SERVER_ASSET_USE, SOFTWARE_SERVER_CAPABILITY, ASSET, false),
        ];
        for (name, end1, end2, containment) in relationships {
            registry.register(TypeDef::relationship(name, end1, end2, containment));
        }

        registry
    }

    pub fn register(&mut self, type_def: TypeDef) {
        self.types.insert(type_def.name.clone(), type_def);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// True when `type_name` is `super_type` or inherits from it.
    pub fn is_a(&self, type_name: &str, super_type: &str) -> bool {
        let mut current = Some(type_name);
        while let Some(name) = current {
            if name == super_type {
                return true;
            }
            current = self.types.get(name).and_then(|t| t.super_type.as_deref());
        }
        false
    }

    /// `type_name` plus every entity type that inherits from it.
    pub fn subtypes_of(&self, type_name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .types
            .values()
            .filter(|t| t.category == TypeDefCategory::Entity && self.is_a(&t.name, type_name))
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Topmost entity type below Referenceable; qualified names are unique within it.
    pub fn uniqueness_root(&self, type_name: &str) -> String {
        let mut current = type_name.to_string();
        while let Some(parent) = self.types.get(&current).and_then(|t| t.super_type.clone()) {
            if parent == REFERENCEABLE {
                break;
            }
            current = parent;
        }
        current
    }

    /// Distinct types sharing the same direct supertype, like a port implementation and a port alias.
    pub fn are_siblings(&self, a: &str, b: &str) -> bool {
        let parent = |name: &str| self.types.get(name).and_then(|t| t.super_type.as_deref());
        a != b && parent(a).is_some() && parent(a) == parent(b)
    }

    pub fn validate_entity_type(&self, type_name: &str) -> Result<&TypeDef, TypeError> {
        self.validate_category(type_name, TypeDefCategory::Entity)
    }

    pub fn validate_relationship_ends(
        &self,
        relationship_type: &str,
        end1_type: &str,
        end2_type: &str,
    ) -> Result<&TypeDef, TypeError> {
        let type_def = self.validate_category(relationship_type, TypeDefCategory::Relationship)?;
        let end1_ok = type_def
            .end1_type
            .as_deref()
            .map_or(true, |expected| self.is_a(end1_type, expected));
        let end2_ok = type_def
            .end2_type
            .as_deref()
            .map_or(true, |expected| self.is_a(end2_type, expected));
        if end1_ok && end2_ok {
            Ok(type_def)
        } else {
            Err(TypeError::InvalidEnds {
                relationship: relationship_type.to_string(),
                end1: end1_type.to_string(),
                end2: end2_type.to_string(),
            })
        }
    }

    pub fn containment_relationships(&self) -> Vec<&TypeDef> {
        self.types
            .values()
            .filter(|t| t.category == TypeDefCategory::Relationship && t.containment)
            .collect()
    }

    fn validate_category(
        &self,
        type_name: &str,
        expected: TypeDefCategory,
    ) -> Result<&TypeDef, TypeError> {
        let type_def = self
            .types
            .get(type_name)
            .ok_or_else(|| TypeError::UnknownType(type_name.to_string()))?;
        if type_def.category != expected {
            return Err(TypeError::WrongCategory {
                name: type_name.to_string(),
                expected,
            });
        }
        Ok(type_def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inheritance_walks_up_to_referenceable() {
        let registry = TypeRegistry::open_metadata();
        assert!(registry.is_a(RELATIONAL_COLUMN, SCHEMA_ELEMENT));
        assert!(registry.is_a(DATABASE, ASSET));
        assert!(!registry.is_a(PORT_ALIAS, ASSET));
    }

    #[test]
    fn subtypes_include_the_type_itself() {
        let registry = TypeRegistry::open_metadata();
        let ports = registry.subtypes_of(PORT);
        assert_eq!(ports, vec![PORT, PORT_ALIAS, PORT_IMPLEMENTATION]);
    }

    #[test]
    fn uniqueness_root_stops_below_referenceable() {
        let registry = TypeRegistry::open_metadata();
        assert_eq!(registry.uniqueness_root(PORT_ALIAS), PORT);
        assert_eq!(registry.uniqueness_root(DATABASE), ASSET);
        assert_eq!(registry.uniqueness_root(SOFTWARE_SERVER_CAPABILITY), SOFTWARE_SERVER_CAPABILITY);
    }

    #[test]
    fn siblings_share_a_direct_supertype() {
        let registry = TypeRegistry::open_metadata();
        assert!(registry.are_siblings(PORT_IMPLEMENTATION, PORT_ALIAS));
        assert!(registry.are_siblings(DOCUMENT_SCHEMA_ATTRIBUTE, DERIVED_SCHEMA_ATTRIBUTE));
        assert!(!registry.are_siblings(PORT_ALIAS, PORT_ALIAS));
        assert!(!registry.are_siblings(PROCESS, DATABASE));
    }

    #[test]
    fn relationship_ends_respect_inheritance() {
        let registry = TypeRegistry::open_metadata();
        assert!(registry
            .validate_relationship_ends(PROCESS_PORT, PROCESS, PORT_IMPLEMENTATION)
            .is_ok());
        assert!(matches!(
            registry.validate_relationship_ends(PROCESS_PORT, PORT_ALIAS, PROCESS),
            Err(TypeError::InvalidEnds { .. })
        ));
        assert!(matches!(
            registry.validate_relationship_ends(PROCESS, PROCESS, PROCESS),
            Err(TypeError::WrongCategory { .. })
        ));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let registry = TypeRegistry::open_metadata();
        assert_eq!(
            registry.validate_entity_type("Spreadsheet"),
            Err(TypeError::UnknownType("Spreadsheet".to_string()))
        );
    }
}
