use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{
    EntityDetail, Guid, InstanceProperties, InstanceStatus, Relationship, TypeRegistry,
};
use crate::store::{MetadataRepository, RepositoryError, RepositoryResult};

#[derive(Debug, Default)]
struct Instances {
    entities: HashMap<Guid, EntityDetail>,
    relationships: HashMap<Guid, Relationship>,
}

impl Instances {
    fn live_entity(&self, guid: &str) -> RepositoryResult<&EntityDetail> {
        self.entities
            .get(guid)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))
    }

    fn check_unique(
        &self,
        registry: &TypeRegistry,
        type_name: &str,
        properties: &InstanceProperties,
        ignore_guid: Option<&str>,
    ) -> RepositoryResult<()> {
        let Some(qualified_name) = properties.qualified_name() else {
            return Ok(());
        };
        let root = registry.uniqueness_root(type_name);
        let clash = self.entities.values().find(|e| {
            !e.is_deleted()
                && Some(e.guid.as_str()) != ignore_guid
                && e.qualified_name() == Some(qualified_name)
                && registry.uniqueness_root(&e.type_name) == root
        });
        if let Some(existing) = clash {
            return Err(RepositoryError::DuplicateQualifiedName {
                type_name: existing.type_name.clone(),
                qualified_name: qualified_name.to_string(),
            });
        }
        Ok(())
    }
}

/// Repository kept entirely in process memory.
#[derive(Debug)]
pub struct InMemoryRepository {
    registry: TypeRegistry,
    purge_supported: bool,
    instances: RwLock<Instances>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new(TypeRegistry::open_metadata(), true)
    }
}

impl InMemoryRepository {
    pub fn new(registry: TypeRegistry, purge_supported: bool) -> Self {
        Self {
            registry,
            purge_supported,
            instances: RwLock::new(Instances::default()),
        }
    }

    /// Number of live entities, handy for assertions
    pub fn active_entity_count(&self) -> usize {
        self.instances
            .read()
            .entities
            .values()
            .filter(|e| !e.is_deleted())
            .count()
    }

    pub fn stored_entity_count(&self) -> usize {
        self.instances.read().entities.len()
    }
}

#[async_trait::async_trait]
impl MetadataRepository for InMemoryRepository {
    fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn supports_purge(&self) -> bool {
        self.purge_supported
    }

    async fn add_entity(
        &self,
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        status: InstanceStatus,
        metadata_collection_name: Option<String>,
    ) -> RepositoryResult<EntityDetail> {
        self.registry.validate_entity_type(type_name)?;
        let mut instances = self.instances.write();
        instances.check_unique(&self.registry, type_name, &properties, None)?;

        let entity = EntityDetail::new(user_id, type_name, properties, status, metadata_collection_name);
        instances.entities.insert(entity.guid.clone(), entity.clone());
        Ok(entity)
    }

    async fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail> {
        let mut instances = self.instances.write();
        let type_name = instances.live_entity(guid)?.type_name.clone();
        instances.check_unique(&self.registry, &type_name, &properties, Some(guid))?;

        let entity = instances
            .entities
            .get_mut(guid)
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        entity.properties = properties;
        entity.touch(user_id);
        Ok(entity.clone())
    }

    async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail> {
        let mut instances = self.instances.write();
        instances.live_entity(guid)?;
        let entity = instances
            .entities
            .get_mut(guid)
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        if entity.status != status {
            entity.status = status;
            entity.touch(user_id);
        }
        Ok(entity.clone())
    }

    async fn get_entity(&self, guid: &str) -> RepositoryResult<Option<EntityDetail>> {
        Ok(self.instances.read().entities.get(guid).cloned())
    }

    async fn find_entities_by_property(
        &self,
        type_name: &str,
        property_name: &str,
        value: &serde_json::Value,
    ) -> RepositoryResult<Vec<EntityDetail>> {
        self.registry.validate_entity_type(type_name)?;
        let instances = self.instances.read();
        let mut found: Vec<EntityDetail> = instances
            .entities
            .values()
            .filter(|e| {
                !e.is_deleted()
                    && self.registry.is_a(&e.type_name, type_name)
                    && e.properties.get(property_name) == Some(value)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.create_time.cmp(&b.create_time));
        Ok(found)
    }

    async fn add_relationship(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        let mut instances = self.instances.write();
        let end1_type = instances.live_entity(end1_guid)?.type_name.clone();
        let end2_type = instances.live_entity(end2_guid)?.type_name.clone();
        self.registry
            .validate_relationship_ends(type_name, &end1_type, &end2_type)?;

        let relationship = Relationship::new(user_id, type_name, end1_guid, end2_guid, properties);
        instances
            .relationships
            .insert(relationship.guid.clone(), relationship.clone());
        Ok(relationship)
    }

    async fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship> {
        let mut instances = self.instances.write();
        let relationship = instances
            .relationships
            .get_mut(guid)
            .filter(|r| r.status != InstanceStatus::Deleted)
            .ok_or_else(|| RepositoryError::RelationshipNotKnown(guid.to_string()))?;
        relationship.properties = properties;
        relationship.touch(user_id);
        Ok(relationship.clone())
    }

    async fn get_relationships_for_entity(
        &self,
        guid: &str,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<Relationship>> {
        let instances = self.instances.read();
        if !instances.entities.contains_key(guid) {
            return Err(RepositoryError::EntityNotKnown(guid.to_string()));
        }
        let mut found: Vec<Relationship> = instances
            .relationships
            .values()
            .filter(|r| {
                r.status != InstanceStatus::Deleted
                    && r.other_end(guid).is_some()
                    && type_name.map_or(true, |t| r.type_name == t)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.create_time.cmp(&b.create_time));
        Ok(found)
    }

    async fn delete_entity(&self, user_id: &str, guid: &str) -> RepositoryResult<EntityDetail> {
        let mut instances = self.instances.write();
        instances.live_entity(guid)?;

        for relationship in instances.relationships.values_mut() {
            if relationship.other_end(guid).is_some()
                && relationship.status != InstanceStatus::Deleted
            {
                relationship.status = InstanceStatus::Deleted;
                relationship.touch(user_id);
            }
        }

        let entity = instances
            .entities
            .get_mut(guid)
            .ok_or_else(|| RepositoryError::EntityNotKnown(guid.to_string()))?;
        entity.status = InstanceStatus::Deleted;
        entity.touch(user_id);
        Ok(entity.clone())
    }

    async fn purge_entity(&self, guid: &str) -> RepositoryResult<()> {
        if !self.purge_supported {
            return Err(RepositoryError::FunctionNotSupported("purge_entity".to_string()));
        }
        let mut instances = self.instances.write();
        match instances.entities.get(guid) {
            None => return Err(RepositoryError::EntityNotKnown(guid.to_string())),
            Some(entity) if !entity.is_deleted() => {
                return Err(RepositoryError::NotDeleted(guid.to_string()))
            }
            Some(_) => {}
        }
        instances.entities.remove(guid);
        instances
            .relationships
            .retain(|_, r| r.other_end(guid).is_none());
        Ok(())
    }

    async fn delete_relationship(
        &self,
        user_id: &str,
        guid: &str,
    ) -> RepositoryResult<Relationship> {
        let mut instances = self.instances.write();
        let relationship = instances
            .relationships
            .get_mut(guid)
            .filter(|r| r.status != InstanceStatus::Deleted)
            .ok_or_else(|| RepositoryError::RelationshipNotKnown(guid.to_string()))?;
        relationship.status = InstanceStatus::Deleted;
        relationship.touch(user_id);
        Ok(relationship.clone())
    }

    async fn purge_relationship(&self, guid: &str) -> RepositoryResult<()> {
        if !self.purge_supported {
            return Err(RepositoryError::FunctionNotSupported(
                "purge_relationship".to_string(),
            ));
        }
        let mut instances = self.instances.write();
        match instances.relationships.get(guid) {
            None => return Err(RepositoryError::RelationshipNotKnown(guid.to_string())),
            Some(r) if r.status != InstanceStatus::Deleted => {
                return Err(RepositoryError::NotDeleted(guid.to_string()))
            }
            Some(_) => {}
        }
        instances.relationships.remove(guid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::type_names::*;
    use crate::model::QUALIFIED_NAME;
    use serde_json::json;

    fn named(qn: &str) -> InstanceProperties {
        InstanceProperties::new().with(QUALIFIED_NAME, Some(qn))
    }

    #[tokio::test]
    async fn qualified_names_are_unique_within_a_type_family() {
        let repo = InMemoryRepository::default();
        repo.add_entity("u", PORT_IMPLEMENTATION, named("p1"), InstanceStatus::Active, None)
            .await
            .unwrap();

        let err = repo
            .add_entity("u", PORT_ALIAS, named("p1"), InstanceStatus::Active, None)
            .await
            .unwrap_err();
        match err {
            RepositoryError::DuplicateQualifiedName { type_name, .. } => {
                assert_eq!(type_name, PORT_IMPLEMENTATION)
            }
            other => panic!("expected a duplicate name, got {:?}", other),
        }

        // different family, same name is fine
        repo.add_entity("u", PROCESS, named("p1"), InstanceStatus::Active, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn find_includes_subtypes_and_skips_deleted() {
        let repo = InMemoryRepository::default();
        let column = repo
            .add_entity("u", RELATIONAL_COLUMN, named("c1"), InstanceStatus::Active, None)
            .await
            .unwrap();

        let found = repo
            .find_entities_by_property(SCHEMA_ATTRIBUTE, QUALIFIED_NAME, &json!("c1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        repo.delete_entity("u", &column.guid).await.unwrap();
        let found = repo
            .find_entities_by_property(SCHEMA_ATTRIBUTE, QUALIFIED_NAME, &json!("c1"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn relationship_ends_are_type_checked() {
        let repo = InMemoryRepository::default();
        let process = repo
            .add_entity("u", PROCESS, named("proc"), InstanceStatus::Active, None)
            .await
            .unwrap();
        let column = repo
            .add_entity("u", TABULAR_COLUMN, named("col"), InstanceStatus::Active, None)
            .await
            .unwrap();

        let err = repo
            .add_relationship("u", PROCESS_PORT, &process.guid, &column.guid, InstanceProperties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Type(_)));
    }

    #[tokio::test]
    async fn purge_requires_soft_delete_first() {
        let repo = InMemoryRepository::default();
        let process = repo
            .add_entity("u", PROCESS, named("proc"), InstanceStatus::Active, None)
            .await
            .unwrap();

        let err = repo.purge_entity(&process.guid).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotDeleted(_)));

        repo.delete_entity("u", &process.guid).await.unwrap();
        repo.purge_entity(&process.guid).await.unwrap();
        assert_eq!(repo.stored_entity_count(), 0);
    }

    #[tokio::test]
    async fn purge_can_be_disabled() {
        let repo = InMemoryRepository::new(TypeRegistry::open_metadata(), false);
        let process = repo
            .add_entity("u", PROCESS, named("proc"), InstanceStatus::Active, None)
            .await
            .unwrap();
        repo.delete_entity("u", &process.guid).await.unwrap();

        let err = repo.purge_entity(&process.guid).await.unwrap_err();
        assert!(matches!(err, RepositoryError::FunctionNotSupported(_)));
    }

    #[tokio::test]
    async fn soft_delete_hides_relationships() {
        let repo = InMemoryRepository::default();
        let process = repo
            .add_entity("u", PROCESS, named("proc"), InstanceStatus::Active, None)
            .await
            .unwrap();
        let port = repo
            .add_entity("u", PORT_IMPLEMENTATION, named("port"), InstanceStatus::Active, None)
            .await
            .unwrap();
        repo.add_relationship("u", PROCESS_PORT, &process.guid, &port.guid, InstanceProperties::new())
            .await
            .unwrap();

        repo.delete_entity("u", &port.guid).await.unwrap();
        let remaining = repo
            .get_relationships_for_entity(&process.guid, Some(PROCESS_PORT))
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }
}
