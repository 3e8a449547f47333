use crate::model::{EntityDetail, InstanceProperties, InstanceStatus, Relationship, TypeRegistry};
use crate::store::RepositoryResult;

/// The generic entity-relationship store the access services write to.
///
/// Every backend enforces the same invariants: types must exist and be of
/// the right category, relationship ends must be live entities of the
/// declared end types, and a qualified name is unique among the non-deleted
/// entities of one type family.
#[async_trait::async_trait]
pub trait MetadataRepository: Send + Sync {
    fn type_registry(&self) -> &TypeRegistry;

    /// Whether hard deletes (purge) are allowed
    fn supports_purge(&self) -> bool;

    async fn add_entity(
        &self,
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        status: InstanceStatus,
        metadata_collection_name: Option<String>,
    ) -> RepositoryResult<EntityDetail>;

    /// Replace the entity's properties wholesale
    async fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<EntityDetail>;

    async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &str,
        status: InstanceStatus,
    ) -> RepositoryResult<EntityDetail>;

    /// Soft-deleted entities are returned too
    async fn get_entity(&self, guid: &str) -> RepositoryResult<Option<EntityDetail>>;

    /// Exact-match search over `type_name` and its subtypes, soft-deleted entities excluded
    async fn find_entities_by_property(
        &self,
        type_name: &str,
        property_name: &str,
        value: &serde_json::Value,
    ) -> RepositoryResult<Vec<EntityDetail>>;

    async fn add_relationship(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship>;

    async fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &str,
        properties: InstanceProperties,
    ) -> RepositoryResult<Relationship>;

    /// Live relationships touching `guid`, optionally restricted to one type
    async fn get_relationships_for_entity(
        &self,
        guid: &str,
        type_name: Option<&str>,
    ) -> RepositoryResult<Vec<Relationship>>;

    /// Soft delete; the entity's relationships are soft-deleted with it
    async fn delete_entity(&self, user_id: &str, guid: &str) -> RepositoryResult<EntityDetail>;

    /// Remove a soft-deleted entity and every relationship attached to it
    async fn purge_entity(&self, guid: &str) -> RepositoryResult<()>;

    async fn delete_relationship(&self, user_id: &str, guid: &str)
        -> RepositoryResult<Relationship>;

    async fn purge_relationship(&self, guid: &str) -> RepositoryResult<()>;
}
