use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{OmasError, OmasResult};
use crate::model::{
    DeleteSemantic, EntityDetail, Guid, InstanceProperties, InstanceStatus, Relationship,
    UpdateSemantic, UpsertOutcome, QUALIFIED_NAME,
};
use crate::store::{MetadataRepository, RepositoryError};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Find-or-create plumbing shared by every handler.
pub struct RepositoryHelper<R> {
    repository: Arc<R>,
    local_metadata_collection: Option<Arc<str>>,
}

impl<R> Clone for RepositoryHelper<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            local_metadata_collection: self.local_metadata_collection.clone(),
        }
    }
}

impl<R: MetadataRepository + 'static> RepositoryHelper<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            local_metadata_collection: None,
        }
    }

    /// Collection name stamped on entities that arrive without an external source.
    pub fn with_local_metadata_collection(mut self, name: &str) -> Self {
        self.local_metadata_collection = Some(Arc::from(name));
        self
    }

    /// Provenance for a new entity: the publishing engine, else the local server.
    pub fn metadata_collection<'a>(&'a self, external_source_name: Option<&'a str>) -> Option<&'a str> {
        external_source_name
            .filter(|s| !s.is_empty())
            .or(self.local_metadata_collection.as_deref())
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn get_entity(&self, guid: &str) -> OmasResult<Option<EntityDetail>> {
        Ok(self.repository.get_entity(guid).await?)
    }

    /// Look up the live entity of `type_name` (or a subtype) carrying `qualified_name`.
    pub async fn find_entity_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> OmasResult<Option<EntityDetail>> {
        let mut found = self
            .repository
            .find_entities_by_property(
                type_name,
                QUALIFIED_NAME,
                &serde_json::Value::String(qualified_name.to_string()),
            )
            .await?;

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            n => Err(OmasError::PropertyServer(format!(
                "{} {} entities share the qualified name '{}'",
                n, type_name, qualified_name
            ))),
        }
    }

    pub async fn find_guid_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> OmasResult<Option<Guid>> {
        Ok(self
            .find_entity_by_qualified_name(type_name, qualified_name)
            .await?
            .map(|e| e.guid))
    }

    /// Like `find_entity_by_qualified_name` but a missing entity is the caller's mistake.
    pub async fn require_entity_by_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &str,
        parameter: &str,
    ) -> OmasResult<EntityDetail> {
        self.find_entity_by_qualified_name(type_name, qualified_name)
            .await?
            .ok_or_else(|| {
                OmasError::invalid_parameter(
                    parameter,
                    format!("no {} with qualified name '{}'", type_name, qualified_name),
                )
            })
    }

    /// Resolve a delete target given either its GUID or its qualified name,
    /// checking that it belongs to `type_name`.
    pub async fn resolve_target(
        &self,
        type_name: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
    ) -> OmasResult<EntityDetail> {
        let entity = match (guid, qualified_name) {
            (Some(guid), _) if !guid.is_empty() => self
                .repository
                .get_entity(guid)
                .await?
                .filter(|e| !e.is_deleted())
                .ok_or_else(|| OmasError::not_found(type_name, format!("guid {}", guid)))?,
            (_, Some(qn)) if !qn.is_empty() => self
                .find_entity_by_qualified_name(type_name, qn)
                .await?
                .ok_or_else(|| {
                    OmasError::not_found(type_name, format!("qualified name '{}'", qn))
                })?,
            _ => {
                return Err(OmasError::invalid_parameter(
                    "guid",
                    "either a guid or a qualifiedName is required",
                ))
            }
        };

        if !self.repository.type_registry().is_a(&entity.type_name, type_name) {
            return Err(OmasError::invalid_parameter(
                "guid",
                format!("{} is a {}, not a {}", entity.guid, entity.type_name, type_name),
            ));
        }
        Ok(entity)
    }

    /// Create the entity if its qualified name is unknown, otherwise bring its
    /// properties in line with `properties`.
    pub async fn upsert_entity(
        &self,
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        metadata_collection_name: Option<&str>,
    ) -> OmasResult<(Guid, UpsertOutcome)> {
        self.upsert_entity_with_status(
            user_id,
            type_name,
            properties,
            InstanceStatus::Active,
            metadata_collection_name,
        )
        .await
    }

    /// `initial_status` only applies when the entity is created.
    pub async fn upsert_entity_with_status(
        &self,
        user_id: &str,
        type_name: &str,
        properties: InstanceProperties,
        initial_status: InstanceStatus,
        metadata_collection_name: Option<&str>,
    ) -> OmasResult<(Guid, UpsertOutcome)> {
        let qualified_name = properties
            .qualified_name()
            .filter(|qn| !qn.is_empty())
            .ok_or_else(|| {
                OmasError::invalid_parameter(QUALIFIED_NAME, format!("a {} needs a qualified name", type_name))
            })?
            .to_string();

        if let Some(existing) = self
            .find_entity_by_qualified_name(type_name, &qualified_name)
            .await?
        {
            return self.update_if_changed(user_id, existing, properties).await;
        }
        self.release_name_held_by_sibling(user_id, type_name, &qualified_name)
            .await?;

        match self
            .repository
            .add_entity(
                user_id,
                type_name,
                properties.clone(),
                initial_status,
                metadata_collection_name.map(str::to_string),
            )
            .await
        {
            Ok(entity) => {
                log::debug!("Created {} {} ({})", type_name, qualified_name, entity.guid);
                Ok((entity.guid, UpsertOutcome::Created))
            }
            Err(duplicate @ RepositoryError::DuplicateQualifiedName { .. }) => {
                // a concurrent create won the race
                match self
                    .find_entity_by_qualified_name(type_name, &qualified_name)
                    .await?
                {
                    Some(existing) => self.update_if_changed(user_id, existing, properties).await,
                    None => Err(duplicate.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A resent element may keep its qualified name but change kind, such as a
    /// report section turned column. The old sibling-typed entity is soft-deleted
    /// so the new one can take the name; any other holder of the name is a conflict.
    async fn release_name_held_by_sibling(
        &self,
        user_id: &str,
        type_name: &str,
        qualified_name: &str,
    ) -> OmasResult<()> {
        let family = self.repository.type_registry().uniqueness_root(type_name);
        let Some(holder) = self
            .find_entity_by_qualified_name(&family, qualified_name)
            .await?
        else {
            return Ok(());
        };

        if !self
            .repository
            .type_registry()
            .are_siblings(&holder.type_name, type_name)
        {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                format!(
                    "'{}' already names a {} and cannot be reused for a {}",
                    qualified_name, holder.type_name, type_name
                ),
            ));
        }
        log::info!(
            "Replacing {} {} ({}) with a {}",
            holder.type_name,
            qualified_name,
            holder.guid,
            type_name
        );
        self.remove_entity(user_id, &holder.guid, DeleteSemantic::Soft)
            .await
    }

    async fn update_if_changed(
        &self,
        user_id: &str,
        existing: EntityDetail,
        properties: InstanceProperties,
    ) -> OmasResult<(Guid, UpsertOutcome)> {
        if existing.properties == properties {
            return Ok((existing.guid, UpsertOutcome::Unchanged));
        }
        let updated = self
            .repository
            .update_entity_properties(user_id, &existing.guid, properties)
            .await?;
        log::debug!("Updated {} {}", updated.type_name, updated.guid);
        Ok((updated.guid, UpsertOutcome::Updated))
    }

    pub async fn set_status(
        &self,
        user_id: &str,
        guid: &str,
        status: InstanceStatus,
    ) -> OmasResult<()> {
        self.repository
            .update_entity_status(user_id, guid, status)
            .await?;
        Ok(())
    }

    /// Create the relationship unless one of the same type already joins the two ends.
    pub async fn upsert_relationship(
        &self,
        user_id: &str,
        type_name: &str,
        end1_guid: &str,
        end2_guid: &str,
        properties: InstanceProperties,
    ) -> OmasResult<Guid> {
        let existing = self
            .repository
            .get_relationships_for_entity(end1_guid, Some(type_name))
            .await?
            .into_iter()
            .find(|r| r.connects(end1_guid, end2_guid));

        match existing {
            Some(relationship) if relationship.properties == properties => Ok(relationship.guid),
            Some(relationship) => {
                let updated = self
                    .repository
                    .update_relationship_properties(user_id, &relationship.guid, properties)
                    .await?;
                Ok(updated.guid)
            }
            None => {
                let relationship = self
                    .repository
                    .add_relationship(user_id, type_name, end1_guid, end2_guid, properties)
                    .await?;
                log::debug!(
                    "Linked {} -[{}]-> {}",
                    end1_guid,
                    type_name,
                    end2_guid
                );
                Ok(relationship.guid)
            }
        }
    }

    /// Relationships of `type_name` where `guid` is end 1.
    pub async fn outgoing(&self, guid: &str, type_name: &str) -> OmasResult<Vec<Relationship>> {
        Ok(self
            .repository
            .get_relationships_for_entity(guid, Some(type_name))
            .await?
            .into_iter()
            .filter(|r| r.end1_guid == guid)
            .collect())
    }

    /// Entities at the far end of every `type_name` relationship touching `guid`.
    pub async fn related_entities(
        &self,
        guid: &str,
        type_name: &str,
    ) -> OmasResult<Vec<EntityDetail>> {
        let relationships = self
            .repository
            .get_relationships_for_entity(guid, Some(type_name))
            .await?;
        let mut related = Vec::with_capacity(relationships.len());
        for relationship in relationships {
            if let Some(other) = relationship.other_end(guid) {
                if let Some(entity) = self.repository.get_entity(other).await? {
                    related.push(entity);
                }
            }
        }
        Ok(related)
    }

    /// Under `Replace`, remove every child reached from `parent_guid` over
    /// `relationship_type` whose GUID is not in `keep`.
    pub async fn reconcile_children(
        &self,
        user_id: &str,
        parent_guid: &str,
        relationship_type: &str,
        keep: &HashSet<Guid>,
        update_semantic: UpdateSemantic,
        delete_semantic: DeleteSemantic,
    ) -> OmasResult<Vec<Guid>> {
        if update_semantic == UpdateSemantic::Append {
            return Ok(Vec::new());
        }

        let stale: Vec<Guid> = self
            .outgoing(parent_guid, relationship_type)
            .await?
            .into_iter()
            .map(|r| r.end2_guid)
            .filter(|guid| !keep.contains(guid))
            .collect();

        for guid in &stale {
            log::info!(
                "Removing {} no longer listed under {} ({})",
                guid,
                parent_guid,
                relationship_type
            );
            self.remove_entity(user_id, guid, delete_semantic).await?;
        }
        Ok(stale)
    }

    /// Delete an entity together with everything it owns through containment relationships.
    pub async fn remove_entity(
        &self,
        user_id: &str,
        guid: &str,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        if semantic == DeleteSemantic::Hard && !self.repository.supports_purge() {
            return Err(OmasError::FunctionNotSupported(
                "hard delete is not supported by this repository".to_string(),
            ));
        }
        self.remove_tree(user_id, guid.to_string(), semantic).await
    }

    fn remove_tree<'a>(
        &'a self,
        user_id: &'a str,
        guid: Guid,
        semantic: DeleteSemantic,
    ) -> BoxFuture<'a, OmasResult<()>> {
        Box::pin(async move {
            let entity = self
                .repository
                .get_entity(&guid)
                .await?
                .ok_or_else(|| OmasError::invalid_parameter("guid", format!("entity {} is not known", guid)))?;

            if !entity.is_deleted() {
                let owned: Vec<Guid> = {
                    let registry = self.repository.type_registry();
                    self.repository
                        .get_relationships_for_entity(&guid, None)
                        .await?
                        .into_iter()
                        .filter(|r| {
                            r.end1_guid == guid
                                && registry.get(&r.type_name).map_or(false, |t| t.containment)
                        })
                        .map(|r| r.end2_guid)
                        .collect()
                };
                for child in owned {
                    self.remove_tree(user_id, child, semantic).await?;
                }
                self.repository.delete_entity(user_id, &guid).await?;
            }

            if semantic == DeleteSemantic::Hard {
                self.repository.purge_entity(&guid).await?;
            }
            log::debug!("Removed {} {} ({:?})", entity.type_name, guid, semantic);
            Ok(())
        })
    }

    pub async fn remove_relationship(
        &self,
        user_id: &str,
        guid: &str,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        self.repository.delete_relationship(user_id, guid).await?;
        if semantic == DeleteSemantic::Hard {
            self.repository.purge_relationship(guid).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::type_names::*;
    use crate::store::InMemoryRepository;

    fn helper() -> RepositoryHelper<InMemoryRepository> {
        RepositoryHelper::new(Arc::new(InMemoryRepository::default()))
    }

    fn named(qn: &str) -> InstanceProperties {
        InstanceProperties::new().with(QUALIFIED_NAME, Some(qn))
    }

    #[tokio::test]
    async fn upserting_same_qualified_name_twice_does_not_duplicate() {
        let helper = helper();
        let (first, outcome) = helper
            .upsert_entity("u", PROCESS, named("etl::job"), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let (second, outcome) = helper
            .upsert_entity("u", PROCESS, named("etl::job"), None)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(helper.repository().active_entity_count(), 1);

        let (third, outcome) = helper
            .upsert_entity(
                "u",
                PROCESS,
                named("etl::job").with("description", Some("nightly")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(first, third);
        assert_eq!(outcome, UpsertOutcome::Updated);
    }

    #[tokio::test]
    async fn upsert_requires_a_qualified_name() {
        let err = helper()
            .upsert_entity("u", PROCESS, InstanceProperties::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn relationships_are_reused() {
        let helper = helper();
        let (process, _) = helper.upsert_entity("u", PROCESS, named("p"), None).await.unwrap();
        let (port, _) = helper
            .upsert_entity("u", PORT_IMPLEMENTATION, named("p::in"), None)
            .await
            .unwrap();

        let first = helper
            .upsert_relationship("u", PROCESS_PORT, &process, &port, InstanceProperties::new())
            .await
            .unwrap();
        let second = helper
            .upsert_relationship("u", PROCESS_PORT, &process, &port, InstanceProperties::new())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(helper.outgoing(&process, PROCESS_PORT).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_removes_children_that_are_not_kept() {
        let helper = helper();
        let (process, _) = helper.upsert_entity("u", PROCESS, named("p"), None).await.unwrap();
        let mut ports = Vec::new();
        for qn in ["p::a", "p::b"] {
            let (port, _) = helper
                .upsert_entity("u", PORT_IMPLEMENTATION, named(qn), None)
                .await
                .unwrap();
            helper
                .upsert_relationship("u", PROCESS_PORT, &process, &port, InstanceProperties::new())
                .await
                .unwrap();
            ports.push(port);
        }

        let keep: HashSet<Guid> = [ports[0].clone()].into_iter().collect();
        let appended = helper
            .reconcile_children("u", &process, PROCESS_PORT, &keep, UpdateSemantic::Append, DeleteSemantic::Soft)
            .await
            .unwrap();
        assert!(appended.is_empty());

        let removed = helper
            .reconcile_children("u", &process, PROCESS_PORT, &keep, UpdateSemantic::Replace, DeleteSemantic::Soft)
            .await
            .unwrap();
        assert_eq!(removed, vec![ports[1].clone()]);
        assert!(helper
            .find_entity_by_qualified_name(PORT, "p::b")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn hard_delete_cascades_over_containment() {
        let helper = helper();
        let (port, _) = helper
            .upsert_entity("u", PORT_IMPLEMENTATION, named("p::in"), None)
            .await
            .unwrap();
        let (schema, _) = helper
            .upsert_entity("u", TABULAR_SCHEMA_TYPE, named("p::in::schema"), None)
            .await
            .unwrap();
        let (column, _) = helper
            .upsert_entity("u", TABULAR_COLUMN, named("p::in::id"), None)
            .await
            .unwrap();
        helper
            .upsert_relationship("u", PORT_SCHEMA, &port, &schema, InstanceProperties::new())
            .await
            .unwrap();
        helper
            .upsert_relationship("u", ATTRIBUTE_FOR_SCHEMA, &schema, &column, InstanceProperties::new())
            .await
            .unwrap();

        helper.remove_entity("u", &port, DeleteSemantic::Hard).await.unwrap();
        assert_eq!(helper.repository().stored_entity_count(), 0);
    }

    #[tokio::test]
    async fn hard_delete_is_refused_when_purge_is_unsupported() {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::new(
            crate::model::TypeRegistry::open_metadata(),
            false,
        )));
        let (process, _) = helper.upsert_entity("u", PROCESS, named("p"), None).await.unwrap();

        let err = helper
            .remove_entity("u", &process, DeleteSemantic::Hard)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::FunctionNotSupported(_)));
        // nothing was touched
        assert_eq!(helper.repository().active_entity_count(), 1);
    }

    #[tokio::test]
    async fn resolve_target_checks_the_type_family() {
        let helper = helper();
        let (process, _) = helper.upsert_entity("u", PROCESS, named("p"), None).await.unwrap();

        let found = helper.resolve_target(PROCESS, None, Some("p")).await.unwrap();
        assert_eq!(found.guid, process);

        let err = helper
            .resolve_target(PORT, Some(process.as_str()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));

        let err = helper.resolve_target(PROCESS, None, None).await.unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn a_name_can_move_to_a_sibling_type() {
        let helper = helper();
        let (implementation, _) = helper
            .upsert_entity("u", PORT_IMPLEMENTATION, named("etl::p"), None)
            .await
            .unwrap();

        let (alias, outcome) = helper
            .upsert_entity("u", PORT_ALIAS, named("etl::p"), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_ne!(alias, implementation);
        assert!(helper.get_entity(&implementation).await.unwrap().unwrap().is_deleted());
        let found = helper.find_entity_by_qualified_name(PORT, "etl::p").await.unwrap().unwrap();
        assert_eq!(found.type_name, PORT_ALIAS);
    }

    #[tokio::test]
    async fn a_name_held_by_an_unrelated_type_is_a_conflict() {
        let helper = helper();
        helper
            .upsert_entity("u", DATABASE, named("pg::sales"), None)
            .await
            .unwrap();

        let err = helper
            .upsert_entity("u", PROCESS, named("pg::sales"), None)
            .await
            .unwrap_err();
        match err {
            OmasError::InvalidParameter { message, .. } => assert!(message.contains("Database")),
            other => panic!("expected an invalid parameter, got {:?}", other),
        }
        assert_eq!(helper.repository().active_entity_count(), 1);
    }
}
