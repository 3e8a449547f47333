//! Nested element writer shared by reports and data views.
//!
//! A document is an asset owning a `DocumentSchemaType`. Containers (report
//! sections, view tables) become `DocumentSchemaAttribute`s, leaves (columns)
//! become `DerivedSchemaAttribute`s linked to the schema elements they are
//! computed from.

use std::collections::HashSet;

use crate::error::OmasResult;
use crate::logic::repository_helper::BoxFuture;
use crate::logic::{RegistrationHandler, RepositoryHelper};
use crate::model::type_names::{
    ASSET_SCHEMA_TYPE, ATTRIBUTE_FOR_SCHEMA, DERIVED_SCHEMA_ATTRIBUTE, DOCUMENT_SCHEMA_ATTRIBUTE,
    DOCUMENT_SCHEMA_TYPE, NESTED_SCHEMA_ATTRIBUTE, SCHEMA_ELEMENT, SCHEMA_QUERY_IMPLEMENTATION,
};
use crate::model::{
    child_qualified_name, DeleteSemantic, Guid, InstanceProperties, Source, UpdateSemantic,
    QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

pub enum NodeShape<'a, N> {
    Container(&'a [N]),
    Leaf(&'a [Source]),
}

/// One element of a document tree.
pub trait DocumentNode: Send + Sync + Sized {
    fn name(&self) -> &str;
    fn shape(&self) -> NodeShape<'_, Self>;
    /// Properties stored on the element besides its qualified name.
    fn properties(&self) -> InstanceProperties;
}

/// Qualified name of the schema type owned by a document asset.
pub fn document_schema_qualified_name(asset_qualified_name: &str) -> String {
    format!("{}#schema", asset_qualified_name)
}

pub struct DocumentTreeWriter<R> {
    helper: RepositoryHelper<R>,
    registration: RegistrationHandler<R>,
}

impl<R> Clone for DocumentTreeWriter<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            registration: self.registration.clone(),
        }
    }
}

impl<R: MetadataRepository + 'static> DocumentTreeWriter<R> {
    pub fn new(helper: RepositoryHelper<R>, registration: RegistrationHandler<R>) -> Self {
        Self {
            helper,
            registration,
        }
    }

    pub fn helper(&self) -> &RepositoryHelper<R> {
        &self.helper
    }

    /// Upsert the asset, its document schema type and the whole element tree.
    /// `asset_properties` must carry the asset's qualified name.
    pub async fn upsert_document<N: DocumentNode>(
        &self,
        user_id: &str,
        asset_type: &str,
        asset_properties: InstanceProperties,
        nodes: &[N],
        registration_qualified_name: Option<&str>,
    ) -> OmasResult<Guid> {
        self.registration
            .validate_external_source(registration_qualified_name)
            .await?;
        let asset_qualified_name = asset_properties
            .qualified_name()
            .unwrap_or_default()
            .to_string();
        let collection = self.helper.metadata_collection(registration_qualified_name);

        let (asset_guid, outcome) = self
            .helper
            .upsert_entity(user_id, asset_type, asset_properties, collection)
            .await?;
        log::info!("{} {} {:?} ({})", asset_type, asset_qualified_name, outcome, asset_guid);

        let schema_qualified_name = document_schema_qualified_name(&asset_qualified_name);
        let (schema_guid, _) = self
            .helper
            .upsert_entity(
                user_id,
                DOCUMENT_SCHEMA_TYPE,
                InstanceProperties::new().with(QUALIFIED_NAME, Some(schema_qualified_name.as_str())),
                collection,
            )
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                ASSET_SCHEMA_TYPE,
                &asset_guid,
                &schema_guid,
                InstanceProperties::new(),
            )
            .await?;

        self.write_level(
            user_id,
            &schema_guid,
            &asset_qualified_name,
            ATTRIBUTE_FOR_SCHEMA,
            nodes,
            collection,
        )
        .await?;

        self.registration
            .link_to_external_source(user_id, registration_qualified_name, &asset_guid)
            .await?;
        Ok(asset_guid)
    }

    fn write_level<'a, N: DocumentNode>(
        &'a self,
        user_id: &'a str,
        parent_guid: &'a str,
        parent_qualified_name: &'a str,
        relationship_type: &'static str,
        nodes: &'a [N],
        collection: Option<&'a str>,
    ) -> BoxFuture<'a, OmasResult<()>> {
        Box::pin(async move {
            let mut keep = HashSet::new();
            for (position, node) in nodes.iter().enumerate() {
                let qualified_name = child_qualified_name(parent_qualified_name, node.name());
                let properties = node
                    .properties()
                    .with(QUALIFIED_NAME, Some(qualified_name.as_str()))
                    .with("displayName", Some(node.name()))
                    .with("position", Some(position as i64));
                let type_name = match node.shape() {
                    NodeShape::Container(_) => DOCUMENT_SCHEMA_ATTRIBUTE,
                    NodeShape::Leaf(_) => DERIVED_SCHEMA_ATTRIBUTE,
                };

                let (guid, _) = self
                    .helper
                    .upsert_entity(user_id, type_name, properties, collection)
                    .await?;
                self.helper
                    .upsert_relationship(
                        user_id,
                        relationship_type,
                        parent_guid,
                        &guid,
                        InstanceProperties::new().with("position", Some(position as i64)),
                    )
                    .await?;

                match node.shape() {
                    NodeShape::Container(children) => {
                        self.write_level(
                            user_id,
                            &guid,
                            &qualified_name,
                            NESTED_SCHEMA_ATTRIBUTE,
                            children,
                            collection,
                        )
                        .await?;
                    }
                    NodeShape::Leaf(sources) => {
                        self.link_sources(user_id, &guid, &qualified_name, sources).await?;
                    }
                }
                keep.insert(guid);
            }

            self.helper
                .reconcile_children(
                    user_id,
                    parent_guid,
                    relationship_type,
                    &keep,
                    UpdateSemantic::Replace,
                    DeleteSemantic::Soft,
                )
                .await?;
            Ok(())
        })
    }

    /// Point a derived column at the elements it is computed from. Sources
    /// that cannot be found are skipped.
    async fn link_sources(
        &self,
        user_id: &str,
        column_guid: &str,
        column_qualified_name: &str,
        sources: &[Source],
    ) -> OmasResult<()> {
        let mut linked = HashSet::new();
        for source in sources {
            match self
                .helper
                .find_entity_by_qualified_name(SCHEMA_ELEMENT, &source.qualified_name)
                .await?
            {
                Some(element) => {
                    self.helper
                        .upsert_relationship(
                            user_id,
                            SCHEMA_QUERY_IMPLEMENTATION,
                            column_guid,
                            &element.guid,
                            InstanceProperties::new(),
                        )
                        .await?;
                    linked.insert(element.guid);
                }
                None => log::warn!(
                    "Source '{}' of {} not found, skipping",
                    source.qualified_name,
                    column_qualified_name
                ),
            }
        }

        for stale in self
            .helper
            .outgoing(column_guid, SCHEMA_QUERY_IMPLEMENTATION)
            .await?
        {
            if !linked.contains(&stale.end2_guid) {
                self.helper
                    .remove_relationship(user_id, &stale.guid, DeleteSemantic::Soft)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn remove_document(
        &self,
        user_id: &str,
        asset_type: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self
            .helper
            .resolve_target(asset_type, guid, qualified_name)
            .await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}
