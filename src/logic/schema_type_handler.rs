use std::collections::HashSet;

use crate::error::{OmasError, OmasResult};
use crate::logic::{fan_out, RepositoryHelper};
use crate::model::type_names::{
    ATTRIBUTE_FOR_SCHEMA, LINEAGE_MAPPING, SCHEMA_ELEMENT, SCHEMA_TYPE, TABULAR_COLUMN,
    TABULAR_SCHEMA_TYPE,
};
use crate::model::{
    Attribute, DeleteSemantic, FanOutResponse, Guid, InstanceProperties, LineageMapping,
    SchemaType, UpdateSemantic, QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

pub struct SchemaTypeHandler<R> {
    helper: RepositoryHelper<R>,
}

impl<R> Clone for SchemaTypeHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
        }
    }
}

fn schema_type_properties(schema_type: &SchemaType) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(schema_type.qualified_name.as_str()))
        .with("displayName", schema_type.display_name.as_deref())
        .with("author", schema_type.author.as_deref())
        .with("usage", schema_type.usage.as_deref())
        .with("encodingStandard", schema_type.encoding_standard.as_deref())
        .with("versionNumber", schema_type.version_number.as_deref())
}

pub(crate) fn attribute_properties(attribute: &Attribute) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(attribute.qualified_name.as_str()))
        .with("displayName", attribute.display_name.as_deref())
        .with("description", attribute.description.as_deref())
        .with("position", attribute.position)
        .with("dataType", attribute.data_type.as_deref())
        .with("defaultValue", attribute.default_value.as_deref())
        .with("isNullable", attribute.nullable)
}

impl<R: MetadataRepository + 'static> SchemaTypeHandler<R> {
    pub fn new(helper: RepositoryHelper<R>) -> Self {
        Self { helper }
    }

    /// Upsert a tabular schema type and its columns. Under `Replace`, columns
    /// no longer listed are removed.
    pub async fn upsert_schema_type(
        &self,
        user_id: &str,
        schema_type: &SchemaType,
        update_semantic: UpdateSemantic,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        self.upsert_complex_schema_type(
            user_id,
            TABULAR_SCHEMA_TYPE,
            schema_type_properties(schema_type),
            TABULAR_COLUMN,
            &schema_type.attribute_list,
            update_semantic,
            external_source_name,
        )
        .await
    }

    /// Shared by every schema type made of a flat attribute list.
    pub(crate) async fn upsert_complex_schema_type(
        &self,
        user_id: &str,
        schema_type_name: &str,
        properties: InstanceProperties,
        attribute_type_name: &str,
        attributes: &[Attribute],
        update_semantic: UpdateSemantic,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        let collection = self.helper.metadata_collection(external_source_name);
        let (schema_guid, _) = self
            .helper
            .upsert_entity(user_id, schema_type_name, properties, collection)
            .await?;

        let mut keep = HashSet::new();
        for attribute in attributes {
            let (attribute_guid, _) = self
                .helper
                .upsert_entity(
                    user_id,
                    attribute_type_name,
                    attribute_properties(attribute),
                    collection,
                )
                .await?;
            self.helper
                .upsert_relationship(
                    user_id,
                    ATTRIBUTE_FOR_SCHEMA,
                    &schema_guid,
                    &attribute_guid,
                    InstanceProperties::new().with("position", attribute.position),
                )
                .await?;
            keep.insert(attribute_guid);
        }

        self.helper
            .reconcile_children(
                user_id,
                &schema_guid,
                ATTRIBUTE_FOR_SCHEMA,
                &keep,
                update_semantic,
                DeleteSemantic::Soft,
            )
            .await?;
        Ok(schema_guid)
    }

    /// Connect a source attribute to a target attribute. Returns the
    /// relationship GUID.
    pub async fn add_lineage_mapping(
        &self,
        user_id: &str,
        mapping: &LineageMapping,
    ) -> OmasResult<Guid> {
        let source = self
            .helper
            .require_entity_by_qualified_name(SCHEMA_ELEMENT, &mapping.source_attribute, "sourceAttribute")
            .await?;
        let target = self
            .helper
            .require_entity_by_qualified_name(SCHEMA_ELEMENT, &mapping.target_attribute, "targetAttribute")
            .await?;
        if source.guid == target.guid {
            return Err(OmasError::invalid_parameter(
                "targetAttribute",
                "an attribute cannot map onto itself",
            ));
        }
        self.helper
            .upsert_relationship(
                user_id,
                LINEAGE_MAPPING,
                &source.guid,
                &target.guid,
                InstanceProperties::new(),
            )
            .await
    }

    /// Add every mapping independently; failures are reported per mapping.
    pub async fn add_lineage_mappings(
        &self,
        user_id: &str,
        mappings: Vec<LineageMapping>,
    ) -> FanOutResponse {
        let handler = self.clone();
        let user_id = user_id.to_string();
        fan_out(
            mappings,
            |m| format!("{} -> {}", m.source_attribute, m.target_attribute),
            move |mapping| {
                let handler = handler.clone();
                let user_id = user_id.clone();
                async move { handler.add_lineage_mapping(&user_id, &mapping).await }
            },
        )
        .await
    }

    pub async fn remove_schema_type(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self
            .helper
            .resolve_target(SCHEMA_TYPE, guid, qualified_name)
            .await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}
