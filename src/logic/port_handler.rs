use std::collections::HashSet;

use crate::error::{OmasError, OmasResult};
use crate::logic::{RepositoryHelper, SchemaTypeHandler};
use crate::model::type_names::{
    PORT, PORT_ALIAS, PORT_DELEGATION, PORT_IMPLEMENTATION, PORT_SCHEMA, PROCESS_PORT,
};
use crate::model::{
    DeleteSemantic, Guid, InstanceProperties, PortAlias, PortImplementation, PortType,
    QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

pub struct PortHandler<R> {
    helper: RepositoryHelper<R>,
    schema_types: SchemaTypeHandler<R>,
}

impl<R> Clone for PortHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            schema_types: self.schema_types.clone(),
        }
    }
}

fn port_properties(qualified_name: &str, display_name: Option<&str>, port_type: PortType) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(qualified_name))
        .with("displayName", display_name)
        .with("portType", Some(port_type.as_str()))
}

impl<R: MetadataRepository + 'static> PortHandler<R> {
    pub fn new(helper: RepositoryHelper<R>, schema_types: SchemaTypeHandler<R>) -> Self {
        Self {
            helper,
            schema_types,
        }
    }

    /// Upsert a port implementation with its schema type, optionally hanging it off a process.
    pub async fn upsert_port_implementation(
        &self,
        user_id: &str,
        port: &PortImplementation,
        process_guid: Option<&str>,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if port.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a port implementation needs a qualified name",
            ));
        }
        let (port_guid, _) = self
            .helper
            .upsert_entity(
                user_id,
                PORT_IMPLEMENTATION,
                port_properties(&port.qualified_name, port.display_name.as_deref(), port.port_type),
                self.helper.metadata_collection(external_source_name),
            )
            .await?;

        let mut keep = HashSet::new();
        if let Some(schema_type) = &port.schema_type {
            let schema_guid = self
                .schema_types
                .upsert_schema_type(user_id, schema_type, port.update_semantic, external_source_name)
                .await?;
            self.helper
                .upsert_relationship(user_id, PORT_SCHEMA, &port_guid, &schema_guid, InstanceProperties::new())
                .await?;
            keep.insert(schema_guid);
        }
        // a port carries one schema type; a replaced one goes away
        self.helper
            .reconcile_children(
                user_id,
                &port_guid,
                PORT_SCHEMA,
                &keep,
                port.update_semantic,
                DeleteSemantic::Soft,
            )
            .await?;

        if let Some(process_guid) = process_guid {
            self.attach_to_process(user_id, process_guid, &port_guid).await?;
        }
        Ok(port_guid)
    }

    /// Upsert a port alias; `delegatesTo` must name an existing port.
    pub async fn upsert_port_alias(
        &self,
        user_id: &str,
        alias: &PortAlias,
        process_guid: Option<&str>,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if alias.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a port alias needs a qualified name",
            ));
        }
        let delegate = match alias.delegates_to.as_deref().filter(|d| !d.is_empty()) {
            Some(delegates_to) if delegates_to == alias.qualified_name => {
                return Err(OmasError::invalid_parameter(
                    "delegatesTo",
                    "a port alias cannot delegate to itself",
                ))
            }
            Some(delegates_to) => Some(
                self.helper
                    .require_entity_by_qualified_name(PORT, delegates_to, "delegatesTo")
                    .await?,
            ),
            None => None,
        };

        let (alias_guid, _) = self
            .helper
            .upsert_entity(
                user_id,
                PORT_ALIAS,
                port_properties(&alias.qualified_name, alias.display_name.as_deref(), alias.port_type),
                self.helper.metadata_collection(external_source_name),
            )
            .await?;

        if let Some(delegate) = delegate {
            // an alias delegates to exactly one port
            for stale in self.helper.outgoing(&alias_guid, PORT_DELEGATION).await? {
                if stale.end2_guid != delegate.guid {
                    self.helper
                        .remove_relationship(user_id, &stale.guid, DeleteSemantic::Soft)
                        .await?;
                }
            }
            self.helper
                .upsert_relationship(
                    user_id,
                    PORT_DELEGATION,
                    &alias_guid,
                    &delegate.guid,
                    InstanceProperties::new(),
                )
                .await?;
        }

        if let Some(process_guid) = process_guid {
            self.attach_to_process(user_id, process_guid, &alias_guid).await?;
        }
        Ok(alias_guid)
    }

    async fn attach_to_process(
        &self,
        user_id: &str,
        process_guid: &str,
        port_guid: &str,
    ) -> OmasResult<()> {
        self.helper
            .upsert_relationship(user_id, PROCESS_PORT, process_guid, port_guid, InstanceProperties::new())
            .await?;
        Ok(())
    }

    /// The schema type attached to a port, if any.
    pub async fn find_schema_type_guid(&self, port_guid: &str) -> OmasResult<Option<Guid>> {
        Ok(self
            .helper
            .outgoing(port_guid, PORT_SCHEMA)
            .await?
            .into_iter()
            .next()
            .map(|r| r.end2_guid))
    }

    pub async fn remove_port(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self.helper.resolve_target(PORT, guid, qualified_name).await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, SchemaType, UpdateSemantic};
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> PortHandler<InMemoryRepository> {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::default()));
        PortHandler::new(helper.clone(), SchemaTypeHandler::new(helper))
    }

    fn port(qn: &str, schema_qn: &str) -> PortImplementation {
        PortImplementation {
            qualified_name: qn.to_string(),
            port_type: PortType::InIn,
            schema_type: Some(SchemaType {
                qualified_name: schema_qn.to_string(),
                attribute_list: vec![Attribute {
                    qualified_name: format!("{}::id", schema_qn),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            update_semantic: UpdateSemantic::Replace,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn replacing_the_schema_type_removes_the_old_one() {
        let handler = handler();
        let guid = handler
            .upsert_port_implementation("u", &port("p::in", "p::in::v1"), None, None)
            .await
            .unwrap();
        let first_schema = handler.find_schema_type_guid(&guid).await.unwrap().unwrap();

        handler
            .upsert_port_implementation("u", &port("p::in", "p::in::v2"), None, None)
            .await
            .unwrap();
        let second_schema = handler.find_schema_type_guid(&guid).await.unwrap().unwrap();

        assert_ne!(first_schema, second_schema);
        let old = handler.helper.get_entity(&first_schema).await.unwrap().unwrap();
        assert!(old.is_deleted());
    }

    #[tokio::test]
    async fn alias_delegation_requires_a_known_port() {
        let handler = handler();
        let alias = PortAlias {
            qualified_name: "p::alias".to_string(),
            delegates_to: Some("p::in".to_string()),
            ..Default::default()
        };
        let err = handler
            .upsert_port_alias("u", &alias, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));

        let port_guid = handler
            .upsert_port_implementation("u", &port("p::in", "p::in::schema"), None, None)
            .await
            .unwrap();
        let alias_guid = handler.upsert_port_alias("u", &alias, None, None).await.unwrap();
        let delegations = handler.helper.outgoing(&alias_guid, PORT_DELEGATION).await.unwrap();
        assert_eq!(delegations.len(), 1);
        assert_eq!(delegations[0].end2_guid, port_guid);
    }
}
