use std::collections::HashSet;

use crate::error::{OmasError, OmasResult};
use crate::logic::{RegistrationHandler, RepositoryHelper, SchemaTypeHandler};
use crate::model::type_names::{ASSET_SCHEMA_TYPE, EVENT_SCHEMA_ATTRIBUTE, EVENT_TYPE, TOPIC};
use crate::model::{
    DeleteSemantic, EventType, Guid, InstanceProperties, Topic, UpdateSemantic, QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

/// Writes Topic → EventType → EventSchemaAttribute.
pub struct TopicHandler<R> {
    helper: RepositoryHelper<R>,
    schema_types: SchemaTypeHandler<R>,
    registration: RegistrationHandler<R>,
}

impl<R> Clone for TopicHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            schema_types: self.schema_types.clone(),
            registration: self.registration.clone(),
        }
    }
}

fn topic_properties(topic: &Topic) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(topic.qualified_name.as_str()))
        .with("name", topic.display_name.as_deref())
        .with("description", topic.description.as_deref())
        .with("topicType", topic.topic_type.as_deref())
}

fn event_type_properties(event_type: &EventType) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(event_type.qualified_name.as_str()))
        .with("displayName", event_type.display_name.as_deref())
        .with("description", event_type.description.as_deref())
}

impl<R: MetadataRepository + 'static> TopicHandler<R> {
    pub fn new(
        helper: RepositoryHelper<R>,
        schema_types: SchemaTypeHandler<R>,
        registration: RegistrationHandler<R>,
    ) -> Self {
        Self {
            helper,
            schema_types,
            registration,
        }
    }

    /// Upsert a topic and its event types. Event types not listed any more are removed.
    pub async fn upsert_topic(
        &self,
        user_id: &str,
        topic: &Topic,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if topic.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a topic needs a qualified name",
            ));
        }
        self.registration
            .validate_external_source(external_source_name)
            .await?;

        let (topic_guid, outcome) = self
            .helper
            .upsert_entity(
                user_id,
                TOPIC,
                topic_properties(topic),
                self.helper.metadata_collection(external_source_name),
            )
            .await?;
        log::info!("Topic {} {:?} ({})", topic.qualified_name, outcome, topic_guid);

        let mut keep = HashSet::new();
        for event_type in &topic.event_types {
            let guid = self
                .write_event_type(user_id, &topic_guid, event_type, external_source_name)
                .await?;
            keep.insert(guid);
        }
        self.helper
            .reconcile_children(
                user_id,
                &topic_guid,
                ASSET_SCHEMA_TYPE,
                &keep,
                UpdateSemantic::Replace,
                DeleteSemantic::Soft,
            )
            .await?;

        self.registration
            .link_to_external_source(user_id, external_source_name, &topic_guid)
            .await?;
        Ok(topic_guid)
    }

    /// Upsert a single event type under an existing topic.
    pub async fn upsert_event_type(
        &self,
        user_id: &str,
        topic_qualified_name: &str,
        event_type: &EventType,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        self.registration
            .validate_external_source(external_source_name)
            .await?;
        let topic = self
            .helper
            .require_entity_by_qualified_name(TOPIC, topic_qualified_name, "topicQualifiedName")
            .await?;
        self.write_event_type(user_id, &topic.guid, event_type, external_source_name)
            .await
    }

    async fn write_event_type(
        &self,
        user_id: &str,
        topic_guid: &str,
        event_type: &EventType,
        external_source_name: Option<&str>,
    ) -> OmasResult<Guid> {
        if event_type.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                "eventType.qualifiedName",
                "an event type needs a qualified name",
            ));
        }
        let guid = self
            .schema_types
            .upsert_complex_schema_type(
                user_id,
                EVENT_TYPE,
                event_type_properties(event_type),
                EVENT_SCHEMA_ATTRIBUTE,
                &event_type.attribute_list,
                UpdateSemantic::Replace,
                external_source_name,
            )
            .await?;
        self.helper
            .upsert_relationship(
                user_id,
                ASSET_SCHEMA_TYPE,
                topic_guid,
                &guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(guid)
    }

    pub async fn remove_topic(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self.helper.resolve_target(TOPIC, guid, qualified_name).await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }

    pub async fn remove_event_type(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        let target = self
            .helper
            .resolve_target(EVENT_TYPE, guid, qualified_name)
            .await?;
        self.helper.remove_entity(user_id, &target.guid, semantic).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attribute;
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> TopicHandler<InMemoryRepository> {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::default()));
        TopicHandler::new(
            helper.clone(),
            SchemaTypeHandler::new(helper.clone()),
            RegistrationHandler::new(helper),
        )
    }

    fn event_type(qn: &str, fields: &[&str]) -> EventType {
        EventType {
            qualified_name: qn.to_string(),
            attribute_list: fields
                .iter()
                .map(|f| Attribute {
                    qualified_name: format!("{}::{}", qn, f),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn topic_event_types_are_replaced() {
        let handler = handler();
        let topic = Topic {
            qualified_name: "kafka::orders".to_string(),
            event_types: vec![
                event_type("kafka::orders::created", &["id", "amount"]),
                event_type("kafka::orders::cancelled", &["id"]),
            ],
            ..Default::default()
        };
        let topic_guid = handler.upsert_topic("u", &topic, None).await.unwrap();
        assert_eq!(
            handler.helper.outgoing(&topic_guid, ASSET_SCHEMA_TYPE).await.unwrap().len(),
            2
        );

        let trimmed = Topic {
            event_types: vec![event_type("kafka::orders::created", &["id"])],
            ..topic
        };
        handler.upsert_topic("u", &trimmed, None).await.unwrap();

        assert_eq!(
            handler.helper.outgoing(&topic_guid, ASSET_SCHEMA_TYPE).await.unwrap().len(),
            1
        );
        assert!(handler
            .helper
            .find_entity_by_qualified_name(EVENT_SCHEMA_ATTRIBUTE, "kafka::orders::created::amount")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn event_types_need_a_known_topic() {
        let handler = handler();
        let err = handler
            .upsert_event_type("u", "kafka::missing", &event_type("e", &[]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));

        handler
            .upsert_topic(
                "u",
                &Topic {
                    qualified_name: "kafka::payments".to_string(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let guid = handler
            .upsert_event_type("u", "kafka::payments", &event_type("kafka::payments::settled", &["id"]), None)
            .await
            .unwrap();

        handler
            .remove_event_type("u", None, Some("kafka::payments::settled"), DeleteSemantic::Hard)
            .await
            .unwrap();
        assert!(handler.helper.get_entity(&guid).await.unwrap().is_none());
    }
}
