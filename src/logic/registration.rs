use crate::error::{OmasError, OmasResult};
use crate::logic::RepositoryHelper;
use crate::model::type_names::{SERVER_ASSET_USE, SOFTWARE_SERVER_CAPABILITY};
use crate::model::{Guid, InstanceProperties, SoftwareServerCapability, QUALIFIED_NAME};
use crate::store::MetadataRepository;

/// Registers the data engines (external sources) that publish metadata.
pub struct RegistrationHandler<R> {
    helper: RepositoryHelper<R>,
}

impl<R> Clone for RegistrationHandler<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
        }
    }
}

fn engine_properties(engine: &SoftwareServerCapability) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(engine.qualified_name.as_str()))
        .with("name", engine.name.as_deref())
        .with("description", engine.description.as_deref())
        .with("type", engine.engine_type.as_deref())
        .with("version", engine.engine_version.as_deref())
        .with("patchLevel", engine.patch_level.as_deref())
        .with("source", engine.source.as_deref())
}

impl<R: MetadataRepository + 'static> RegistrationHandler<R> {
    pub fn new(helper: RepositoryHelper<R>) -> Self {
        Self { helper }
    }

    pub async fn upsert_external_source(
        &self,
        user_id: &str,
        engine: &SoftwareServerCapability,
    ) -> OmasResult<Guid> {
        if engine.qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "the engine needs a qualified name",
            ));
        }
        let (guid, outcome) = self
            .helper
            .upsert_entity(
                user_id,
                SOFTWARE_SERVER_CAPABILITY,
                engine_properties(engine),
                Some(&engine.qualified_name),
            )
            .await?;
        log::info!(
            "External source {} registered ({:?}, {})",
            engine.qualified_name,
            outcome,
            guid
        );
        Ok(guid)
    }

    pub async fn get_external_source_guid(&self, qualified_name: &str) -> OmasResult<Option<Guid>> {
        self.helper
            .find_guid_by_qualified_name(SOFTWARE_SERVER_CAPABILITY, qualified_name)
            .await
    }

    /// Record that `asset_guid` was published by the named external source.
    /// No-op when no external source is given.
    pub async fn link_to_external_source(
        &self,
        user_id: &str,
        external_source_name: Option<&str>,
        asset_guid: &str,
    ) -> OmasResult<()> {
        let Some(source_name) = external_source_name.filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        let engine_guid = self
            .get_external_source_guid(source_name)
            .await?
            .ok_or_else(|| {
                OmasError::invalid_parameter(
                    "externalSourceName",
                    format!("external source '{}' is not registered", source_name),
                )
            })?;
        self.helper
            .upsert_relationship(
                user_id,
                SERVER_ASSET_USE,
                &engine_guid,
                asset_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(())
    }

    /// Fail fast on an unknown external source before anything is written.
    pub async fn validate_external_source(
        &self,
        external_source_name: Option<&str>,
    ) -> OmasResult<()> {
        if let Some(source_name) = external_source_name.filter(|s| !s.is_empty()) {
            if self.get_external_source_guid(source_name).await?.is_none() {
                return Err(OmasError::invalid_parameter(
                    "externalSourceName",
                    format!("external source '{}' is not registered", source_name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> RegistrationHandler<InMemoryRepository> {
        RegistrationHandler::new(RepositoryHelper::new(Arc::new(InMemoryRepository::default())))
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let handler = handler();
        let engine = SoftwareServerCapability {
            qualified_name: "engine::spark".to_string(),
            engine_type: Some("Spark".to_string()),
            ..Default::default()
        };
        let first = handler.upsert_external_source("u", &engine).await.unwrap();
        let second = handler.upsert_external_source("u", &engine).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            handler.get_external_source_guid("engine::spark").await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn unknown_external_sources_are_rejected() {
        let handler = handler();
        let err = handler
            .validate_external_source(Some("engine::unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));
        handler.validate_external_source(None).await.unwrap();
    }
}
