use crate::error::{OmasError, OmasResult};
use crate::logic::RepositoryHelper;
use crate::model::type_names::REFERENCEABLE;
use crate::model::{Guid, QUALIFIED_NAME};
use crate::store::MetadataRepository;

pub struct Finder<R> {
    helper: RepositoryHelper<R>,
}

impl<R> Clone for Finder<R> {
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
        }
    }
}

impl<R: MetadataRepository + 'static> Finder<R> {
    pub fn new(helper: RepositoryHelper<R>) -> Self {
        Self { helper }
    }

    /// GUIDs of every live entity of `type_name` (default Referenceable) with the qualified name.
    pub async fn find_guids(
        &self,
        type_name: Option<&str>,
        qualified_name: &str,
    ) -> OmasResult<Vec<Guid>> {
        if qualified_name.trim().is_empty() {
            return Err(OmasError::invalid_parameter(
                QUALIFIED_NAME,
                "a qualified name is required",
            ));
        }
        let type_name = type_name.filter(|t| !t.is_empty()).unwrap_or(REFERENCEABLE);
        let repository = self.helper.repository();
        repository
            .type_registry()
            .validate_entity_type(type_name)
            .map_err(|e| OmasError::invalid_parameter("typeName", e.to_string()))?;

        let mut guids: Vec<Guid> = repository
            .find_entities_by_property(
                type_name,
                QUALIFIED_NAME,
                &serde_json::Value::String(qualified_name.to_string()),
            )
            .await?
            .into_iter()
            .map(|e| e.guid)
            .collect();
        guids.sort();
        Ok(guids)
    }
}
