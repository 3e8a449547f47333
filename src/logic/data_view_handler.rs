use crate::error::{OmasError, OmasResult};
use crate::logic::document_tree::{DocumentNode, DocumentTreeWriter, NodeShape};
use crate::model::type_names::INFORMATION_VIEW;
use crate::model::{
    DataView, DataViewElement, DeleteSemantic, Guid, InstanceProperties, QUALIFIED_NAME,
};
use crate::store::MetadataRepository;

impl DocumentNode for DataViewElement {
    fn name(&self) -> &str {
        match self {
            DataViewElement::Table { name, .. } | DataViewElement::Column { name, .. } => name,
        }
    }

    fn shape(&self) -> NodeShape<'_, Self> {
        match self {
            DataViewElement::Table { elements, .. } => NodeShape::Container(elements),
            DataViewElement::Column { sources, .. } => NodeShape::Leaf(sources),
        }
    }

    fn properties(&self) -> InstanceProperties {
        match self {
            DataViewElement::Table { comment, .. } => {
                InstanceProperties::new().with("description", comment.as_deref())
            }
            DataViewElement::Column {
                comment,
                data_type,
                formula,
                ..
            } => InstanceProperties::new()
                .with("description", comment.as_deref())
                .with("dataType", data_type.as_deref())
                .with("formula", formula.as_deref()),
        }
    }
}

fn data_view_properties(view: &DataView, qualified_name: &str) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(qualified_name))
        .with("id", Some(view.id.as_str()))
        .with("name", view.name.as_deref())
        .with("description", view.description.as_deref())
        .with("author", view.author.as_deref())
        .with("networkAddress", view.endpoint_address.as_deref())
        .with("createdTime", view.created_time.as_deref())
        .with("lastModifiedTime", view.last_modified_time.as_deref())
}

/// Publishes BI data views as InformationView assets.
pub struct DataViewHandler<R> {
    documents: DocumentTreeWriter<R>,
}

impl<R> Clone for DataViewHandler<R> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
        }
    }
}

impl<R: MetadataRepository + 'static> DataViewHandler<R> {
    pub fn new(documents: DocumentTreeWriter<R>) -> Self {
        Self { documents }
    }

    pub async fn upsert_data_view(
        &self,
        user_id: &str,
        registration_qualified_name: Option<&str>,
        view: &DataView,
    ) -> OmasResult<Guid> {
        if view.id.trim().is_empty() && view.qualified_name.as_deref().map_or(true, str::is_empty) {
            return Err(OmasError::invalid_parameter(
                "dataView.id",
                "a data view needs an id or a qualified name",
            ));
        }
        let qualified_name = view.resolved_qualified_name();
        self.documents
            .upsert_document(
                user_id,
                INFORMATION_VIEW,
                data_view_properties(view, &qualified_name),
                &view.elements,
                registration_qualified_name,
            )
            .await
    }

    pub async fn remove_data_view(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        self.documents
            .remove_document(user_id, INFORMATION_VIEW, guid, qualified_name, semantic)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{RegistrationHandler, RepositoryHelper};
    use crate::model::type_names::{DERIVED_SCHEMA_ATTRIBUTE, DOCUMENT_SCHEMA_ATTRIBUTE};
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> DataViewHandler<InMemoryRepository> {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::default()));
        DataViewHandler::new(DocumentTreeWriter::new(
            helper.clone(),
            RegistrationHandler::new(helper),
        ))
    }

    fn view() -> DataView {
        DataView {
            id: "v1".to_string(),
            endpoint_address: Some("bi.local".to_string()),
            elements: vec![DataViewElement::Table {
                name: "orders".to_string(),
                comment: Some("all orders".to_string()),
                elements: vec![DataViewElement::Column {
                    name: "total".to_string(),
                    comment: None,
                    data_type: Some("decimal".to_string()),
                    formula: None,
                    sources: vec![],
                }],
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn data_view_tree_is_written() {
        let handler = handler();
        handler.upsert_data_view("u", None, &view()).await.unwrap();
        let helper = handler.documents.helper();

        let table = helper
            .find_entity_by_qualified_name(DOCUMENT_SCHEMA_ATTRIBUTE, "dataView::bi.local.v1::orders")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(table.properties.string("description"), Some("all orders"));
        let column = helper
            .find_entity_by_qualified_name(DERIVED_SCHEMA_ATTRIBUTE, "dataView::bi.local.v1::orders::total")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(column.properties.string("dataType"), Some("decimal"));
    }

    #[tokio::test]
    async fn a_data_view_needs_an_identity() {
        let handler = handler();
        let err = handler
            .upsert_data_view("u", None, &DataView::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn delete_checks_the_type_family() {
        let handler = handler();
        handler.upsert_data_view("u", None, &view()).await.unwrap();

        let err = handler
            .remove_data_view("u", None, Some("dataView::bi.local.v1::orders"), DeleteSemantic::Soft)
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::NotFound { .. }));

        handler
            .remove_data_view("u", None, Some("dataView::bi.local.v1"), DeleteSemantic::Hard)
            .await
            .unwrap();
        assert_eq!(handler.documents.helper().repository().stored_entity_count(), 0);
    }
}
