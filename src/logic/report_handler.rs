use crate::error::{OmasError, OmasResult};
use crate::logic::document_tree::{DocumentNode, DocumentTreeWriter, NodeShape};
use crate::model::type_names::DEPLOYED_REPORT;
use crate::model::{DeleteSemantic, Guid, InstanceProperties, Report, ReportElement, QUALIFIED_NAME};
use crate::store::MetadataRepository;

impl DocumentNode for ReportElement {
    fn name(&self) -> &str {
        match self {
            ReportElement::Section { name, .. } | ReportElement::Column { name, .. } => name,
        }
    }

    fn shape(&self) -> NodeShape<'_, Self> {
        match self {
            ReportElement::Section { elements, .. } => NodeShape::Container(elements),
            ReportElement::Column { sources, .. } => NodeShape::Leaf(sources),
        }
    }

    fn properties(&self) -> InstanceProperties {
        match self {
            ReportElement::Section { .. } => InstanceProperties::new(),
            ReportElement::Column {
                formula,
                aggregating_function,
                ..
            } => InstanceProperties::new()
                .with("formula", formula.as_deref())
                .with("aggregatingFunction", aggregating_function.as_deref()),
        }
    }
}

fn report_properties(report: &Report, qualified_name: &str) -> InstanceProperties {
    InstanceProperties::new()
        .with(QUALIFIED_NAME, Some(qualified_name))
        .with("id", Some(report.id.as_str()))
        .with("name", report.report_name.as_deref())
        .with("author", report.author.as_deref())
        .with("url", report.report_url.as_deref())
        .with("createdTime", report.created_time.as_deref())
        .with("lastModifiedTime", report.last_modified_time.as_deref())
        .with("lastModifier", report.last_modifier.as_deref())
}

/// Publishes BI reports as DeployedReport assets.
pub struct ReportHandler<R> {
    documents: DocumentTreeWriter<R>,
}

impl<R> Clone for ReportHandler<R> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
        }
    }
}

impl<R: MetadataRepository + 'static> ReportHandler<R> {
    pub fn new(documents: DocumentTreeWriter<R>) -> Self {
        Self { documents }
    }

    pub async fn upsert_report(
        &self,
        user_id: &str,
        registration_qualified_name: Option<&str>,
        report: &Report,
    ) -> OmasResult<Guid> {
        if report.id.trim().is_empty() && report.qualified_name.as_deref().map_or(true, str::is_empty) {
            return Err(OmasError::invalid_parameter(
                "report.id",
                "a report needs an id or a qualified name",
            ));
        }
        let qualified_name = report.resolved_qualified_name();
        self.documents
            .upsert_document(
                user_id,
                DEPLOYED_REPORT,
                report_properties(report, &qualified_name),
                &report.report_elements,
                registration_qualified_name,
            )
            .await
    }

    pub async fn remove_report(
        &self,
        user_id: &str,
        guid: Option<&str>,
        qualified_name: Option<&str>,
        semantic: DeleteSemantic,
    ) -> OmasResult<()> {
        self.documents
            .remove_document(user_id, DEPLOYED_REPORT, guid, qualified_name, semantic)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{RegistrationHandler, RepositoryHelper};
    use crate::model::type_names::{DERIVED_SCHEMA_ATTRIBUTE, SERVER_ASSET_USE};
    use crate::model::{SoftwareServerCapability, Source};
    use crate::store::InMemoryRepository;
    use std::sync::Arc;

    fn handler() -> (ReportHandler<InMemoryRepository>, RegistrationHandler<InMemoryRepository>) {
        let helper = RepositoryHelper::new(Arc::new(InMemoryRepository::default()));
        let registration = RegistrationHandler::new(helper.clone());
        (
            ReportHandler::new(DocumentTreeWriter::new(helper, registration.clone())),
            registration,
        )
    }

    fn report() -> Report {
        Report {
            id: "42".to_string(),
            report_url: Some("bi/sales".to_string()),
            report_name: Some("Sales".to_string()),
            report_elements: vec![ReportElement::Section {
                name: "Totals".to_string(),
                elements: vec![ReportElement::Column {
                    name: "Revenue".to_string(),
                    formula: Some("sum(amount)".to_string()),
                    aggregating_function: Some("SUM".to_string()),
                    sources: vec![Source {
                        qualified_name: "db::orders::amount".to_string(),
                    }],
                }],
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn report_is_published_under_the_registered_tool() {
        let (handler, registration) = handler();
        let tool_guid = registration
            .upsert_external_source(
                "u",
                &SoftwareServerCapability {
                    qualified_name: "bi-tool".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let guid = handler.upsert_report("u", Some("bi-tool"), &report()).await.unwrap();
        let helper = handler.documents.helper();

        let entity = helper.get_entity(&guid).await.unwrap().unwrap();
        assert_eq!(entity.qualified_name(), Some("report::bi/sales"));
        assert_eq!(entity.metadata_collection_name.as_deref(), Some("bi-tool"));
        let users = helper.related_entities(&guid, SERVER_ASSET_USE).await.unwrap();
        assert_eq!(users[0].guid, tool_guid);

        let column = helper
            .find_entity_by_qualified_name(DERIVED_SCHEMA_ATTRIBUTE, "report::bi/sales::Totals::Revenue")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(column.properties.string("aggregatingFunction"), Some("SUM"));

        assert_eq!(handler.upsert_report("u", Some("bi-tool"), &report()).await.unwrap(), guid);
    }

    #[tokio::test]
    async fn unknown_registration_is_rejected() {
        let (handler, _) = handler();
        let err = handler
            .upsert_report("u", Some("nobody"), &report())
            .await
            .unwrap_err();
        assert!(matches!(err, OmasError::InvalidParameter { .. }));
    }

    #[tokio::test]
    async fn removing_a_report_removes_its_elements() {
        let (handler, _) = handler();
        handler.upsert_report("u", None, &report()).await.unwrap();
        handler
            .remove_report("u", None, Some("report::bi/sales"), DeleteSemantic::Soft)
            .await
            .unwrap();
        assert_eq!(handler.documents.helper().repository().active_entity_count(), 0);
    }
}
