use std::sync::Arc;

use crate::logic::{
    DataViewHandler, DatabaseHandler, DocumentTreeWriter, Finder, PortHandler, ProcessHandler,
    RegistrationHandler, ReportHandler, RepositoryHelper, SchemaTypeHandler, TopicHandler,
};
use crate::store::MetadataRepository;

/// Every handler of one server instance, wired to the same repository.
pub struct OmasServices<R> {
    pub helper: RepositoryHelper<R>,
    pub registration: RegistrationHandler<R>,
    pub processes: ProcessHandler<R>,
    pub ports: PortHandler<R>,
    pub schema_types: SchemaTypeHandler<R>,
    pub databases: DatabaseHandler<R>,
    pub topics: TopicHandler<R>,
    pub reports: ReportHandler<R>,
    pub data_views: DataViewHandler<R>,
    pub finder: Finder<R>,
}

impl<R: MetadataRepository + 'static> OmasServices<R> {
    pub fn new(repository: Arc<R>, local_metadata_collection: Option<&str>) -> Self {
        let mut helper = RepositoryHelper::new(repository);
        if let Some(name) = local_metadata_collection.filter(|n| !n.is_empty()) {
            helper = helper.with_local_metadata_collection(name);
        }

        let registration = RegistrationHandler::new(helper.clone());
        let schema_types = SchemaTypeHandler::new(helper.clone());
        let ports = PortHandler::new(helper.clone(), schema_types.clone());
        let documents = DocumentTreeWriter::new(helper.clone(), registration.clone());

        Self {
            processes: ProcessHandler::new(
                helper.clone(),
                ports.clone(),
                schema_types.clone(),
                registration.clone(),
            ),
            databases: DatabaseHandler::new(helper.clone(), registration.clone()),
            topics: TopicHandler::new(helper.clone(), schema_types.clone(), registration.clone()),
            reports: ReportHandler::new(documents.clone()),
            data_views: DataViewHandler::new(documents),
            finder: Finder::new(helper.clone()),
            helper,
            registration,
            ports,
            schema_types,
        }
    }
}
