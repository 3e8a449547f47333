pub mod data_view_handler;
pub mod database_handler;
pub mod document_tree;
pub mod fan_out;
pub mod finder;
pub mod port_handler;
pub mod process_handler;
pub mod registration;
pub mod report_handler;
pub mod repository_helper;
pub mod schema_type_handler;
pub mod services;
pub mod topic_handler;

pub use data_view_handler::DataViewHandler;
pub use database_handler::DatabaseHandler;
pub use document_tree::{DocumentNode, DocumentTreeWriter, NodeShape};
pub use fan_out::{fan_out, run_concurrently};
pub use finder::Finder;
pub use port_handler::PortHandler;
pub use process_handler::ProcessHandler;
pub use registration::RegistrationHandler;
pub use report_handler::ReportHandler;
pub use repository_helper::RepositoryHelper;
pub use schema_type_handler::SchemaTypeHandler;
pub use services::OmasServices;
pub use topic_handler::TopicHandler;
