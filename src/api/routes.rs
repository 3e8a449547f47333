use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::data_engine_handlers::{self as data_engine, AppState};
use crate::api::information_view_handlers as information_view;
use crate::store::MetadataRepository;

const DATA_ENGINE: &str =
    "/servers/:server_name/open-metadata/access-services/data-engine/users/:user_id";
const INFORMATION_VIEW: &str =
    "/servers/:server_name/open-metadata/access-services/information-view/users/:user_id";

pub fn create_router<R: MetadataRepository + 'static>() -> Router<AppState<R>> {
    let data_engine_routes = Router::new()
        // Registration
        .route("/registration", post(data_engine::create_external_data_engine::<R>))
        .route(
            "/registration/:qualified_name",
            get(data_engine::get_external_data_engine::<R>),
        )
        // Processes and ports
        .route("/processes", post(data_engine::upsert_processes::<R>))
        .route("/processes", delete(data_engine::delete_process::<R>))
        .route(
            "/port-implementations",
            post(data_engine::upsert_port_implementation::<R>),
        )
        .route("/port-aliases", post(data_engine::upsert_port_alias::<R>))
        .route("/ports", delete(data_engine::delete_port::<R>))
        // Schema types and lineage
        .route("/schema-types", post(data_engine::upsert_schema_type::<R>))
        .route("/schema-types", delete(data_engine::delete_schema_type::<R>))
        .route("/lineage-mappings", post(data_engine::add_lineage_mappings::<R>))
        .route("/data-flows", post(data_engine::add_data_flows::<R>))
        // Databases
        .route("/databases", post(data_engine::upsert_database::<R>))
        .route("/databases", delete(data_engine::delete_database::<R>))
        .route(
            "/database-schemas",
            delete(data_engine::delete_database_schema::<R>),
        )
        .route(
            "/relational-tables",
            post(data_engine::upsert_relational_table::<R>),
        )
        .route(
            "/relational-tables",
            delete(data_engine::delete_relational_table::<R>),
        )
        // Topics
        .route("/topics", post(data_engine::upsert_topic::<R>))
        .route("/topics", delete(data_engine::delete_topic::<R>))
        .route("/event-types", post(data_engine::upsert_event_type::<R>))
        .route("/event-types", delete(data_engine::delete_event_type::<R>))
        .route("/find", post(data_engine::find::<R>));

    let information_view_routes = Router::new()
        .route("/report", post(information_view::upsert_report::<R>))
        .route("/report", delete(information_view::delete_report::<R>))
        .route("/data-view", post(information_view::upsert_data_view::<R>))
        .route("/data-view", delete(information_view::delete_data_view::<R>));

    Router::new()
        .route("/health", get(data_engine::health_check))
        .nest(DATA_ENGINE, data_engine_routes)
        .nest(INFORMATION_VIEW, information_view_routes)
}
