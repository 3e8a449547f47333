use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::exception_handler::{error_reply, ErrorReply};
use crate::api::request_body::RequestJson;
use crate::api::instance::ServerInstance;
use crate::error::OmasError;
use crate::logic::OmasServices;
use crate::model::type_names::PROCESS;
use crate::model::{
    DataFlowsRequestBody, DatabaseRequestBody, DeleteRequestBody, EventTypeRequestBody,
    FanOutResponse, FindRequestBody, GUIDListResponse, GUIDResponse, LineageMappingsRequestBody,
    PortAliasRequestBody, PortImplementationRequestBody, ProcessesRequestBody,
    RegistrationRequestBody, RelationalTableRequestBody, SchemaTypeRequestBody, TopicRequestBody,
    UpdateSemantic, VoidResponse,
};
use crate::store::MetadataRepository;

pub type AppState<R> = Arc<ServerInstance<R>>;

type ApiResult<T> = Result<Json<T>, ErrorReply>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub async fn create_external_data_engine<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<RegistrationRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .registration
        .upsert_external_source(&user_id, &body.software_server_capability)
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn get_external_data_engine<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id, qualified_name)): Path<(String, String, String)>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    match services
        .registration
        .get_external_source_guid(&qualified_name)
        .await
        .map_err(error_reply)?
    {
        Some(guid) => Ok(Json(GUIDResponse::new(guid))),
        None => Err(error_reply(OmasError::not_found(
            "SoftwareServerCapability",
            format!("qualified name '{}'", qualified_name),
        ))),
    }
}

pub async fn upsert_processes<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<ProcessesRequestBody>,
) -> ApiResult<FanOutResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let response = services
        .processes
        .upsert_processes(&user_id, body.processes, non_empty(&body.external_source_name))
        .await;
    if response.has_failures() {
        log::warn!(
            "{} of {} processes failed for {}",
            response.failed_items.len(),
            response.failed_items.len() + response.guids.len(),
            user_id
        );
    }
    Ok(Json(response))
}

pub async fn delete_process<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .processes
        .remove_process(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

/// The request's external source, rejected when it names an unregistered engine.
async fn registered_source<'a, R: MetadataRepository + 'static>(
    services: &OmasServices<R>,
    external_source_name: &'a Option<String>,
) -> Result<Option<&'a str>, ErrorReply> {
    let source = non_empty(external_source_name);
    services
        .registration
        .validate_external_source(source)
        .await
        .map_err(error_reply)?;
    Ok(source)
}

/// Resolve the optional owning process of a port request.
async fn owning_process<R: MetadataRepository + 'static>(
    services: &OmasServices<R>,
    process_qualified_name: Option<&str>,
) -> Result<Option<String>, ErrorReply> {
    match process_qualified_name {
        Some(qualified_name) => services
            .helper
            .require_entity_by_qualified_name(PROCESS, qualified_name, "processQualifiedName")
            .await
            .map(|process| Some(process.guid))
            .map_err(error_reply),
        None => Ok(None),
    }
}

pub async fn upsert_port_implementation<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<PortImplementationRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let source = registered_source(services, &body.external_source_name).await?;
    let process_guid = owning_process(services, non_empty(&body.process_qualified_name)).await?;
    let guid = services
        .ports
        .upsert_port_implementation(
            &user_id,
            &body.port_implementation,
            process_guid.as_deref(),
            source,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn upsert_port_alias<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<PortAliasRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let source = registered_source(services, &body.external_source_name).await?;
    let process_guid = owning_process(services, non_empty(&body.process_qualified_name)).await?;
    let guid = services
        .ports
        .upsert_port_alias(
            &user_id,
            &body.port_alias,
            process_guid.as_deref(),
            source,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_port<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .ports
        .remove_port(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn upsert_schema_type<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<SchemaTypeRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    if body.schema_type.qualified_name.trim().is_empty() {
        return Err(error_reply(OmasError::invalid_parameter(
            "schemaType.qualifiedName",
            "a schema type needs a qualified name",
        )));
    }
    let source = registered_source(services, &body.external_source_name).await?;
    let guid = services
        .schema_types
        .upsert_schema_type(
            &user_id,
            &body.schema_type,
            UpdateSemantic::Replace,
            source,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_schema_type<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .schema_types
        .remove_schema_type(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn add_lineage_mappings<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<LineageMappingsRequestBody>,
) -> ApiResult<FanOutResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    registered_source(services, &body.external_source_name).await?;
    Ok(Json(
        services
            .schema_types
            .add_lineage_mappings(&user_id, body.lineage_mappings)
            .await,
    ))
}

pub async fn add_data_flows<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DataFlowsRequestBody>,
) -> ApiResult<FanOutResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    registered_source(services, &body.external_source_name).await?;
    Ok(Json(
        services
            .processes
            .add_data_flows(&user_id, body.data_flows)
            .await,
    ))
}

pub async fn upsert_database<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DatabaseRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .databases
        .upsert_database(&user_id, &body.database, non_empty(&body.external_source_name))
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn upsert_relational_table<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<RelationalTableRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .databases
        .upsert_relational_table(
            &user_id,
            &body.database_schema_qualified_name,
            &body.relational_table,
            non_empty(&body.external_source_name),
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_database<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .databases
        .remove_database(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn delete_database_schema<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .databases
        .remove_database_schema(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn delete_relational_table<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .databases
        .remove_relational_table(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn upsert_topic<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<TopicRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .topics
        .upsert_topic(&user_id, &body.topic, non_empty(&body.external_source_name))
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn upsert_event_type<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<EventTypeRequestBody>,
) -> ApiResult<GUIDResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .topics
        .upsert_event_type(
            &user_id,
            &body.topic_qualified_name,
            &body.event_type,
            non_empty(&body.external_source_name),
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_topic<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .topics
        .remove_topic(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn delete_event_type<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> ApiResult<VoidResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .topics
        .remove_event_type(
            &user_id,
            non_empty(&body.guid),
            non_empty(&body.qualified_name),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn find<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<FindRequestBody>,
) -> ApiResult<GUIDListResponse> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guids = services
        .finder
        .find_guids(non_empty(&body.type_name), &body.qualified_name)
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDListResponse::new(guids)))
}
