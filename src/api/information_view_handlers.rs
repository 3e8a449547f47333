use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::api::data_engine_handlers::AppState;
use crate::api::exception_handler::{error_reply, ErrorReply};
use crate::api::request_body::RequestJson;
use crate::model::{DataViewRequestBody, DeleteRequestBody, GUIDResponse, ReportRequestBody, VoidResponse};
use crate::store::MetadataRepository;

pub async fn upsert_report<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<ReportRequestBody>,
) -> Result<Json<GUIDResponse>, ErrorReply> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .reports
        .upsert_report(
            &user_id,
            body.registration_qualified_name.as_deref().filter(|r| !r.is_empty()),
            &body.report,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_report<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> Result<Json<VoidResponse>, ErrorReply> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .reports
        .remove_report(
            &user_id,
            body.guid.as_deref(),
            body.qualified_name.as_deref(),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}

pub async fn upsert_data_view<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DataViewRequestBody>,
) -> Result<Json<GUIDResponse>, ErrorReply> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    let guid = services
        .data_views
        .upsert_data_view(
            &user_id,
            body.registration_qualified_name.as_deref().filter(|r| !r.is_empty()),
            &body.data_view,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(GUIDResponse::new(guid)))
}

pub async fn delete_data_view<R: MetadataRepository + 'static>(
    State(instance): State<AppState<R>>,
    Path((server_name, user_id)): Path<(String, String)>,
    RequestJson(body): RequestJson<DeleteRequestBody>,
) -> Result<Json<VoidResponse>, ErrorReply> {
    let services = instance.services_for(&server_name, &user_id).map_err(error_reply)?;
    services
        .data_views
        .remove_data_view(
            &user_id,
            body.guid.as_deref(),
            body.qualified_name.as_deref(),
            body.delete_semantic,
        )
        .await
        .map_err(error_reply)?;
    Ok(Json(VoidResponse::default()))
}
