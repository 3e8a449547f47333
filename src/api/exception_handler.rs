use axum::{http::StatusCode, Json};

use crate::error::OmasError;
use crate::model::FFDCResponse;

/// Error half of every handler result.
pub type ErrorReply = (StatusCode, Json<FFDCResponse>);

pub fn status_code(error: &OmasError) -> StatusCode {
    match error {
        OmasError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        OmasError::PropertyServer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        OmasError::UserNotAuthorized(_) => StatusCode::FORBIDDEN,
        OmasError::EntityNotDeleted(_) => StatusCode::CONFLICT,
        OmasError::FunctionNotSupported(_) => StatusCode::NOT_IMPLEMENTED,
        OmasError::NotFound { .. } => StatusCode::NOT_FOUND,
    }
}

pub fn error_reply(error: OmasError) -> ErrorReply {
    let status = status_code(&error);
    if status.is_server_error() {
        log::error!("{}", error);
    } else {
        log::debug!("Request rejected: {}", error);
    }
    (
        status,
        Json(FFDCResponse {
            related_http_code: status.as_u16(),
            exception_class_name: error.exception_class_name().to_string(),
            exception_error_message: error.to_string(),
            exception_user_action: error.user_action().to_string(),
        }),
    )
}
