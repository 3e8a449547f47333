use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::api::exception_handler::{error_reply, ErrorReply};
use crate::error::OmasError;

/// JSON body extractor whose rejections come back as the usual error body.
///
/// A body that is missing, malformed or of the wrong shape is reported as a
/// 400 `InvalidParameterException` instead of axum's plain-text rejection.
pub struct RequestJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for RequestJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ErrorReply;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(body)) => Ok(RequestJson(body)),
            Err(rejection) => Err(error_reply(OmasError::invalid_parameter(
                "requestBody",
                rejection.body_text(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Named {
        qualified_name: String,
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn wrong_shape_becomes_an_invalid_parameter() {
        let Err((status, Json(body))) =
            RequestJson::<Named>::from_request(json_request(r#"{"displayName":"x"}"#), &()).await
        else {
            panic!("a body without qualifiedName was accepted");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.related_http_code, 400);
        assert_eq!(body.exception_class_name, "InvalidParameterException");
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let RequestJson(named) =
            RequestJson::<Named>::from_request(json_request(r#"{"qualifiedName":"etl::job"}"#), &())
                .await
                .unwrap_or_else(|_| panic!("rejected a valid body"));
        assert_eq!(named.qualified_name, "etl::job");
    }
}
