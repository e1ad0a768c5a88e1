use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;

/// JSON body extractor whose rejections use the `ApiResponse` envelope.
///
/// Well-formed JSON that does not fit the target type (an unknown status,
/// a string where a number belongs) is a validation error; anything that
/// is not JSON at all is a bad request.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(AppError::from)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => AppError::Validation(err.body_text()),
            JsonRejection::JsonSyntaxError(err) => {
                AppError::BadRequest(format!("Invalid JSON syntax: {}", err.body_text()))
            }
            JsonRejection::MissingJsonContentType(_) => {
                AppError::BadRequest("Expected Content-Type: application/json".to_string())
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

/// Query-string extractor; malformed parameters become validation errors
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(AppError::from)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query parameters: {}", rejection.body_text()))
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, routing::post, Router};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::{json, Value};

    use crate::features::reports::models::ReportStatus;

    #[derive(Deserialize)]
    struct StatusBody {
        status: ReportStatus,
    }

    #[derive(Deserialize)]
    struct PageParams {
        page: Option<i64>,
    }

    async fn echo_status(AppJson(body): AppJson<StatusBody>) -> String {
        body.status.to_string()
    }

    async fn echo_page(AppQuery(params): AppQuery<PageParams>) -> String {
        params.page.unwrap_or(1).to_string()
    }

    fn server() -> TestServer {
        let app = Router::new()
            .route("/status", post(echo_status))
            .route("/page", get(echo_page));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_enum_value_is_validation_error() {
        let response = server()
            .post("/status")
            .json(&json!({ "status": "archived" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert!(body["errors"][0].as_str().unwrap().contains("status"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let response = server()
            .post("/status")
            .content_type("application/json")
            .text("{ not json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert!(body["errors"].is_null());
    }

    #[tokio::test]
    async fn test_bad_query_uses_envelope() {
        let server = server();

        let response = server.get("/page").add_query_param("page", "x").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert!(body["errors"][0]
            .as_str()
            .unwrap()
            .starts_with("Invalid query parameters"));

        let response = server.get("/page").add_query_param("page", 3).await;
        response.assert_status_ok();
        response.assert_text("3");
    }
}
