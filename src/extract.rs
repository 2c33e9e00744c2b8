use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` with rejections folded into the API error taxonomy.
///
/// Unparseable bodies become `invalid_json`; well-formed JSON of the wrong shape
/// (e.g. a number where a string is expected) becomes `validation_error`.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(JsonRejection::JsonDataError(err)) => Err(AppError::Validation(err.body_text())),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                Err(AppError::InvalidJson)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        name: String,
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_syntax_error_is_invalid_json() {
        let result = JsonBody::<Payload>::from_request(request("{not json"), &()).await;
        assert!(matches!(result, Err(AppError::InvalidJson)));
    }

    #[tokio::test]
    async fn test_wrong_type_is_validation_error() {
        let result = JsonBody::<Payload>::from_request(request(r#"{"name": 5}"#), &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_invalid_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let result = JsonBody::<Payload>::from_request(req, &()).await;
        assert!(matches!(result, Err(AppError::InvalidJson)));
    }
}
