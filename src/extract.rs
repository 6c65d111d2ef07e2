use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde_json::json;

use crate::error::ApiError;

/// Drop-in replacements for axum's body/query/path extractors whose
/// rejections go through `ApiError`, so malformed input gets the same
/// response envelope as every other validation failure instead of axum's
/// plain-text defaults.
#[derive(Debug)]
pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    axum::Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| {
                ApiError::validation_with_details(
                    "Bad Request",
                    json!({ "body": [e.body_text()] }),
                )
            })?;
        Ok(Json(value))
    }
}

#[derive(Debug)]
pub struct Query<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    ApiError::validation_with_details(
                        "Bad Request",
                        json!({ "query": [e.body_text()] }),
                    )
                })?;
        Ok(Query(value))
    }
}

pub struct Path<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    T: serde::de::DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    ApiError::validation_with_details(
                        "Bad Request",
                        json!({ "path": [e.body_text()] }),
                    )
                })?;
        Ok(Path(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct SampleBody {
        #[allow(dead_code)]
        password: String,
    }

    #[derive(Debug, Deserialize)]
    struct SampleParams {
        #[allow(dead_code)]
        uid: Option<Uuid>,
    }

    async fn envelope_of(err: ApiError) -> serde_json::Value {
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn malformed_json_body_gets_the_envelope() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let err = Json::<SampleBody>::from_request(req, &())
            .await
            .expect_err("must reject");
        let body = envelope_of(err).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["status_code"], 400);
        assert!(body["details"]["body"][0].is_string());
    }

    #[tokio::test]
    async fn missing_field_gets_the_envelope() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"username": "alice"}"#))
            .unwrap();
        let err = Json::<SampleBody>::from_request(req, &())
            .await
            .expect_err("must reject");
        let body = envelope_of(err).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["status_code"], 400);
    }

    #[tokio::test]
    async fn unparsable_query_uuid_gets_the_envelope() {
        let (mut parts, _) = Request::builder()
            .uri("/api/auth/reset-password/?uid=not-a-uuid&token=t")
            .body(())
            .unwrap()
            .into_parts();
        let err = Query::<SampleParams>::from_request_parts(&mut parts, &())
            .await
            .expect_err("must reject");
        let body = envelope_of(err).await;
        assert_eq!(body["error"], true);
        assert!(body["details"]["query"][0].is_string());
    }
}
