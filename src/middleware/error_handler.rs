use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error};
use uuid::Uuid;

use crate::error::ErrorDetail;

const MAX_LOGGED_BODY: usize = 1024;

/// 为每个请求建立带 request_id 的 span，并记录 5xx 响应。
/// AppError 产生的响应带有 ErrorDetail，记录其中的内部细节；其他 5xx 记录响应体。
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    async move {
        let mut response = next.run(req).await;

        if !response.status().is_server_error() {
            return response;
        }

        if let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() {
            error!("Request failed - Status: {}, Error: {}", response.status(), detail);
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes);

        error!(
            "Server error occurred - Status: {}, Body: {}",
            parts.status, body_str
        );

        // 重置body以便重新构建响应
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::{error::AppError, utils::error_codes};

    #[tokio::test]
    async fn app_error_detail_is_consumed_once() {
        let app = Router::new()
            .route(
                "/db",
                get(|| async { Err::<(), _>(AppError::Internal("pool exhausted".into())) }),
            )
            .layer(axum::middleware::from_fn(log_errors));

        let response = app
            .oneshot(Request::get("/db").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorDetail>().is_none());

        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], error_codes::INTERNAL_ERROR);
        assert!(!body["msg"].as_str().unwrap().contains("pool exhausted"));
    }

    #[tokio::test]
    async fn server_error_body_is_preserved() {
        let app = Router::new()
            .route(
                "/boom",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route("/fine", get(|| async { "fine" }))
            .layer(axum::middleware::from_fn(log_errors));

        let response = app
            .clone()
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"boom");

        let response = app
            .oneshot(Request::get("/fine").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
