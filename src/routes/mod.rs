use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    error::AppError,
    middleware::{auth_middleware, log_errors},
    utils::success_to_api_response,
};
use axum_extra::extract::WithRejection;

pub mod menu;
pub mod menu_item;
pub mod order;
pub mod user;

use user::User;

/// 请求体和路径参数解析失败时也返回统一的响应格式
pub(crate) type JsonBody<T> = WithRejection<Json<T>, AppError>;
pub(crate) type PathParam<T> = WithRejection<Path<T>, AppError>;

/// 菜单和菜品的写操作需要后台人员身份
pub(crate) fn require_staff(user: &User) -> Result<(), AppError> {
    if user.can_manage_catalogue() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response("ok"))
}

/// 构建全部 API 路由（不含限流和 CORS，由 main 按部署环境添加）
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users/register", post(user::register))
        .route("/users/login", post(user::login));

    let protected_routes = Router::new()
        // 用户
        .route("/users", get(user::list_users))
        .route("/users/me", get(user::me).put(user::update_me))
        .route("/users/me/password", put(user::update_password))
        .route("/users/{id}", delete(user::delete_user))
        .route("/users/{id}/active", put(user::set_user_active))
        // 菜单
        .route("/menus", get(menu::list_menus).post(menu::create_menu))
        .route(
            "/menus/{id}",
            get(menu::get_menu)
                .put(menu::update_menu)
                .delete(menu::delete_menu),
        )
        .route("/menus/{id}/items", put(menu::set_items))
        .route(
            "/menus/{id}/items/{item_id}",
            put(menu::add_item).delete(menu::remove_item),
        )
        // 菜品
        .route(
            "/menu-items",
            get(menu_item::list_menu_items).post(menu_item::create_menu_item),
        )
        .route(
            "/menu-items/{id}",
            get(menu_item::get_menu_item)
                .put(menu_item::update_menu_item)
                .delete(menu_item::delete_menu_item),
        )
        // 订单
        .route("/orders", get(order::list_orders).post(order::create_order))
        .route(
            "/orders/{id}",
            get(order::get_order)
                .put(order::update_order)
                .delete(order::delete_order),
        )
        .route(
            "/orders/{id}/items/{item_id}",
            put(order::add_item).delete(order::remove_item),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let base_uri = state.config.api_base_uri.clone();

    Router::new()
        .nest(
            &base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::utils::{error_codes, test_config};

    fn test_state() -> AppState {
        let config = test_config();
        // 惰性连接：只在真正执行查询时才会连接数据库
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&config.database_url)
            .unwrap();
        let redis = redis::Client::open(config.redis_url.clone()).unwrap();
        AppState {
            pool,
            config,
            redis: Arc::new(redis),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["code"], error_codes::SUCCESS);
        assert_eq!(body["resp_data"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let app = router(test_state());
        for uri in ["/api/users/me", "/api/menus", "/api/orders", "/api/menu-items"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            let body = body_json(response).await;
            assert_eq!(body["code"], error_codes::AUTH_FAILED);
        }
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/orders")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_validates_before_touching_database() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/users/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username": "bad name", "password": "pw"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn register_rejects_empty_password() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/api/users/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username": "alice", "password": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_uses_error_envelope() {
        let app = router(test_state());
        for (content_type, body) in [
            ("application/json", "{not json"),
            ("application/json", r#"{"username": "alice"}"#),
            ("text/plain", r#"{"username": "alice", "password": "pw"}"#),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::post("/api/users/login")
                        .header(header::CONTENT_TYPE, content_type)
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
            let body = body_json(response).await;
            assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
            assert!(body["resp_data"].is_null());
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn staff_gate() {
        let mut user = user::sample_user(1, "staff");
        assert!(matches!(require_staff(&user), Err(AppError::Forbidden)));
        user.is_staff = true;
        assert!(require_staff(&user).is_ok());
    }
}
