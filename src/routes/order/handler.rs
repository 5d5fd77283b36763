use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;

use crate::{
    AppState,
    error::AppError,
    routes::{JsonBody, PathParam, user::User},
    utils::success_to_api_response,
};

use super::model::{Order, OrderInput, OrderUpdate};

/// 查找订单并检查当前用户是否有权访问
async fn accessible_order(pool: &PgPool, id: i32, user: &User) -> Result<Order, AppError> {
    let order = Order::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("订单", id))?;

    if !order.can_access(user) {
        tracing::warn!("User {} tried to access order {}", user, id);
        return Err(AppError::Forbidden);
    }
    Ok(order)
}

#[axum::debug_handler]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let orders = if user.is_superuser {
        Order::list(&state.pool).await?
    } else {
        Order::list_by_owner(&state.pool, user.id).await?
    };
    Ok((StatusCode::OK, success_to_api_response(orders)))
}

#[axum::debug_handler]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    let order = accessible_order(&state.pool, id, &user).await?;
    let detail = Order::detail_of(&state.pool, order).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): JsonBody<OrderInput>,
) -> Result<impl IntoResponse, AppError> {
    let order = Order::create(&state.pool, req, Some(user.id)).await?;
    let detail = Order::detail_of(&state.pool, order).await?;
    Ok((StatusCode::CREATED, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<OrderUpdate>,
) -> Result<impl IntoResponse, AppError> {
    accessible_order(&state.pool, id, &user).await?;
    let order = Order::update(&state.pool, id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(order)))
}

#[axum::debug_handler]
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    accessible_order(&state.pool, id, &user).await?;
    Order::delete(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(())))
}

#[axum::debug_handler]
pub async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path((id, item_id)), _): PathParam<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let order = accessible_order(&state.pool, id, &user).await?;
    Order::add_item(&state.pool, id, item_id).await?;
    let detail = Order::detail_of(&state.pool, order).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path((id, item_id)), _): PathParam<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let order = accessible_order(&state.pool, id, &user).await?;
    if !Order::remove_item(&state.pool, id, item_id).await? {
        return Err(AppError::NotFound(format!(
            "订单 {} 中没有菜品 {}",
            id, item_id
        )));
    }
    let detail = Order::detail_of(&state.pool, order).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}
