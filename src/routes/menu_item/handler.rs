use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    error::AppError,
    routes::{JsonBody, PathParam, require_staff, user::User},
    utils::success_to_api_response,
};

use super::model::{MenuItem, MenuItemInput};

#[axum::debug_handler]
pub async fn list_menu_items(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let items = MenuItem::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(items)))
}

#[axum::debug_handler]
pub async fn get_menu_item(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    let detail = MenuItem::detail(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn create_menu_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): JsonBody<MenuItemInput>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    let item = MenuItem::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(item)))
}

#[axum::debug_handler]
pub async fn update_menu_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<MenuItemInput>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    let item = MenuItem::update(&state.pool, id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(item)))
}

#[axum::debug_handler]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    MenuItem::delete(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(())))
}
