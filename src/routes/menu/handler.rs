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

use super::model::{Menu, MenuInput, MenuUpdate, SetItemsRequest};

#[axum::debug_handler]
pub async fn list_menus(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let menus = Menu::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(menus)))
}

#[axum::debug_handler]
pub async fn get_menu(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    let detail = Menu::detail(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn create_menu(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): JsonBody<MenuInput>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    let menu = Menu::create(&state.pool, req).await?;
    let detail = Menu::detail(&state.pool, menu.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn update_menu(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<MenuUpdate>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    let menu = Menu::update(&state.pool, id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(menu)))
}

#[axum::debug_handler]
pub async fn delete_menu(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    Menu::delete(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(())))
}

#[axum::debug_handler]
pub async fn set_items(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<SetItemsRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    Menu::set_items(&state.pool, id, &req.menu_items).await?;
    let detail = Menu::detail(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path((id, item_id)), _): PathParam<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    Menu::add_item(&state.pool, id, item_id).await?;
    let detail = Menu::detail(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path((id, item_id)), _): PathParam<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&user)?;
    if !Menu::remove_item(&state.pool, id, item_id).await? {
        return Err(AppError::NotFound(format!(
            "菜单 {} 中没有菜品 {}",
            id, item_id
        )));
    }
    let detail = Menu::detail(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}
