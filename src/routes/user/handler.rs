use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    AppState,
    error::AppError,
    routes::{JsonBody, PathParam},
    utils::{generate_token, success_to_api_response},
};

use super::model::{
    LoginRequest, NewUser, RegisterRequest, TokenResponse, UpdatePasswordRequest,
    UpdateProfileRequest, User,
};

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.password.is_empty() {
        return Err(AppError::Validation("密码不能为空".into()));
    }

    let user = User::create_user(&state.pool, NewUser::from(req)).await?;
    let (token, expires_at) = generate_token(user.id, &user.username, &state.config)?;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(TokenResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut user = User::get_by_natural_key(&state.pool, &req.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // 停用用户与密码错误返回同样的结果
    if !user.is_active || !user.check_password(&req.password) {
        tracing::info!("Login failed for user: {}", req.username);
        return Err(AppError::Unauthorized);
    }

    user.last_login = Some(User::record_login(&state.pool, user.id).await?);
    let (token, expires_at) = generate_token(user.id, &user.username, &state.config)?;

    Ok((
        StatusCode::OK,
        success_to_api_response(TokenResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

#[axum::debug_handler]
pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
    WithRejection(Json(req), _): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(first_name) = req.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name;
    }
    if let Some(email) = req.email {
        user.email = Some(email);
    }

    let user = user.save(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
    WithRejection(Json(req), _): JsonBody<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !user.check_password(&req.old_password) {
        return Err(AppError::Unauthorized);
    }
    if req.new_password.is_empty() {
        return Err(AppError::Validation("密码不能为空".into()));
    }

    user.update_password(&state.pool, Some(req.new_password.as_str())).await?;
    tracing::info!("Password updated for user: {}", user);
    Ok((StatusCode::OK, success_to_api_response(())))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&user)?;
    let users = User::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(users)))
}

#[axum::debug_handler]
pub async fn set_user_active(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&user)?;
    User::set_active(&state.pool, id, req.is_active).await?;
    Ok((StatusCode::OK, success_to_api_response(())))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): PathParam<i32>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&user)?;
    User::delete(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(())))
}

fn require_superuser(user: &User) -> Result<(), AppError> {
    if user.has_perm("users.manage_users") {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
