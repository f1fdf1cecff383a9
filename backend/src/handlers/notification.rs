//! HTTP handlers for push device registration

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::notification::RegisterTokenInput;
use crate::AppState;

#[derive(Serialize)]
pub struct TokenRemoved {
    pub removed: bool,
}

/// Register (or refresh) the caller's device token
pub async fn register_push_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegisterTokenInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.notifier.register_token(&current_user.0, input).await?;
    Ok(Json(ApiResponse::with_message((), "Push token registered")))
}

pub async fn remove_push_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(token): Path<String>,
) -> AppResult<Json<ApiResponse<TokenRemoved>>> {
    let removed = state.notifier.remove_token(&current_user.0, &token).await?;
    Ok(Json(ApiResponse::ok(TokenRemoved { removed })))
}
