// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::DeviceTokenRequest,
    store::DynStore,
    utils::{extract::ApiJson, jwt::Claims},
};

/// Registers the caller's push token. `null` unregisters it.
pub async fn update_device_token(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<DeviceTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id()?;
    store
        .set_device_token(user_id, payload.token.as_deref())
        .await?;

    let message = match payload.token {
        Some(_) => "Device token registered",
        None => "Device token removed",
    };

    Ok(Json(json!({ "success": true, "message": message })))
}
