// src/handlers/groups.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::group::{AddMemberRequest, CreateGroupRequest, Membership},
    store::DynStore,
    utils::{extract::ApiJson, html::clean_html, jwt::Claims},
};

/// Creates a study group. The caller becomes its admin.
pub async fn create_group(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Length limits hold for the stored, sanitized text.
    let payload = CreateGroupRequest {
        name: clean_html(&payload.name),
        description: payload.description.as_deref().map(clean_html),
    };
    payload.validate()?;

    let owner_id = claims.user_id()?;
    let group = store
        .create_group(&payload.name, payload.description.as_deref(), owner_id)
        .await?;

    tracing::info!(group_id = group.id, owner_id, "Group created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "group": group })),
    ))
}

/// Groups the caller belongs to.
pub async fn list_my_groups(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let groups = store.list_groups_for_user(claims.user_id()?).await?;
    Ok(Json(json!({ "success": true, "groups": groups })))
}

/// Lists members of the group. Members only.
pub async fn list_members(
    State(store): State<DynStore>,
    Extension(membership): Extension<Membership>,
) -> Result<impl IntoResponse, AppError> {
    let members = store.list_members(membership.group_id).await?;
    Ok(Json(json!({ "success": true, "members": members })))
}

/// Adds a user to the group with the given role. Admin only.
pub async fn add_member(
    State(store): State<DynStore>,
    Extension(membership): Extension<Membership>,
    ApiJson(payload): ApiJson<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    store
        .add_member(membership.group_id, payload.user_id, payload.role)
        .await?;

    tracing::info!(
        group_id = membership.group_id,
        user_id = payload.user_id,
        role = %payload.role,
        "Member added"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "member": { "userId": payload.user_id, "role": payload.role },
        })),
    ))
}
