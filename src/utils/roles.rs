// src/utils/roles.rs

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::group::{GroupRole, Membership},
    store::DynStore,
    utils::{extract::ApiPath, jwt::Claims},
};

/// Axum Middleware: any member of the `{group_id}` group.
///
/// Must run AFTER `auth_middleware`. Injects the caller's `Membership`.
pub async fn require_member(
    State(store): State<DynStore>,
    ApiPath(params): ApiPath<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&store, &params, req, next, GroupRole::Member).await
}

/// Axum Middleware: admins of the `{group_id}` group only.
pub async fn require_admin(
    State(store): State<DynStore>,
    ApiPath(params): ApiPath<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&store, &params, req, next, GroupRole::Admin).await
}

async fn authorize(
    store: &DynStore,
    params: &HashMap<String, String>,
    mut req: Request<Body>,
    next: Next,
    required: GroupRole,
) -> Result<Response, AppError> {
    let group_id = params
        .get("group_id")
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AppError::BadRequest("Invalid group id".to_string()))?;

    let user_id = req
        .extensions()
        .get::<Claims>()
        .ok_or(AppError::AuthError("Missing bearer token".to_string()))?
        .user_id()?;

    let role = match store.member_role(group_id, user_id).await? {
        Some(role) => role,
        None => {
            if store.find_group(group_id).await?.is_none() {
                return Err(AppError::NotFound("Group not found".to_string()));
            }
            return Err(AppError::Forbidden(
                "You are not a member of this group".to_string(),
            ));
        }
    };

    if !role.satisfies(required) {
        return Err(AppError::Forbidden(format!(
            "This action requires the {} role",
            required
        )));
    }

    req.extensions_mut().insert(Membership {
        group_id,
        user_id,
        role,
    });

    Ok(next.run(req).await)
}
