// src/routes.rs

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    handlers::{auth, groups, profile, quiz},
    state::AppState,
    utils::{
        jwt::auth_middleware,
        roles::{require_admin, require_member},
    },
};

/// Assembles the main application router.
///
/// * Public auth routes, then bearer-protected user and group routes.
///   Auth is a route layer, so unknown paths reach the 404 fallback.
/// * Group routes are additionally gated by the caller's role in `{group_id}`.
/// * Global middleware: Trace, CORS, request timeout.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/me/device-token", put(profile::update_device_token))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let member_routes = Router::new()
        .route("/{group_id}/members", get(groups::list_members))
        .route("/{group_id}/quizzes", get(quiz::list_quizzes))
        .route("/{group_id}/quiz/{quiz_id}", get(quiz::get_quiz))
        .route("/{group_id}/quiz/{quiz_id}/submit", post(quiz::submit_quiz))
        .route("/{group_id}/quiz/{quiz_id}/review-plan", get(quiz::review_plan))
        .route_layer(from_fn_with_state(state.clone(), require_member));

    let admin_routes = Router::new()
        .route("/{group_id}/members", post(groups::add_member))
        .route("/{group_id}/quiz", post(quiz::create_quiz))
        .route("/{group_id}/quiz/{quiz_id}", delete(quiz::delete_quiz))
        .route("/{group_id}/quiz/{quiz_id}/analysis", get(quiz::quiz_analysis))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    // Auth first, then the group role check
    let group_routes = Router::new()
        .merge(member_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let group_root = Router::new()
        .route(
            "/api/groups",
            post(groups::create_group).get(groups::list_my_groups),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/groups", group_routes)
        .merge(group_root)
        .fallback(route_not_found)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
