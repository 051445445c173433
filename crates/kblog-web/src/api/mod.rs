mod admin_handlers;
mod auth_handlers;

use axum::http::{header, HeaderName, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{require_auth, REFRESH_TOKEN_HEADER};
use crate::middleware::{rate_limit, rbac};
use crate::state::AppState;

/// Routes under `/api`, grouped by rate-limit tier.
///
/// - auth tier: registration, login, refresh
/// - private tier: everything that needs a bearer token; the admin routes
///   additionally go through RBAC
/// - public tier: health
pub fn router(state: &AppState) -> Router<AppState> {
    let auth = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/refresh", post(auth_handlers::refresh))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::auth_tier));

    let admin = Router::new()
        .route("/user", post(admin_handlers::create_user))
        .route("/user/{id}", delete(admin_handlers::delete_user))
        .route("/user/{id}/role", put(admin_handlers::update_user_roles))
        .route(
            "/role/{id}/permission",
            put(admin_handlers::update_role_permissions),
        )
        .route_layer(from_fn_with_state(state.clone(), rbac::require_permission));

    // Layers run bottom-up: authentication first, so the private tier
    // counts by user id.
    let private = Router::new()
        .route("/logout", post(auth_handlers::logout))
        .route("/me/permissions", get(auth_handlers::my_permissions))
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), rate_limit::private_tier))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/health", get(auth_handlers::health))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::public_tier));

    Router::new().merge(auth).merge(private).merge(public)
}

pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ]);
    let body_limit = state.config.max_body_kb * 1024;

    Router::new()
        .nest("/api", router(&state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
