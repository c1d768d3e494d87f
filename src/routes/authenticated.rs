use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints for any signed-in account. `/user` additionally requires the USER role
/// through the security policy.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /user
        // Page shell listing the caller's own account.
        .route("/user", get(handlers::user_page))
        // GET /api/user/current
        // The caller's account, password omitted.
        .route("/api/user/current", get(handlers::get_current_user))
}
