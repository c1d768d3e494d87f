use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// The admin page and the user-management REST API. Every handler re-checks the
/// ADMIN role in addition to the router-level policy.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::admin_page))
        .nest("/api/admin", api_routes())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/current-user
        .route("/current-user", get(handlers::get_admin_current_user))
        // GET /api/admin/all-users
        // Every account ordered by id.
        .route("/all-users", get(handlers::get_all_users))
        // POST /api/admin/add
        .route("/add", post(handlers::add_user))
        // PUT /api/admin/update
        // Full overwrite, password re-encoded, roles replaced.
        .route("/update", put(handlers::update_user))
        // DELETE /api/admin/delete
        // Body carries the id.
        .route("/delete", delete(handlers::delete_user))
}
