use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // The root shows the login form.
        .route("/", get(handlers::login_page))
        // GET/POST /login
        // Form login. Success sets the SESSION cookie and redirects by role.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /logout
        // Clears the SESSION cookie and returns to the login page.
        .route("/logout", get(handlers::logout).post(handlers::logout))
}
