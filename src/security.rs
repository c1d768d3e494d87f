//! URL-pattern access rules and the middleware that enforces them.
//!
//! Rules are evaluated in order and the first matching pattern decides. A pattern
//! ending in `/**` matches its prefix and everything below it; any other pattern
//! matches exactly (ignoring one trailing slash on the request path).

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{AppState, auth::AuthUser, error::AppError};

/// What a route requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Skips every check, including principal resolution. Used for static assets.
    Ignored,
    PermitAll,
    Authenticated,
    /// Display-form role name, e.g. `ADMIN`.
    HasRole(String),
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: String,
    pub access: Access,
}

impl AccessRule {
    pub fn new(pattern: &str, access: Access) -> Self {
        Self {
            pattern: pattern.to_string(),
            access,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path_matches(&self.pattern, path)
    }
}

pub fn path_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/**") {
        return path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
    }

    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    pattern == path
}

/// SecurityPolicy
///
/// Ordered access rules plus the access required when nothing matches.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    rules: Vec<AccessRule>,
    fallback: Access,
}

impl SecurityPolicy {
    pub fn new(rules: Vec<AccessRule>, fallback: Access) -> Self {
        Self { rules, fallback }
    }

    pub fn access_for(&self, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| &rule.access)
            .unwrap_or(&self.fallback)
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        let admin = || Access::HasRole("ADMIN".to_string());
        Self::new(
            vec![
                AccessRule::new("/css/**", Access::Ignored),
                AccessRule::new("/favIcon/**", Access::Ignored),
                AccessRule::new("/", Access::PermitAll),
                AccessRule::new("/login", Access::PermitAll),
                AccessRule::new("/logout", Access::PermitAll),
                AccessRule::new("/health", Access::PermitAll),
                AccessRule::new("/swagger-ui/**", Access::PermitAll),
                AccessRule::new("/api-docs/**", Access::PermitAll),
                AccessRule::new("/admin", admin()),
                AccessRule::new("/api/admin/**", admin()),
                AccessRule::new("/user", Access::HasRole("USER".to_string())),
            ],
            Access::Authenticated,
        )
    }
}

/// enforce_access
///
/// Applies the `SecurityPolicy` to every request. On success the resolved `AuthUser`
/// is stored in the request extensions, where the extractor picks it up again
/// without a second store lookup.
///
/// Unauthenticated callers get `401` on `/api/**` and a redirect to `/login`
/// elsewhere; authenticated callers lacking the role get `403`.
pub async fn enforce_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let access = state.policy.access_for(&path).clone();

    if matches!(access, Access::Ignored | Access::PermitAll) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let principal = AuthUser::from_request_parts(&mut parts, &state).await;

    let user = match principal {
        Ok(user) => user,
        Err(_) if path_matches("/api/**", &path) => {
            return AppError::Unauthorized.into_response();
        }
        Err(_) => return Redirect::to("/login").into_response(),
    };

    if let Access::HasRole(role) = &access {
        if !user.has_role(role) {
            tracing::warn!(principal = %user.email, %path, required = %role, "access denied");
            return AppError::Forbidden.into_response();
        }
    }

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(user);
    next.run(request).await
}
