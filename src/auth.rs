use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppResult,
    models::{ROLE_ADMIN, ROLE_USER, User, authority_name},
    service::UserService,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "SESSION";

/// Header naming an existing account to act as without logging in. Honoured only when
/// `AppConfig::local_principal_override` is set, which `load()` refuses outside `Env::Local`.
pub const LOCAL_OVERRIDE_HEADER: &str = "x-user-email";

/// Claims
///
/// Payload of the signed session token issued at login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account email, i.e. the principal name.
    pub sub: String,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AccountCapabilities
///
/// What the authentication layer needs to know about an account, and nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCapabilities {
    pub username: String,
    /// Stored role names, e.g. `ROLE_ADMIN`, sorted.
    pub authorities: Vec<String>,
    pub enabled: bool,
    /// Expiry, locking and credential expiry are not tracked; always true.
    pub account_usable: bool,
}

/// Stateless adapter from the persisted record to its capability set.
pub fn capabilities(user: &User) -> AccountCapabilities {
    let mut authorities: Vec<String> = user.roles.iter().map(|role| role.name.clone()).collect();
    authorities.sort();

    AccountCapabilities {
        username: user.email.clone(),
        authorities,
        enabled: user.enabled,
        account_usable: true,
    }
}

/// AuthUser Extractor Result
///
/// The resolved principal of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The principal name (account email).
    pub email: String,
    /// Stored role names granted to the principal.
    pub authorities: Vec<String>,
}

impl AuthUser {
    /// `role` is in display form: `has_role("ADMIN")` checks for `ROLE_ADMIN`.
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = authority_name(role);
        self.authorities.iter().any(|a| *a == wanted)
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl From<AccountCapabilities> for AuthUser {
    fn from(account: AccountCapabilities) -> Self {
        Self {
            email: account.username,
            authorities: account.authorities,
        }
    }
}

/// Signs a session token for `email`, valid for `config.session_ttl_secs`.
pub fn issue_session_token(email: &str, config: &AppConfig) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: email.to_string(),
        iat: now as usize,
        exp: (now + config.session_ttl_secs) as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

pub fn decode_session_token(token: &str, config: &AppConfig) -> AppResult<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    Ok(decode::<Claims>(token, &key, &validation)?.claims)
}

/// Post-login decision point: where a freshly authenticated principal is sent.
pub fn post_login_redirect(user: &AuthUser) -> &'static str {
    if user.has_authority(ROLE_ADMIN) {
        "/admin"
    } else if user.has_authority(ROLE_USER) {
        "/user"
    } else {
        "/"
    }
}

/// Session token from `Authorization: Bearer`, falling back to the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
    })
}

/// Loads the account behind `email` and accepts it only if it may still sign in.
async fn resolve_principal(users: &UserService, email: &str) -> Option<AuthUser> {
    match users.load_principal(email).await {
        Ok(Some(account)) if account.enabled && account.account_usable => Some(account.into()),
        Ok(_) => None,
        Err(e) => {
            tracing::error!(error = %e, "principal lookup failed");
            None
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. Resolution order:
/// 1. A principal already resolved by the security middleware (request extensions).
/// 2. Local override, when explicitly enabled: the `x-user-email` header naming an
///    existing account.
/// 3. The session token (bearer header or `SESSION` cookie), validated and then
///    re-checked against the store so deleted or disabled accounts lose access at once.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserService: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let users = UserService::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.local_principal_override && config.env == Env::Local {
            let override_email = parts
                .headers
                .get(LOCAL_OVERRIDE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            if let Some(email) = override_email {
                if let Some(user) = resolve_principal(&users, &email).await {
                    return Ok(user);
                }
            }
        }
        // Override off, or it did not name a usable account: require a token.

        let token = session_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = decode_session_token(&token, &config).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            StatusCode::UNAUTHORIZED
        })?;

        resolve_principal(&users, &claims.sub)
            .await
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
