use crate::{
    AppState,
    auth::{self, AuthUser, SESSION_COOKIE},
    config::Env,
    error::{AppError, AppResult},
    models::{LoginForm, LoginPageParams, UserDto},
};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

const LOGIN_PAGE: &str = include_str!("../templates/login.html");
const ADMIN_PAGE: &str = include_str!("../templates/admin.html");
const USER_PAGE: &str = include_str!("../templates/user.html");

/// Role guard used by every admin handler on top of the router-level policy.
fn require_admin(user: &AuthUser) -> AppResult<()> {
    if user.has_role("ADMIN") {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

async fn current_user_dto(state: &AppState, user: &AuthUser) -> AppResult<UserDto> {
    state
        .users
        .find_by_email(&user.email)
        .await?
        .map(|found| UserDto::from(&found))
        .ok_or_else(|| AppError::NotFound(format!("user '{}'", user.email)))
}

// --- Admin REST Surface ---

/// get_admin_current_user
///
/// [Admin Route] The account of the calling administrator.
#[utoipa::path(
    get,
    path = "/api/admin/current-user",
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn get_admin_current_user(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserDto>> {
    require_admin(&user)?;
    Ok(Json(current_user_dto(&state, &user).await?))
}

/// get_all_users
///
/// [Admin Route] Every account ordered by id, roles in display form.
#[utoipa::path(
    get,
    path = "/api/admin/all-users",
    responses(
        (status = 200, description = "All users", body = [UserDto]),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn get_all_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserDto>>> {
    require_admin(&user)?;

    let users = state
        .users
        .get_all_users_with_roles()
        .await?
        .iter()
        .map(|(user, _)| UserDto::from(user))
        .collect();

    Ok(Json(users))
}

/// add_user
///
/// [Admin Route] Creates an account. Unknown role names are ignored.
#[utoipa::path(
    post,
    path = "/api/admin/add",
    request_body = UserDto,
    responses(
        (status = 200, description = "User added successfully", body = String),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn add_user(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UserDto>,
) -> AppResult<(StatusCode, &'static str)> {
    require_admin(&user)?;
    state.users.add_user_with_roles(&payload).await?;
    Ok((StatusCode::OK, "User added successfully"))
}

/// update_user
///
/// [Admin Route] Overwrites an account, including its password and role set.
#[utoipa::path(
    put,
    path = "/api/admin/update",
    request_body = UserDto,
    responses(
        (status = 200, description = "User updated successfully", body = String),
        (status = 400, description = "No user with that id")
    )
)]
pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UserDto>,
) -> AppResult<(StatusCode, &'static str)> {
    require_admin(&user)?;
    state.users.update_user_with_roles(&payload).await?;
    Ok((StatusCode::OK, "User updated successfully"))
}

/// delete_user
///
/// [Admin Route] Deletes the account whose id is carried in the body. Only `id` is read.
#[utoipa::path(
    delete,
    path = "/api/admin/delete",
    request_body = UserDto,
    responses(
        (status = 200, description = "User deleted successfully", body = String),
        (status = 400, description = "Missing id")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UserDto>,
) -> AppResult<(StatusCode, &'static str)> {
    require_admin(&user)?;
    let id = payload
        .id
        .ok_or_else(|| AppError::InvalidArgument("user id is required".to_string()))?;
    state.users.delete(id).await?;
    Ok((StatusCode::OK, "User deleted successfully"))
}

// --- User REST Surface ---

/// get_current_user
///
/// [Authenticated Route] The account of the caller, whatever its roles.
#[utoipa::path(
    get,
    path = "/api/user/current",
    responses((status = 200, description = "Current user", body = UserDto))
)]
pub async fn get_current_user(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserDto>> {
    Ok(Json(current_user_dto(&state, &user).await?))
}

// --- Server-Rendered Flow ---

pub async fn login_page(Query(params): Query<LoginPageParams>) -> Html<String> {
    let notice = if params.error.is_some() {
        r#"<p class="notice error">Invalid email or password.</p>"#
    } else if params.logout.is_some() {
        r#"<p class="notice">You have been logged out.</p>"#
    } else {
        ""
    };
    Html(LOGIN_PAGE.replace("{{notice}}", notice))
}

/// login
///
/// Verifies the submitted credentials, stores a session token in an HttpOnly cookie and
/// hands over to the post-login redirect. Any failure lands back on `/login?error`.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.username.trim();

    let account = match state.users.authenticate(email, &form.password).await {
        Ok(account) => account,
        Err(e) => {
            tracing::info!(%email, reason = %e, "login failed");
            return Redirect::to("/login?error").into_response();
        }
    };

    let token = match auth::issue_session_token(&account.username, &state.config) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    let user = AuthUser::from(account);
    tracing::info!(principal = %user.email, "login succeeded");

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.env == Env::Production);

    (jar.add(cookie), Redirect::to(auth::post_login_redirect(&user))).into_response()
}

/// logout
///
/// Clears the `SESSION` cookie. Tokens are stateless, so a copy of the token taken
/// before logout stays valid until its `exp` (`SESSION_TTL_SECS`).
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login?logout"),
    )
}

pub async fn admin_page(user: AuthUser) -> AppResult<Html<&'static str>> {
    require_admin(&user)?;
    Ok(Html(ADMIN_PAGE))
}

pub async fn user_page(_user: AuthUser) -> Html<&'static str> {
    Html(USER_PAGE)
}
