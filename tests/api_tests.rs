use admin_panel::{
    AppConfig, AppState, InMemoryRepository, RepositoryState, create_router, seed,
};
use reqwest::{StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Submits the login form and returns the response (redirects are not followed).
    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .expect("login request failed")
    }

    /// Logs in and returns the `SESSION=<token>` pair for use in a Cookie header.
    async fn session_cookie(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        session_from(&response).expect("login should set the session cookie")
    }
}

fn session_from(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("SESSION="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let state = AppState::new(repo, AppConfig::default());
    seed::run(&state.repo, state.users.encoder())
        .await
        .expect("seed should succeed");

    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp { address, client }
}

// --- Public Surface ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_login_page_and_static_assets_are_public() {
    let app = spawn_app().await;

    let page = app.client.get(app.url("/login")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("name=\"username\""));

    let css = app.client.get(app.url("/css/style.css")).send().await.unwrap();
    assert_eq!(css.status(), StatusCode::OK);
}

// --- Login Flow ---

#[tokio::test]
async fn test_admin_login_redirects_to_admin_page() {
    let app = spawn_app().await;

    let response = app.login("admin@mail.ru", "admin").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with("SESSION="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_user_login_redirects_to_user_page() {
    let app = spawn_app().await;

    let response = app.login("user@mail.ru", "user").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user");
}

#[tokio::test]
async fn test_bad_credentials_redirect_back_to_login() {
    let app = spawn_app().await;

    let response = app.login("admin@mail.ru", "wrong").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error");
    assert!(session_from(&response).is_none());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("user@mail.ru", "user").await;

    let response = app
        .client
        .post(app.url("/logout"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout");
    let cleared = session_from(&response).expect("logout should expire the cookie");
    assert_eq!(cleared, "SESSION=");
}

// --- Access Control ---

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() {
    let app = spawn_app().await;

    let api = app.client.get(app.url("/api/admin/all-users")).send().await.unwrap();
    assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

    let page = app.client.get(app.url("/admin")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&page), "/login");
}

#[tokio::test]
async fn test_email_header_alone_does_not_authenticate() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/admin/all-users"))
        .header("x-user-email", "admin@mail.ru")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "unauthorized");

    let delete = app
        .client
        .delete(app.url("/api/admin/delete"))
        .header("x-user-email", "admin@mail.ru")
        .json(&json!({ "id": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_role_is_forbidden_from_admin_api() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("user@mail.ru", "user").await;

    let response = app
        .client
        .get(app.url("/api/admin/all-users"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_can_reach_both_pages() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("admin@mail.ru", "admin").await;

    for path in ["/admin", "/user"] {
        let response = app
            .client
            .get(app.url(path))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

// --- Admin REST API ---

#[tokio::test]
async fn test_all_users_lists_accounts_without_passwords() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("admin@mail.ru", "admin").await;

    let response = app
        .client
        .get(app.url("/api/admin/all-users"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let users = body.as_array().expect("array of users");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "admin@mail.ru");
    assert_eq!(users[0]["roles"][0]["name"], "ADMIN");
    assert!(users.iter().all(|user| user.get("password").is_none()));
}

#[tokio::test]
async fn test_user_lifecycle_through_admin_api() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("admin@mail.ru", "admin").await;

    // 1. Add
    let added = app
        .client
        .post(app.url("/api/admin/add"))
        .header(header::COOKIE, &cookie)
        .json(&json!({
            "firstname": "Olga",
            "lastname": "Ivanova",
            "age": 29,
            "email": "olga@mail.ru",
            "password": "olga",
            "roles": [{ "name": "USER" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), StatusCode::OK);
    assert_eq!(added.text().await.unwrap(), "User added successfully");

    // The new account can sign in with its own password.
    let olga = app.login("olga@mail.ru", "olga").await;
    assert_eq!(location(&olga), "/user");

    let listing: Value = app
        .client
        .get(app.url("/api/admin/all-users"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = listing
        .as_array()
        .unwrap()
        .iter()
        .find(|user| user["email"] == "olga@mail.ru")
        .and_then(|user| user["id"].as_i64())
        .expect("new user should be listed");

    // 2. Update (promote to admin)
    let updated = app
        .client
        .put(app.url("/api/admin/update"))
        .header(header::COOKIE, &cookie)
        .json(&json!({
            "id": id,
            "firstname": "Olga",
            "lastname": "Ivanova",
            "age": 30,
            "email": "olga@mail.ru",
            "password": "olga2",
            "roles": [{ "name": "ADMIN" }, { "name": "USER" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(updated.text().await.unwrap(), "User updated successfully");

    let promoted = app.login("olga@mail.ru", "olga2").await;
    assert_eq!(location(&promoted), "/admin");

    // 3. Delete
    let deleted = app
        .client
        .delete(app.url("/api/admin/delete"))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "id": id }))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(deleted.text().await.unwrap(), "User deleted successfully");

    let gone = app.login("olga@mail.ru", "olga2").await;
    assert_eq!(location(&gone), "/login?error");
}

#[tokio::test]
async fn test_update_unknown_id_is_bad_request() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("admin@mail.ru", "admin").await;

    let response = app
        .client
        .put(app.url("/api/admin/update"))
        .header(header::COOKIE, &cookie)
        .json(&json!({ "id": 9999, "email": "ghost@mail.ru", "password": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_argument");
}

#[tokio::test]
async fn test_current_user_endpoint_with_bearer_token() {
    let app = spawn_app().await;
    let cookie = app.session_cookie("user@mail.ru", "user").await;
    let token = cookie.trim_start_matches("SESSION=");

    let response = app
        .client
        .get(app.url("/api/user/current"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "user@mail.ru");
    assert!(body.get("password").is_none());
}
