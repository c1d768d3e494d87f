use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

/// Every stored role name carries this prefix; the API speaks the bare form.
pub const ROLE_PREFIX: &str = "ROLE_";

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_USER: &str = "ROLE_USER";

// --- Persisted Records (Mapped to Database) ---

/// Role
///
/// A named permission tag from the `roles` table, e.g. `ROLE_ADMIN`.
/// The stored name is the unit of authorization matching.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

impl Role {
    /// The name with the `ROLE_` prefix stripped, as shown in the API.
    pub fn display_name(&self) -> &str {
        display_role_name(&self.name)
    }
}

/// Strips the `ROLE_` prefix from an authority name, if present.
pub fn display_role_name(authority: &str) -> &str {
    authority.strip_prefix(ROLE_PREFIX).unwrap_or(authority)
}

/// Re-adds the `ROLE_` prefix to a display-form role name.
pub fn authority_name(display: &str) -> String {
    format!("{ROLE_PREFIX}{display}")
}

/// User
///
/// The account record stored in the `users` table together with its role set
/// (loaded from `users_roles`). This is plain data; the authentication layer sees
/// it only through `auth::capabilities`.
#[derive(Debug, Clone, PartialEq, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
    // Login name. Unique in the store.
    pub email: String,
    // Always the encoded form produced by the configured `PasswordEncoder`.
    pub password: String,
    pub enabled: bool,
    #[sqlx(skip)]
    pub roles: BTreeSet<Role>,
}

impl User {
    /// Display-form role names, sorted lexicographically.
    pub fn role_display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .roles
            .iter()
            .map(|role| role.display_name().to_string())
            .collect();
        names.sort();
        names
    }
}

/// NewUser
///
/// A user that has not been persisted yet; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
    pub email: String,
    pub password: String,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
}

// --- Wire Schemas ---

/// RoleDto
///
/// A role as exchanged with the API, always in display form (`ADMIN`, not `ROLE_ADMIN`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleDto {
    pub id: Option<i64>,
    #[schema(example = "ADMIN")]
    pub name: String,
}

impl From<&Role> for RoleDto {
    fn from(role: &Role) -> Self {
        Self {
            id: Some(role.id),
            name: role.display_name().to_string(),
        }
    }
}

/// UserDto
///
/// Input and output payload of the admin API. The password is accepted on input but
/// never serialized; every missing field falls back to its default, so a delete body
/// can carry just the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct UserDto {
    pub id: Option<i64>,
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
    #[schema(example = "user@mail.ru")]
    pub email: String,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password: String,
    pub roles: Vec<RoleDto>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        let mut roles: Vec<RoleDto> = user.roles.iter().map(RoleDto::from).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            id: Some(user.id),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            age: user.age,
            email: user.email.clone(),
            password: String::new(),
            roles,
        }
    }
}

/// LoginForm
///
/// Form fields posted by the login page.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// LoginPageParams
///
/// `?error` and `?logout` flags appended by the login and logout redirects.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageParams {
    pub error: Option<String>,
    pub logout: Option<String>,
}
