use crate::error::{AppError, AppResult};
use crate::models::{NewUser, Role, User};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so the service layer
/// works the same against Postgres and the in-memory store.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Every user returned carries its full role set.
    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    // Ordered by id ascending.
    async fn find_all_users(&self) -> AppResult<Vec<User>>;
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;
    // Overwrites the scalar fields and replaces the role set.
    async fn update_user(&self, user: &User) -> AppResult<()>;
    // Deleting an unknown id is not an error.
    async fn delete_user(&self, id: i64) -> AppResult<()>;

    // --- Roles ---
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;
    async fn insert_role(&self, name: &str) -> AppResult<Role>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

#[derive(FromRow)]
struct UserRoleRow {
    user_id: i64,
    id: i64,
    name: String,
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Each write runs in its own transaction so the user row and its `users_roles`
/// rows commit together.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_of(&self, user_id: i64) -> AppResult<BTreeSet<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN users_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles.into_iter().collect())
    }

    async fn with_roles(&self, user: Option<User>) -> AppResult<Option<User>> {
        match user {
            Some(mut user) => {
                user.roles = self.roles_of(user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, firstname, lastname, age, email, password, enabled FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(user).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, firstname, lastname, age, email, password, enabled FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        self.with_roles(user).await
    }

    /// find_all_users
    ///
    /// Two queries: the ordered user rows, then every join row, grouped in memory.
    async fn find_all_users(&self) -> AppResult<Vec<User>> {
        let mut users = sqlx::query_as::<_, User>(
            "SELECT id, firstname, lastname, age, email, password, enabled FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT ur.user_id, r.id, r.name
            FROM users_roles ur
            JOIN roles r ON r.id = ur.role_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<i64, BTreeSet<Role>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().insert(Role {
                id: row.id,
                name: row.name,
            });
        }

        for user in &mut users {
            user.roles = by_user.remove(&user.id).unwrap_or_default();
        }

        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (firstname, lastname, age, email, password, enabled)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(user.age)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.enabled)
        .fetch_one(&mut *tx)
        .await?;

        for role in &user.roles {
            sqlx::query("INSERT INTO users_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(id)
                .bind(role.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(User {
            id,
            firstname: user.firstname,
            lastname: user.lastname,
            age: user.age,
            email: user.email,
            password: user.password,
            enabled: user.enabled,
            roles: user.roles,
        })
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET firstname = $2, lastname = $3, age = $4, email = $5, password = $6, enabled = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(user.age)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.enabled)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidArgument(format!(
                "user {} does not exist",
                user.id
            )));
        }

        sqlx::query("DELETE FROM users_roles WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        for role in &user.roles {
            sqlx::query("INSERT INTO users_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> AppResult<()> {
        // users_roles rows go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_role(&self, name: &str) -> AppResult<Role> {
        Ok(
            sqlx::query_as::<_, Role>("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
                .bind(name)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

// --- In-Memory Store ---

#[derive(Debug, Default)]
struct Store {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    next_user_id: i64,
    next_role_id: i64,
}

impl Store {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// InMemoryRepository
///
/// `Repository` backed by maps behind a `RwLock`. Mirrors the Postgres constraints that
/// the service relies on: unique emails, unique role names, ids assigned from 1 upwards.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.store.read().await.users.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_all_users(&self) -> AppResult<Vec<User>> {
        Ok(self.store.read().await.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut store = self.store.write().await;

        if store.email_taken(&user.email, None) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        store.next_user_id += 1;
        let user = User {
            id: store.next_user_id,
            firstname: user.firstname,
            lastname: user.lastname,
            age: user.age,
            email: user.email,
            password: user.password,
            enabled: user.enabled,
            roles: user.roles,
        };
        store.users.insert(user.id, user.clone());

        tracing::debug!(user_id = user.id, "inserted user into memory store");
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut store = self.store.write().await;

        if !store.users.contains_key(&user.id) {
            return Err(AppError::InvalidArgument(format!(
                "user {} does not exist",
                user.id
            )));
        }
        if store.email_taken(&user.email, Some(user.id)) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        store.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> AppResult<()> {
        self.store.write().await.users.remove(&id);
        Ok(())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let store = self.store.read().await;
        Ok(store.roles.values().find(|r| r.name == name).cloned())
    }

    async fn insert_role(&self, name: &str) -> AppResult<Role> {
        let mut store = self.store.write().await;

        if store.roles.values().any(|r| r.name == name) {
            return Err(AppError::Conflict(format!("role '{name}' already exists")));
        }

        store.next_role_id += 1;
        let role = Role {
            id: store.next_role_id,
            name: name.to_string(),
        };
        store.roles.insert(role.id, role.clone());
        Ok(role)
    }
}
