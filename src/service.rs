use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{AccountCapabilities, capabilities},
    error::{AppError, AppResult},
    mapper::UserMapper,
    models::{Role, RoleDto, User, UserDto, authority_name},
    password::PasswordEncoder,
    repository::RepositoryState,
};

/// UserService
///
/// Business logic over the account store: lookups, listing with role names,
/// creation and update with role assignment, deletion, and credential checks.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    encoder: PasswordEncoder,
}

impl UserService {
    pub fn new(repo: RepositoryState, encoder: PasswordEncoder) -> Self {
        Self { repo, encoder }
    }

    pub fn encoder(&self) -> &PasswordEncoder {
        &self.encoder
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repo.delete_user(id).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.repo.find_user_by_email(email).await
    }

    /// get_all_users_with_roles
    ///
    /// Every user, ordered by id ascending, paired with its display-form role names
    /// sorted lexicographically. If the store ever yielded the same id twice, the first
    /// occurrence wins.
    pub async fn get_all_users_with_roles(&self) -> AppResult<Vec<(User, Vec<String>)>> {
        let mut users = self.repo.find_all_users().await?;
        users.sort_by_key(|user| user.id);
        users.dedup_by_key(|user| user.id);

        Ok(users
            .into_iter()
            .map(|user| {
                let roles = user.role_display_names();
                (user, roles)
            })
            .collect())
    }

    #[instrument(skip(self, dto), fields(email = %dto.email))]
    pub async fn add_user_with_roles(&self, dto: &UserDto) -> AppResult<User> {
        let mut user = UserMapper::to_model(dto);
        user.password = self.encoder.encode(&dto.password)?;
        user.roles = self.resolve_roles(&dto.roles).await?;

        let user = self.repo.insert_user(user).await?;
        info!(user_id = user.id, "user added");
        Ok(user)
    }

    /// update_user_with_roles
    ///
    /// Overwrites every editable field of an existing user. The password is always
    /// re-encoded from the submitted value; there is no keep-the-old-password path.
    #[instrument(skip(self, dto), fields(user_id = ?dto.id))]
    pub async fn update_user_with_roles(&self, dto: &UserDto) -> AppResult<User> {
        let id = dto
            .id
            .ok_or_else(|| AppError::InvalidArgument("user id is required".to_string()))?;

        let Some(mut user) = self.repo.find_user_by_id(id).await? else {
            warn!(user_id = id, "update of unknown user rejected");
            return Err(AppError::InvalidArgument(format!("user {id} does not exist")));
        };

        user.firstname = dto.firstname.clone();
        user.lastname = dto.lastname.clone();
        user.age = dto.age;
        user.email = dto.email.clone();
        user.password = self.encoder.encode(&dto.password)?;
        user.roles = self.resolve_roles(&dto.roles).await?;

        self.repo.update_user(&user).await?;
        info!(user_id = id, "user updated");
        Ok(user)
    }

    /// authenticate
    ///
    /// Verifies a login attempt. An unknown email and a wrong password are
    /// indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<AccountCapabilities> {
        let user = self
            .repo
            .find_user_by_email(email)
            .await?
            .ok_or(AppError::BadCredentials)?;

        if !self.encoder.matches(password, &user.password) {
            return Err(AppError::BadCredentials);
        }

        let account = capabilities(&user);
        if !account.enabled || !account.account_usable {
            return Err(AppError::AccountDisabled);
        }

        Ok(account)
    }

    /// Capability set of the account behind a session, if it still exists.
    pub async fn load_principal(&self, email: &str) -> AppResult<Option<AccountCapabilities>> {
        Ok(self
            .repo
            .find_user_by_email(email)
            .await?
            .map(|user| capabilities(&user)))
    }

    /// Maps display names to stored roles. Names with no stored role are dropped.
    async fn resolve_roles(&self, requested: &[RoleDto]) -> AppResult<BTreeSet<Role>> {
        let mut roles = BTreeSet::new();
        for dto in requested {
            let name = authority_name(&dto.name);
            match self.repo.find_role_by_name(&name).await? {
                Some(role) => {
                    roles.insert(role);
                }
                None => debug!(role = %dto.name, "ignoring unknown role"),
            }
        }
        Ok(roles)
    }
}
