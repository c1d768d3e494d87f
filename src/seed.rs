use std::collections::BTreeSet;

use tracing::info;

use crate::{
    error::AppResult,
    models::{NewUser, ROLE_ADMIN, ROLE_USER, Role},
    password::PasswordEncoder,
    repository::RepositoryState,
};

struct DemoAccount {
    firstname: &'static str,
    lastname: &'static str,
    email: &'static str,
    age: i32,
    password: &'static str,
    roles: &'static [&'static str],
}

const DEMO_ACCOUNTS: [DemoAccount; 2] = [
    DemoAccount {
        firstname: "admin",
        lastname: "admin",
        email: "admin@mail.ru",
        age: 30,
        password: "admin",
        roles: &[ROLE_ADMIN, ROLE_USER],
    },
    DemoAccount {
        firstname: "user",
        lastname: "User",
        email: "user@mail.ru",
        age: 30,
        password: "user",
        roles: &[ROLE_USER],
    },
];

/// What a seed run actually inserted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub users_created: usize,
}

/// run
///
/// Inserts `ROLE_ADMIN`, `ROLE_USER` and the two demo accounts. Every record is guarded
/// by an existence check, so running it against an already seeded store changes nothing.
pub async fn run(repo: &RepositoryState, encoder: &PasswordEncoder) -> AppResult<SeedReport> {
    let mut report = SeedReport::default();

    let mut roles = Vec::new();
    for name in [ROLE_ADMIN, ROLE_USER] {
        let role = match repo.find_role_by_name(name).await? {
            Some(role) => role,
            None => {
                report.roles_created += 1;
                repo.insert_role(name).await?
            }
        };
        roles.push(role);
    }

    for account in &DEMO_ACCOUNTS {
        if repo.find_user_by_email(account.email).await?.is_some() {
            continue;
        }

        let granted: BTreeSet<Role> = roles
            .iter()
            .filter(|role| account.roles.contains(&role.name.as_str()))
            .cloned()
            .collect();

        repo.insert_user(NewUser {
            firstname: account.firstname.to_string(),
            lastname: account.lastname.to_string(),
            age: account.age,
            email: account.email.to_string(),
            password: encoder.encode(account.password)?,
            enabled: true,
            roles: granted,
        })
        .await?;
        report.users_created += 1;
    }

    info!(
        roles_created = report.roles_created,
        users_created = report.users_created,
        "seed data applied"
    );
    Ok(report)
}
