use std::{fmt, str::FromStr};

use tracing::warn;

use crate::{config::AppConfig, error::AppResult};

/// PasswordEncoderKind
///
/// The single configuration switch for the hashing policy (`PASSWORD_ENCODER`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordEncoderKind {
    /// bcrypt with a configurable cost. The only value accepted in production.
    Bcrypt,
    /// Stores passwords verbatim. Intentionally insecure; for a training setup only.
    NoOp,
}

impl FromStr for PasswordEncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(PasswordEncoderKind::Bcrypt),
            "noop" | "no-op" => Ok(PasswordEncoderKind::NoOp),
            other => Err(format!("unknown password encoder '{other}'")),
        }
    }
}

impl fmt::Display for PasswordEncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordEncoderKind::Bcrypt => f.write_str("bcrypt"),
            PasswordEncoderKind::NoOp => f.write_str("noop"),
        }
    }
}

/// PasswordEncoder
///
/// One-way hashing of plaintext passwords and verification of a login attempt
/// against a stored hash.
#[derive(Clone, Debug)]
pub struct PasswordEncoder {
    kind: PasswordEncoderKind,
    cost: u32,
}

impl PasswordEncoder {
    pub fn bcrypt(cost: u32) -> Self {
        Self {
            kind: PasswordEncoderKind::Bcrypt,
            cost,
        }
    }

    /// Insecure pass-through encoder. Never use outside a training setup.
    pub fn no_op() -> Self {
        Self {
            kind: PasswordEncoderKind::NoOp,
            cost: 0,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        match config.password_encoder {
            PasswordEncoderKind::Bcrypt => Self::bcrypt(config.bcrypt_cost),
            PasswordEncoderKind::NoOp => {
                warn!("using the insecure no-op password encoder");
                Self::no_op()
            }
        }
    }

    pub fn encode(&self, raw: &str) -> AppResult<String> {
        match self.kind {
            PasswordEncoderKind::Bcrypt => Ok(bcrypt::hash(raw, self.cost)?),
            PasswordEncoderKind::NoOp => Ok(raw.to_string()),
        }
    }

    /// A malformed stored hash never matches.
    pub fn matches(&self, raw: &str, encoded: &str) -> bool {
        match self.kind {
            PasswordEncoderKind::Bcrypt => bcrypt::verify(raw, encoded).unwrap_or_else(|e| {
                warn!(error = %e, "stored password is not a valid bcrypt hash");
                false
            }),
            PasswordEncoderKind::NoOp => raw == encoded,
        }
    }
}
