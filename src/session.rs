//! Session identity.
//!
//! The authenticated principal is captured once into a [`SessionContext`] and
//! passed explicitly to every store and sync operation.
//!
//! Shell identity resolution order:
//! 1) CLI --user (explicit)
//! 2) PLANBOARD_USER environment variable
//! 3) Persisted value in `<data dir>/user`
//! 4) Config default (session.default_user)
//!
//! When none of these yields a value the session is unauthenticated.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};

const USER_FILENAME: &str = "user";

/// Environment variable consulted for the acting user.
pub const USER_ENV: &str = "PLANBOARD_USER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Source of the currently signed-in user.
pub trait AuthProvider {
    fn current_user(&self) -> Option<Principal>;
}

/// Auth provider with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<Principal>,
}

impl StaticAuth {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            user: Some(Principal::new(id)),
        }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<Principal> {
        self.user.clone()
    }
}

/// Explicit per-session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    principal: Principal,
}

impl SessionContext {
    /// Capture the current user; no user means no operations are permitted.
    pub fn establish(auth: &dyn AuthProvider) -> Result<Self> {
        auth.current_user()
            .filter(|principal| !principal.id.trim().is_empty())
            .map(|principal| Self { principal })
            .ok_or(Error::Unauthenticated)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> &str {
        &self.principal.id
    }
}

/// Resolve the shell user from CLI, environment, persisted value and config.
pub fn resolve_user(
    data_dir: &Path,
    cli_user: Option<&str>,
    config: &Config,
) -> Result<Option<String>> {
    if let Some(user) = non_empty(cli_user) {
        return Ok(Some(user.to_string()));
    }

    if let Ok(env_user) = std::env::var(USER_ENV) {
        if let Some(user) = non_empty(Some(env_user.as_str())) {
            return Ok(Some(user.to_string()));
        }
    }

    if let Some(user) = load_persisted_user(data_dir)? {
        return Ok(Some(user));
    }

    Ok(non_empty(Some(config.session.default_user.as_str())).map(str::to_string))
}

/// Build an auth provider for the shell.
pub fn shell_auth(data_dir: &Path, cli_user: Option<&str>, config: &Config) -> Result<StaticAuth> {
    Ok(match resolve_user(data_dir, cli_user, config)? {
        Some(user) => StaticAuth::signed_in(user),
        None => StaticAuth::signed_out(),
    })
}

/// Persist the user identity in `<data dir>/user`.
pub fn persist_user(data_dir: &Path, user: &str) -> Result<PathBuf> {
    let user = non_empty(Some(user))
        .ok_or_else(|| Error::InvalidArgument("user id cannot be empty".to_string()))?;

    let path = user_path(data_dir);
    crate::lock::write_atomic_str(&path, &format!("{user}\n"))?;
    Ok(path)
}

/// Load the user identity from `<data dir>/user`, if present.
pub fn load_persisted_user(data_dir: &Path) -> Result<Option<String>> {
    let path = user_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    Ok(non_empty(Some(raw.as_str())).map(str::to_string))
}

pub fn user_path(data_dir: &Path) -> PathBuf {
    data_dir.join(USER_FILENAME)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
