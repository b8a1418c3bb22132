use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::db::Store;
use crate::core::errors::{Error, Result};
use crate::core::helpers::{hash_password, now, title_case, verify_password};
use crate::models::models::{NewUser, User, UserId};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 30;
pub const MAX_ABOUT_ME_LENGTH: usize = 140;

/// Input shape for [`create`]; normalization and validation happen here,
/// not at the call site.
#[derive(Clone, Debug, Default)]
pub struct NewUserInput {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub about_me: Option<String>,
    pub social_id: Option<String>,
}

fn check_password_policy(password: &str) -> Result<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(Error::Validation { field: "password" });
    }
    Ok(())
}

fn check_about_me(about_me: &str) -> Result<()> {
    if about_me.chars().count() > MAX_ABOUT_ME_LENGTH {
        return Err(Error::Validation { field: "about_me" });
    }
    Ok(())
}

/// Creates a user: normalizes the username to title case and the email to
/// lowercase, hashes the password if one was given, and seeds the
/// self-follow edge so the new user's own posts show up in its feed.
///
/// The duplicate pre-checks give a friendly error; the store's uniqueness
/// constraints remain the authoritative guard against concurrent creators.
pub fn create(store: &dyn Store, input: NewUserInput) -> Result<User> {
    let username = title_case(&input.username);
    let email = input.email.to_lowercase();

    if username.is_empty() {
        return Err(Error::Validation { field: "username" });
    }
    if email.is_empty() {
        return Err(Error::Validation { field: "email" });
    }
    if let Some(about_me) = &input.about_me {
        check_about_me(about_me)?;
    }

    let password_hash = match &input.password {
        Some(password) => {
            check_password_policy(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    if store.user_by_email(&email)?.is_some() {
        debug!(%email, "registration rejected: email in use");
        return Err(Error::DuplicateEmail);
    }
    if store.user_by_username(&username)?.is_some() {
        debug!(%username, "registration rejected: username in use");
        return Err(Error::DuplicateUsername);
    }

    let user = store.insert_user(NewUser {
        username,
        email,
        password_hash,
        about_me: input.about_me,
        social_id: input.social_id,
    })?;

    // Every account follows itself from birth.
    store.insert_edge(user.id, user.id)?;

    debug!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

/// Title-cases `base` and probes `base`, `base2`, `base3`, ... until a free
/// username is found. Unbounded: the suffix sequence is externally
/// observable and callers depend on it.
pub fn create_unique_username(store: &dyn Store, base: &str) -> Result<String> {
    let base = title_case(base);
    if store.user_by_username(&base)?.is_none() {
        return Ok(base);
    }
    let mut version = 2u64;
    loop {
        let candidate = format!("{base}{version}");
        if store.user_by_username(&candidate)?.is_none() {
            return Ok(candidate);
        }
        version += 1;
    }
}

pub fn find_by_id(store: &dyn Store, id: UserId) -> Result<Option<User>> {
    store.user_by_id(id)
}

pub fn find_by_email(store: &dyn Store, email: &str) -> Result<Option<User>> {
    store.user_by_email(&email.to_lowercase())
}

pub fn find_by_username(store: &dyn Store, username: &str) -> Result<Option<User>> {
    store.user_by_username(&title_case(username))
}

pub fn find_by_social_id(store: &dyn Store, social_id: &str) -> Result<Option<User>> {
    store.user_by_social_id(social_id)
}

/// Re-hashes and persists a new password. Outstanding remember-me tokens
/// die with the old fingerprint; there is no revocation list.
pub fn set_password(store: &dyn Store, user: &mut User, password: &str) -> Result<()> {
    check_password_policy(password)?;
    user.password_hash = Some(hash_password(password)?);
    store.update_user(user)
}

/// Verifies a plaintext password. `false`, not an error, when the account
/// has no password set.
pub fn check_password(user: &User, password: &str) -> bool {
    match &user.password_hash {
        Some(hash) => verify_password(password, hash),
        None => false,
    }
}

/// Input shape for [`update_profile`]. Absent or empty fields keep their
/// current values, matching form-style edits.
#[derive(Clone, Debug, Default)]
pub struct ProfileEdit {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub about_me: Option<String>,
}

/// Edits the mutable profile fields. A new username re-normalizes to title
/// case and a new email to lowercase, both re-checked for collisions (the
/// store constraint stays authoritative); a new password goes through the
/// length policy and re-hashes, killing outstanding tokens. Nothing is
/// persisted when any field fails.
pub fn update_profile(store: &dyn Store, user: &mut User, edit: ProfileEdit) -> Result<()> {
    let username = match edit.username.filter(|s| !s.is_empty()) {
        Some(name) => {
            let name = title_case(&name);
            if name != user.username && store.user_by_username(&name)?.is_some() {
                debug!(user_id = user.id, %name, "profile edit rejected: username in use");
                return Err(Error::DuplicateUsername);
            }
            Some(name)
        }
        None => None,
    };
    let email = match edit.email.filter(|s| !s.is_empty()) {
        Some(email) => {
            let email = email.to_lowercase();
            if email != user.email && store.user_by_email(&email)?.is_some() {
                debug!(user_id = user.id, "profile edit rejected: email in use");
                return Err(Error::DuplicateEmail);
            }
            Some(email)
        }
        None => None,
    };
    let password_hash = match edit.password.filter(|s| !s.is_empty()) {
        Some(password) => {
            check_password_policy(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };
    let about_me = match edit.about_me.filter(|s| !s.is_empty()) {
        Some(text) => {
            check_about_me(&text)?;
            Some(text)
        }
        None => None,
    };

    if let Some(name) = username {
        user.username = name;
    }
    if let Some(email) = email {
        user.email = email;
    }
    if let Some(hash) = password_hash {
        user.password_hash = Some(hash);
    }
    if let Some(text) = about_me {
        user.about_me = Some(text);
    }
    store.update_user(user)
}

/// Stamps `last_seen`; called on every authenticated request.
pub fn mark_seen(store: &dyn Store, user: &mut User) -> Result<()> {
    user.last_seen = Some(now());
    store.update_user(user)
}

/// Deterministic gravatar-style avatar URL: hex SHA-256 of the lowercased
/// email plus the requested pixel size. Pure, no I/O.
pub fn avatar_address(user: &User, size: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.email.to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{:x}?d=mm&s={}",
        hasher.finalize(),
        size
    )
}
