use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Config;
use crate::core::db::Store;
use crate::core::errors::{Error, Result};
use crate::core::helpers::now;
use crate::models::models::{User, UserId};
use crate::users;

/// Signed payload of a remember-me token. The fingerprint is the stored
/// password hash at issuance time; a password change invalidates every
/// outstanding token by mismatch. This is the sole revocation mechanism.
#[derive(Serialize, Deserialize)]
struct TokenClaims {
    user_id: UserId,
    fingerprint: String,
    issued_at: i64,
}

fn sign(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(payload.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Issues a signed, time-limited token bound to the user's current
/// credential fingerprint. Format: `base64url(claims).base64url(signature)`.
pub fn issue_token(config: &Config, user: &User) -> String {
    let claims = TokenClaims {
        user_id: user.id,
        fingerprint: user.password_hash.clone().unwrap_or_default(),
        issued_at: now().timestamp(),
    };
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims always serialize"));
    let signature = sign(&config.secret_key, &payload);
    format!("{payload}.{signature}")
}

/// Verifies a token and resolves the user id it names. Fails closed: bad
/// structure, bad signature, stale issuance, unknown user and fingerprint
/// mismatch all come back as `Ok(None)`, with the reason visible only in
/// debug logs. A store failure is not a rejection and propagates as `Err`.
pub fn verify_token(store: &dyn Store, config: &Config, token: &str) -> Result<Option<UserId>> {
    let Some((payload, signature)) = token.rsplit_once('.') else {
        return Ok(None);
    };
    if sign(&config.secret_key, payload) != signature {
        debug!("token rejected: bad signature");
        return Ok(None);
    }

    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload) else {
        return Ok(None);
    };
    let Ok(claims) = serde_json::from_slice::<TokenClaims>(&bytes) else {
        return Ok(None);
    };
    let Some(issued_at) = DateTime::<Utc>::from_timestamp(claims.issued_at, 0) else {
        return Ok(None);
    };
    if now() - issued_at > config.token_max_age {
        debug!(user_id = claims.user_id, "token rejected: expired");
        return Ok(None);
    }

    let Some(user) = store.user_by_id(claims.user_id)? else {
        debug!(user_id = claims.user_id, "token rejected: unknown user");
        return Ok(None);
    };
    if claims.fingerprint != user.password_hash.unwrap_or_default() {
        debug!(user_id = claims.user_id, "token rejected: fingerprint mismatch");
        return Ok(None);
    }
    Ok(Some(claims.user_id))
}

/// Password login. `NotFound` when the email is unknown and
/// `InvalidCredential` on a mismatch are distinct on purpose; the caller
/// messages them differently.
pub fn authenticate_with_password(store: &dyn Store, email: &str, password: &str) -> Result<User> {
    let mut user = users::find_by_email(store, email)?.ok_or(Error::NotFound("email"))?;
    if !users::check_password(&user, password) {
        debug!(user_id = user.id, "password login rejected");
        return Err(Error::InvalidCredential);
    }
    users::mark_seen(store, &mut user)?;
    Ok(user)
}

/// Token login. Every rejection collapses to `InvalidToken`; a store
/// failure stays a store failure so the caller knows the token may still
/// be good.
pub fn authenticate_with_token(store: &dyn Store, config: &Config, token: &str) -> Result<User> {
    let id = verify_token(store, config, token)?.ok_or(Error::InvalidToken)?;
    let mut user = store.user_by_id(id)?.ok_or(Error::InvalidToken)?;
    users::mark_seen(store, &mut user)?;
    Ok(user)
}

/// Password-based signup.
pub fn register(store: &dyn Store, username: &str, email: &str, password: &str) -> Result<User> {
    users::create(
        store,
        users::NewUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: Some(password.to_string()),
            ..Default::default()
        },
    )
}

/// Consumes an external identity-provider callback. Idempotent on
/// `external_id`; a user matched by email instead is linked to the external
/// id exactly once (an already-linked account is never re-linked). A brand
/// new account gets a collision-free username and no password.
pub fn register_external(
    store: &dyn Store,
    external_id: &str,
    display_name: Option<&str>,
    email: Option<&str>,
) -> Result<User> {
    let email = match email.filter(|e| !e.is_empty()) {
        Some(e) => e.to_lowercase(),
        // An account cannot exist without an email.
        None => return Err(Error::Validation { field: "email" }),
    };

    if let Some(user) = users::find_by_social_id(store, external_id)? {
        return Ok(user);
    }

    if let Some(mut user) = store.user_by_email(&email)? {
        if user.social_id.is_none() {
            user.social_id = Some(external_id.to_string());
            store.update_user(&user)?;
            debug!(user_id = user.id, "external identity linked");
        }
        return Ok(user);
    }

    let base = display_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(external_id));
    let username = users::create_unique_username(store, base)?;

    users::create(
        store,
        users::NewUserInput {
            username,
            email,
            social_id: Some(external_id.to_string()),
            ..Default::default()
        },
    )
}
