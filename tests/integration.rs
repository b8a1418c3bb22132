use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use ripple::{auth, users, Config, Error, MemStore, NewUser, Post, Store, User, UserId};

fn test_config() -> Config {
    Config::new("test-secret", Duration::hours(24))
}

#[test]
fn register_then_login() {
    let store = MemStore::new();

    let user = auth::register(&store, "john", "John@Example.COM", "foobar").unwrap();
    assert_eq!(user.username, "John");
    assert_eq!(user.email, "john@example.com");
    assert!(user.password_hash.is_some());

    let logged_in = auth::authenticate_with_password(&store, "john@example.com", "foobar").unwrap();
    assert_eq!(logged_in.id, user.id);
    assert!(logged_in.last_seen.is_some());
}

#[test]
fn login_failures_are_distinct() {
    let store = MemStore::new();
    auth::register(&store, "john", "john@example.com", "foobar").unwrap();

    // Unknown email vs. wrong password are deliberately different errors.
    let err = auth::authenticate_with_password(&store, "james@example.com", "foobar").unwrap_err();
    assert_eq!(err, Error::NotFound("email"));

    let err = auth::authenticate_with_password(&store, "john@example.com", "fakepass").unwrap_err();
    assert_eq!(err, Error::InvalidCredential);
}

#[test]
fn duplicate_email_rejected() {
    let store = MemStore::new();
    auth::register(&store, "john", "john@example.com", "foobar").unwrap();

    let err = auth::register(&store, "johnny", "john@example.com", "foobar").unwrap_err();
    assert_eq!(err, Error::DuplicateEmail);
    // No second row was created.
    assert!(users::find_by_username(&store, "johnny").unwrap().is_none());

    let err = auth::register(&store, "john", "other@example.com", "foobar").unwrap_err();
    assert_eq!(err, Error::DuplicateUsername);
}

#[test]
fn password_policy_enforced() {
    let store = MemStore::new();

    let err = auth::register(&store, "shorty", "s@example.com", "12345").unwrap_err();
    assert_eq!(err, Error::Validation { field: "password" });

    let err = auth::register(&store, "longy", "l@example.com", &"x".repeat(31)).unwrap_err();
    assert_eq!(err, Error::Validation { field: "password" });

    // The boundary lengths hash fine.
    assert!(auth::register(&store, "minny", "m@example.com", &"x".repeat(6)).is_ok());
    assert!(auth::register(&store, "maxy", "mx@example.com", &"x".repeat(30)).is_ok());
}

#[test]
fn unique_username_probes_suffixes() {
    let store = MemStore::new();
    auth::register(&store, "neo", "neo@one.com", "foobar").unwrap();

    let name = users::create_unique_username(&store, "neo").unwrap();
    assert_eq!(name, "Neo2");

    auth::register(&store, &name, "neo2@one.com", "foobar").unwrap();
    let name = users::create_unique_username(&store, "neo").unwrap();
    assert_eq!(name, "Neo3");
}

#[test]
fn avatar_is_deterministic() {
    let store = MemStore::new();
    let john = auth::register(&store, "john", "john@example.com", "foobar").unwrap();
    let susan = auth::register(&store, "susan", "susan@example.com", "foobar").unwrap();

    let a = users::avatar_address(&john, 128);
    assert_eq!(a, users::avatar_address(&john, 128));
    assert!(a.starts_with("https://www.gravatar.com/avatar/"));
    assert!(a.ends_with("s=128"));
    assert_ne!(a, users::avatar_address(&susan, 128));
    assert_ne!(a, users::avatar_address(&john, 256));
}

#[test]
fn token_roundtrip_and_revocation_on_password_change() {
    let store = MemStore::new();
    let config = test_config();
    let mut user = auth::register(&store, "john", "john@example.com", "foobar").unwrap();

    let token = auth::issue_token(&config, &user);
    let resolved = auth::authenticate_with_token(&store, &config, &token).unwrap();
    assert_eq!(resolved.id, user.id);

    // Changing the password rotates the fingerprint and kills the token.
    users::set_password(&store, &mut user, "newpass7").unwrap();
    let err = auth::authenticate_with_token(&store, &config, &token).unwrap_err();
    assert_eq!(err, Error::InvalidToken);

    let fresh = auth::issue_token(&config, &user);
    assert!(auth::authenticate_with_token(&store, &config, &fresh).is_ok());
}

#[test]
fn token_fails_closed() {
    let store = MemStore::new();
    let config = test_config();
    let user = auth::register(&store, "john", "john@example.com", "foobar").unwrap();
    let token = auth::issue_token(&config, &user);

    // Tampered signature.
    let mut tampered = token[..token.len() - 1].to_string();
    tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
    assert!(auth::verify_token(&store, &config, &tampered).unwrap().is_none());

    // Truncated payload.
    let sig = token.rsplit_once('.').unwrap().1;
    assert!(auth::verify_token(&store, &config, &format!("xx.{sig}"))
        .unwrap()
        .is_none());

    // Garbage.
    assert!(auth::verify_token(&store, &config, "not-a-token").unwrap().is_none());
    assert!(auth::verify_token(&store, &config, "").unwrap().is_none());

    // A max age already in the past rejects even a fresh token.
    let strict = Config::new("test-secret", Duration::seconds(-1));
    assert!(auth::verify_token(&store, &strict, &token).unwrap().is_none());

    // Wrong signing key.
    let other = Config::new("other-secret", Duration::hours(24));
    assert!(auth::verify_token(&store, &other, &token).unwrap().is_none());
}

#[test]
fn external_registration_is_idempotent() {
    let store = MemStore::new();

    let user = auth::register_external(&store, "fb:123", Some("neo"), Some("neo@one.com")).unwrap();
    assert_eq!(user.username, "Neo");
    assert_eq!(user.social_id.as_deref(), Some("fb:123"));
    assert!(user.password_hash.is_none());

    let again =
        auth::register_external(&store, "fb:123", Some("neo"), Some("neo@one.com")).unwrap();
    assert_eq!(again.id, user.id);

    // No password means no password login.
    let err = auth::authenticate_with_password(&store, "neo@one.com", "anything").unwrap_err();
    assert_eq!(err, Error::InvalidCredential);
}

#[test]
fn external_registration_requires_email() {
    let store = MemStore::new();

    let err = auth::register_external(&store, "fb:123", Some("neo"), None).unwrap_err();
    assert_eq!(err, Error::Validation { field: "email" });
    let err = auth::register_external(&store, "fb:123", Some("neo"), Some("")).unwrap_err();
    assert_eq!(err, Error::Validation { field: "email" });
}

#[test]
fn external_identity_links_exactly_once() {
    let store = MemStore::new();
    let user = auth::register(&store, "john", "john@example.com", "foobar").unwrap();
    assert!(user.social_id.is_none());

    // First callback for a known email links the external id.
    let linked =
        auth::register_external(&store, "fb:123", Some("john"), Some("john@example.com")).unwrap();
    assert_eq!(linked.id, user.id);
    assert_eq!(linked.social_id.as_deref(), Some("fb:123"));

    // A later callback with a different id never re-links.
    let same =
        auth::register_external(&store, "tw:999", Some("john"), Some("john@example.com")).unwrap();
    assert_eq!(same.id, user.id);
    assert_eq!(same.social_id.as_deref(), Some("fb:123"));
}

#[test]
fn external_username_collision_gets_suffix() {
    let store = MemStore::new();
    auth::register(&store, "neo", "neo@one.com", "foobar").unwrap();

    let user = auth::register_external(&store, "fb:123", Some("neo"), Some("neo@two.com")).unwrap();
    assert_eq!(user.username, "Neo2");
}

/// Store wrapper that can be flipped into failing user lookups, the way a
/// real backend drops a connection mid-request.
struct FlakyStore {
    inner: MemStore,
    lookups_down: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        FlakyStore {
            inner: MemStore::new(),
            lookups_down: AtomicBool::new(false),
        }
    }

    fn go_down(&self) {
        self.lookups_down.store(true, Ordering::SeqCst);
    }

    fn recover(&self) {
        self.lookups_down.store(false, Ordering::SeqCst);
    }
}

impl Store for FlakyStore {
    fn insert_user(&self, new: NewUser) -> ripple::Result<User> {
        self.inner.insert_user(new)
    }

    fn update_user(&self, user: &User) -> ripple::Result<()> {
        self.inner.update_user(user)
    }

    fn user_by_id(&self, id: UserId) -> ripple::Result<Option<User>> {
        if self.lookups_down.load(Ordering::SeqCst) {
            return Err(Error::Store("connection reset".to_string()));
        }
        self.inner.user_by_id(id)
    }

    fn user_by_email(&self, email: &str) -> ripple::Result<Option<User>> {
        self.inner.user_by_email(email)
    }

    fn user_by_username(&self, username: &str) -> ripple::Result<Option<User>> {
        self.inner.user_by_username(username)
    }

    fn user_by_social_id(&self, social_id: &str) -> ripple::Result<Option<User>> {
        self.inner.user_by_social_id(social_id)
    }

    fn insert_post(
        &self,
        author_id: UserId,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> ripple::Result<Post> {
        self.inner.insert_post(author_id, body, timestamp)
    }

    fn posts_by_authors(&self, authors: &[UserId]) -> ripple::Result<Vec<Post>> {
        self.inner.posts_by_authors(authors)
    }

    fn insert_edge(&self, follower_id: UserId, followed_id: UserId) -> ripple::Result<bool> {
        self.inner.insert_edge(follower_id, followed_id)
    }

    fn delete_edge(&self, follower_id: UserId, followed_id: UserId) -> ripple::Result<bool> {
        self.inner.delete_edge(follower_id, followed_id)
    }

    fn edge_exists(&self, follower_id: UserId, followed_id: UserId) -> ripple::Result<bool> {
        self.inner.edge_exists(follower_id, followed_id)
    }

    fn follower_ids_of(&self, user_id: UserId) -> ripple::Result<Vec<UserId>> {
        self.inner.follower_ids_of(user_id)
    }

    fn followed_ids_by(&self, user_id: UserId) -> ripple::Result<Vec<UserId>> {
        self.inner.followed_ids_by(user_id)
    }
}

#[test]
fn token_login_surfaces_store_failure() {
    let store = FlakyStore::new();
    let config = test_config();
    let user = auth::register(&store, "john", "john@example.com", "foobar").unwrap();
    let token = auth::issue_token(&config, &user);

    // A store outage is a store error, never a token rejection: the caller
    // may retry with the same token.
    store.go_down();
    let err = auth::authenticate_with_token(&store, &config, &token).unwrap_err();
    assert!(matches!(err, Error::Store(_)), "got {err:?}");
    let err = auth::verify_token(&store, &config, &token).unwrap_err();
    assert!(matches!(err, Error::Store(_)), "got {err:?}");

    store.recover();
    let resolved = auth::authenticate_with_token(&store, &config, &token).unwrap();
    assert_eq!(resolved.id, user.id);
}

#[test]
fn profile_edit_is_bounded() {
    let store = MemStore::new();
    let mut user = auth::register(&store, "jim", "jim@example.com", "foobar").unwrap();

    let edit = users::ProfileEdit {
        about_me: Some("something".to_string()),
        ..Default::default()
    };
    users::update_profile(&store, &mut user, edit).unwrap();
    let row = store.user_by_id(user.id).unwrap().unwrap();
    assert_eq!(row.about_me.as_deref(), Some("something"));

    let edit = users::ProfileEdit {
        about_me: Some("x".repeat(141)),
        ..Default::default()
    };
    let err = users::update_profile(&store, &mut user, edit).unwrap_err();
    assert_eq!(err, Error::Validation { field: "about_me" });
}

#[test]
fn profile_edit_updates_identity_fields() {
    let store = MemStore::new();
    let mut user = auth::register(&store, "jim", "jim@example.com", "foobar").unwrap();
    let edit = users::ProfileEdit {
        about_me: Some("test".to_string()),
        ..Default::default()
    };
    users::update_profile(&store, &mut user, edit).unwrap();

    // An all-empty edit keeps every field.
    let edit = users::ProfileEdit {
        username: Some(String::new()),
        email: Some(String::new()),
        password: Some(String::new()),
        about_me: Some(String::new()),
    };
    users::update_profile(&store, &mut user, edit).unwrap();
    let row = store.user_by_id(user.id).unwrap().unwrap();
    assert_eq!(row.username, "Jim");
    assert_eq!(row.email, "jim@example.com");
    assert!(users::check_password(&row, "foobar"));
    assert_eq!(row.about_me.as_deref(), Some("test"));

    // A full edit renames, re-normalizes and re-hashes.
    let edit = users::ProfileEdit {
        username: Some("james".to_string()),
        email: Some("James@Example.com".to_string()),
        password: Some("pharos1".to_string()),
        about_me: Some("something".to_string()),
    };
    users::update_profile(&store, &mut user, edit).unwrap();
    let row = store.user_by_id(user.id).unwrap().unwrap();
    assert_eq!(row.username, "James");
    assert_eq!(row.email, "james@example.com");
    assert!(users::check_password(&row, "pharos1"));
    assert!(!users::check_password(&row, "foobar"));
    assert_eq!(row.about_me.as_deref(), Some("something"));

    // Renaming onto another user's name or email is rejected.
    auth::register(&store, "neo", "neo@one.com", "foobar").unwrap();
    let edit = users::ProfileEdit {
        username: Some("neo".to_string()),
        ..Default::default()
    };
    let err = users::update_profile(&store, &mut user, edit).unwrap_err();
    assert_eq!(err, Error::DuplicateUsername);
    let edit = users::ProfileEdit {
        email: Some("neo@one.com".to_string()),
        ..Default::default()
    };
    let err = users::update_profile(&store, &mut user, edit).unwrap_err();
    assert_eq!(err, Error::DuplicateEmail);

    // Re-saving your own current name is not a collision.
    let edit = users::ProfileEdit {
        username: Some("james".to_string()),
        ..Default::default()
    };
    users::update_profile(&store, &mut user, edit).unwrap();
}
