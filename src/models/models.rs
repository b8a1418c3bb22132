use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type PostId = i64;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    /// Unique, title-cased at write time.
    pub username: String,
    /// Unique, lowercased at write time.
    pub email: String,
    /// Absent for accounts provisioned purely via an external identity.
    /// Never serialized out to callers in plaintext form anyway, but kept
    /// out of Debug-free logging paths by convention.
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    /// External-identity correlation key. Set at most once, never
    /// overwritten.
    pub social_id: Option<String>,
}

/// Insert shape handed to the store; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub social_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Directed follow relationship. Self-edges are valid and every new user
/// starts with one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followed_id: UserId,
}
