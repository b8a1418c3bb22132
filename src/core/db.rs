use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::core::errors::{Error, Result};
use crate::models::models::{FollowEdge, NewUser, Post, PostId, User, UserId};

/// Repository seam over the durable relational store.
///
/// Uniqueness of `username`, `email`, non-null `social_id` and of
/// `(follower_id, followed_id)` pairs is enforced *here*, at the storage
/// layer. Application-level pre-checks exist only for friendlier error
/// messages; this trait is the correctness boundary under concurrent
/// callers.
pub trait Store: Send + Sync {
    /// Inserts a user and assigns its id. Fails with the matching
    /// `Duplicate*` error on a uniqueness violation.
    fn insert_user(&self, new: NewUser) -> Result<User>;

    /// Rewrites an existing row in full. `NotFound` if the id is unknown.
    fn update_user(&self, user: &User) -> Result<()>;

    fn user_by_id(&self, id: UserId) -> Result<Option<User>>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn user_by_social_id(&self, social_id: &str) -> Result<Option<User>>;

    /// Inserts a post and assigns its id. Ids increase with insertion
    /// order, which the feed uses as its tie-break key.
    fn insert_post(&self, author_id: UserId, body: &str, timestamp: DateTime<Utc>)
        -> Result<Post>;

    /// All posts authored by any of `authors`, in no particular order.
    fn posts_by_authors(&self, authors: &[UserId]) -> Result<Vec<Post>>;

    /// Inserts a follow edge. Returns `false` (and inserts nothing) when
    /// the edge already exists.
    fn insert_edge(&self, follower_id: UserId, followed_id: UserId) -> Result<bool>;

    /// Removes a follow edge. Returns `false` when there was none; never
    /// an error.
    fn delete_edge(&self, follower_id: UserId, followed_id: UserId) -> Result<bool>;

    fn edge_exists(&self, follower_id: UserId, followed_id: UserId) -> Result<bool>;

    /// Ids of everyone following `user_id`.
    fn follower_ids_of(&self, user_id: UserId) -> Result<Vec<UserId>>;

    /// Ids of everyone `user_id` follows.
    fn followed_ids_by(&self, user_id: UserId) -> Result<Vec<UserId>>;
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    edges: Vec<FollowEdge>,
    next_user_id: UserId,
    next_post_id: PostId,
}

/// In-process store backing tests and embedded callers. Interior locking
/// stands in for the row-level concurrency control a SQL backend provides;
/// any relational store satisfying [`Store`] is a drop-in.
pub struct MemStore {
    inner: Mutex<Tables>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            inner: Mutex::new(Tables {
                next_user_id: 1,
                next_post_id: 1,
                ..Tables::default()
            }),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))
    }
}

impl Store for MemStore {
    fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut t = self.tables()?;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(Error::DuplicateEmail);
        }
        if t.users.iter().any(|u| u.username == new.username) {
            return Err(Error::DuplicateUsername);
        }
        if let Some(sid) = &new.social_id {
            if t.users.iter().any(|u| u.social_id.as_deref() == Some(sid)) {
                return Err(Error::DuplicateSocialId);
            }
        }

        let id = t.next_user_id;
        t.next_user_id += 1;
        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            about_me: new.about_me,
            last_seen: None,
            social_id: new.social_id,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables()?;
        match t.users.iter_mut().find(|u| u.id == user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(())
            }
            None => Err(Error::NotFound("user")),
        }
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables()?.users.iter().find(|u| u.id == id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables()?.users.iter().find(|u| u.email == email).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    fn user_by_social_id(&self, social_id: &str) -> Result<Option<User>> {
        Ok(self
            .tables()?
            .users
            .iter()
            .find(|u| u.social_id.as_deref() == Some(social_id))
            .cloned())
    }

    fn insert_post(
        &self,
        author_id: UserId,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Post> {
        let mut t = self.tables()?;
        let id = t.next_post_id;
        t.next_post_id += 1;
        let post = Post {
            id,
            author_id,
            body: body.to_string(),
            timestamp,
        };
        t.posts.push(post.clone());
        Ok(post)
    }

    fn posts_by_authors(&self, authors: &[UserId]) -> Result<Vec<Post>> {
        Ok(self
            .tables()?
            .posts
            .iter()
            .filter(|p| authors.contains(&p.author_id))
            .cloned()
            .collect())
    }

    fn insert_edge(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let mut t = self.tables()?;
        let edge = FollowEdge {
            follower_id,
            followed_id,
        };
        if t.edges.contains(&edge) {
            return Ok(false);
        }
        t.edges.push(edge);
        Ok(true)
    }

    fn delete_edge(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let mut t = self.tables()?;
        let before = t.edges.len();
        t.edges
            .retain(|e| !(e.follower_id == follower_id && e.followed_id == followed_id));
        Ok(t.edges.len() != before)
    }

    fn edge_exists(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        Ok(self
            .tables()?
            .edges
            .iter()
            .any(|e| e.follower_id == follower_id && e.followed_id == followed_id))
    }

    fn follower_ids_of(&self, user_id: UserId) -> Result<Vec<UserId>> {
        Ok(self
            .tables()?
            .edges
            .iter()
            .filter(|e| e.followed_id == user_id)
            .map(|e| e.follower_id)
            .collect())
    }

    fn followed_ids_by(&self, user_id: UserId) -> Result<Vec<UserId>> {
        Ok(self
            .tables()?
            .edges
            .iter()
            .filter(|e| e.follower_id == user_id)
            .map(|e| e.followed_id)
            .collect())
    }
}
