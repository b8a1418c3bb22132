use tracing::debug;

use crate::core::db::Store;
use crate::core::errors::{Error, Result};
use crate::models::models::{FollowEdge, User, UserId};
use crate::users;

/// Adds a follow edge. `AlreadyFollowing` signals an existing edge without
/// creating a duplicate; self-follow is valid (and is how a user's own
/// posts reach its feed).
pub fn follow(store: &dyn Store, follower_id: UserId, followed_id: UserId) -> Result<FollowEdge> {
    // Both endpoints must exist; edges never dangle.
    if store.user_by_id(follower_id)?.is_none() || store.user_by_id(followed_id)?.is_none() {
        return Err(Error::NotFound("user"));
    }
    if !store.insert_edge(follower_id, followed_id)? {
        return Err(Error::AlreadyFollowing);
    }
    debug!(follower_id, followed_id, "follow edge created");
    Ok(FollowEdge {
        follower_id,
        followed_id,
    })
}

/// Removes a follow edge. `NotFollowing` when there was none; calling
/// twice never corrupts anything.
pub fn unfollow(store: &dyn Store, follower_id: UserId, followed_id: UserId) -> Result<()> {
    if !store.delete_edge(follower_id, followed_id)? {
        return Err(Error::NotFollowing);
    }
    debug!(follower_id, followed_id, "follow edge removed");
    Ok(())
}

pub fn is_following(store: &dyn Store, follower_id: UserId, followed_id: UserId) -> Result<bool> {
    store.edge_exists(follower_id, followed_id)
}

/// Follow by username, the shape the presentation layer calls with.
pub fn follow_username(store: &dyn Store, actor: &User, target_username: &str) -> Result<()> {
    let target =
        users::find_by_username(store, target_username)?.ok_or(Error::NotFound("user"))?;
    follow(store, actor.id, target.id)?;
    Ok(())
}

pub fn unfollow_username(store: &dyn Store, actor: &User, target_username: &str) -> Result<()> {
    let target =
        users::find_by_username(store, target_username)?.ok_or(Error::NotFound("user"))?;
    unfollow(store, actor.id, target.id)
}

/// Everyone following `user_id`, resolved to user rows, unordered.
pub fn followers_of(store: &dyn Store, user_id: UserId) -> Result<Vec<User>> {
    resolve(store, store.follower_ids_of(user_id)?)
}

/// Everyone `user_id` follows, resolved to user rows, unordered.
pub fn followed_by(store: &dyn Store, user_id: UserId) -> Result<Vec<User>> {
    resolve(store, store.followed_ids_by(user_id)?)
}

fn resolve(store: &dyn Store, ids: Vec<UserId>) -> Result<Vec<User>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = store.user_by_id(id)? {
            out.push(user);
        }
    }
    Ok(out)
}
