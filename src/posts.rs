use tracing::debug;

use crate::core::db::Store;
use crate::core::errors::{Error, Result};
use crate::core::helpers::now;
use crate::models::models::{Post, User, UserId};

pub const MAX_POST_LENGTH: usize = 140;

/// Creates a post stamped with the current time. Posts are immutable once
/// written.
pub fn create_post(store: &dyn Store, author: &User, body: &str) -> Result<Post> {
    if body.is_empty() || body.chars().count() > MAX_POST_LENGTH {
        return Err(Error::Validation { field: "body" });
    }
    let post = store.insert_post(author.id, body, now())?;
    debug!(post_id = post.id, author_id = author.id, "post created");
    Ok(post)
}

/// The aggregated feed: every post authored by someone `user_id` follows
/// (the self-follow edge puts the user's own posts in scope), newest
/// first. Timestamp ties break on id descending so pagination stays stable
/// within a snapshot. Pages are 1-indexed; page 0 reads as page 1.
pub fn feed(store: &dyn Store, user_id: UserId, page: usize, page_size: usize) -> Result<Vec<Post>> {
    let authors = store.followed_ids_by(user_id)?;
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let posts = store.posts_by_authors(&authors)?;
    Ok(paginate(posts, page, page_size))
}

/// A single user's timeline, same ordering and pagination as the feed.
pub fn posts_of(
    store: &dyn Store,
    author_id: UserId,
    page: usize,
    page_size: usize,
) -> Result<Vec<Post>> {
    let posts = store.posts_by_authors(&[author_id])?;
    Ok(paginate(posts, page, page_size))
}

fn paginate(mut posts: Vec<Post>, page: usize, page_size: usize) -> Vec<Post> {
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    let start = (page.max(1) - 1).saturating_mul(page_size);
    posts.into_iter().skip(start).take(page_size).collect()
}
