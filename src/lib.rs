//! Identity, social-graph and feed-aggregation core for a micro-posting
//! service.
//!
//! The crate is a library-level contract: the web layer, HTML rendering and
//! OAuth handshake mechanics live elsewhere and talk to this core through
//! the functions re-exported here. Persistence goes through the [`Store`]
//! repository trait; [`MemStore`] is the bundled in-process implementation.

pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod models;
pub mod posts;
pub mod users;

pub use crate::config::Config;
pub use crate::core::db::{MemStore, Store};
pub use crate::core::errors::{Error, Result};
pub use crate::models::models::{FollowEdge, NewUser, Post, PostId, User, UserId};
