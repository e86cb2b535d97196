//! Core domain logic for the Chirper tweet service.
//! This crate is the single source of truth for tweet invariants; transports
//! only marshal requests into [`TweetService`] operations.

pub mod clock;
pub mod config;
pub mod context;
pub mod cursor;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use context::{CallContext, Interrupted};
pub use cursor::{Cursor, Page, END_OF_COLLECTION};
pub use db::{Database, DbError};
pub use error::ErrorKind;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::timestamp::Timestamp;
pub use model::tweet::{ReplyTarget, Tweet, TweetId, TweetValidationError, UserId};
pub use model::user::User;
pub use repo::tweet_repo::{
    RepoError, RepoResult, SqliteTweetRepository, TweetRepository, BATCH_WRITE_LIMIT,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use service::tweet_service::{
    ServiceError, TweetService, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
