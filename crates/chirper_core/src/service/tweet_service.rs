//! Tweet use-case service.
//!
//! # Responsibility
//! - Validate caller input before any store call.
//! - Fill creation defaults (id, timestamp) and decompose reply references.
//! - Delegate persistence to a [`TweetRepository`] implementation.
//!
//! # Invariants
//! - Validation failures never reach the repository.
//! - Repository errors are returned unchanged (wrapped as `ServiceError::Repo`).
//! - Default timestamps come from the injected [`Clock`], never ambient time.

use crate::clock::{Clock, SystemClock};
use crate::context::CallContext;
use crate::cursor::Page;
use crate::error::ErrorKind;
use crate::model::tweet::{ReplyTarget, Tweet, TweetValidationError};
use crate::repo::tweet_repo::{RepoError, TweetRepository};
use log::{debug, warn};
use thiserror::Error;
use uuid::Uuid;

/// Page size applied when the caller passes a non-positive limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 30;

/// Service error for tweet use-cases.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input rejected before any store call.
    #[error("{0}")]
    Validation(String),
    /// Repository failure, passed through unchanged.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Repo(err) => err.kind(),
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<TweetValidationError> for ServiceError {
    fn from(value: TweetValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Resolves a caller-supplied page size.
///
/// - `limit <= 0` -> [`DEFAULT_PAGE_LIMIT`]
/// - `limit > MAX_PAGE_LIMIT` -> validation error
pub fn normalize_page_limit(limit: i32) -> Result<u32, ServiceError> {
    match u32::try_from(limit) {
        Ok(0) | Err(_) => Ok(DEFAULT_PAGE_LIMIT),
        Ok(value) if value > MAX_PAGE_LIMIT => Err(ServiceError::validation(format!(
            "limit cannot be more than {MAX_PAGE_LIMIT}"
        ))),
        Ok(value) => Ok(value),
    }
}

/// Tweet service facade over repository implementations.
pub struct TweetService<R: TweetRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
}

impl<R: TweetRepository> TweetService<R> {
    /// Creates a service that stamps new tweets with wall-clock time.
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock)
    }
}

impl<R: TweetRepository, C: Clock> TweetService<R, C> {
    pub fn with_clock(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Saves one tweet with author linkage and reply fan-out.
    ///
    /// # Contract
    /// - Empty author -> validation error.
    /// - `replying_to` must be `"<tweetId>:<authorId>"`; it is rewritten to the
    ///   bare target id and the target author is passed to the repository.
    /// - Unset timestamp -> clock "now"; empty id -> new UUID v4.
    pub fn save_tweet(&self, ctx: &CallContext, mut tweet: Tweet) -> Result<Tweet, ServiceError> {
        if tweet.author.is_empty() {
            debug!("event=tweet_save module=service status=rejected reason=missing_author");
            return Err(TweetValidationError::MissingAuthor.into());
        }

        let reply_target_author = if tweet.is_reply() {
            let target = ReplyTarget::parse(&tweet.replying_to).map_err(|err| {
                debug!("event=tweet_save module=service status=rejected reason=invalid_reply_target");
                err
            })?;
            tweet.replying_to = target.tweet_id;
            Some(target.author)
        } else {
            None
        };

        self.fill_defaults(&mut tweet);

        self.repo
            .transactional_save(ctx, &tweet, reply_target_author.as_deref())
            .map_err(|err| {
                let kind = err.kind();
                warn!(
                    "event=tweet_save module=service status=error kind={kind} retryable={} tweet_id={}",
                    kind.is_retryable(),
                    tweet.id
                );
                err.into()
            })
    }

    /// Saves a batch of tweets without fan-out.
    ///
    /// All authors are checked before anything is written; the first missing
    /// author fails the whole call. Returns the tweets as stored.
    pub fn bulk_save_tweets(
        &self,
        ctx: &CallContext,
        mut tweets: Vec<Tweet>,
    ) -> Result<Vec<Tweet>, ServiceError> {
        if tweets.is_empty() {
            return Err(ServiceError::validation(
                "cannot perform action on an empty list",
            ));
        }

        if let Some(missing) = tweets.iter().find(|tweet| tweet.author.is_empty()) {
            debug!(
                "event=tweet_bulk_save module=service status=rejected reason=missing_author count={}",
                tweets.len()
            );
            return Err(TweetValidationError::MissingAuthorFor(missing.id.clone()).into());
        }

        for tweet in &mut tweets {
            self.fill_defaults(tweet);
        }

        self.repo.bulk_save(ctx, &tweets)?;
        Ok(tweets)
    }

    /// Lists one page of all tweets in store order.
    pub fn list_tweets(
        &self,
        ctx: &CallContext,
        limit: i32,
        cursor: &str,
    ) -> Result<Page<Tweet>, ServiceError> {
        let limit = normalize_page_limit(limit)?;
        Ok(self.repo.scan_page(ctx, limit, cursor)?)
    }

    /// Lists one page of an author's tweets, most recent first.
    pub fn list_author_tweets(
        &self,
        ctx: &CallContext,
        author: &str,
        limit: i32,
        cursor: &str,
    ) -> Result<Page<Tweet>, ServiceError> {
        if author.is_empty() {
            return Err(TweetValidationError::MissingAuthor.into());
        }
        let limit = normalize_page_limit(limit)?;
        Ok(self.repo.list_by_author(ctx, author, cursor, limit)?)
    }

    pub fn get_tweet(&self, ctx: &CallContext, id: &str) -> Result<Tweet, ServiceError> {
        if id.is_empty() {
            return Err(TweetValidationError::MissingId.into());
        }
        Ok(self.repo.get_by_id(ctx, id)?)
    }

    /// Likes (`has_liked = false`) or unlikes (`has_liked = true`) a tweet.
    pub fn save_like_toggle(
        &self,
        ctx: &CallContext,
        tweet_id: &str,
        author: &str,
        acting_user: &str,
        has_liked: bool,
    ) -> Result<(), ServiceError> {
        if tweet_id.is_empty() {
            return Err(TweetValidationError::MissingId.into());
        }
        if author.is_empty() {
            return Err(TweetValidationError::MissingAuthor.into());
        }
        if acting_user.is_empty() {
            return Err(ServiceError::validation("acting user id is required"));
        }

        Ok(self
            .repo
            .toggle_like(ctx, tweet_id, author, acting_user, has_liked)?)
    }

    fn fill_defaults(&self, tweet: &mut Tweet) {
        if tweet.timestamp.is_unset() {
            tweet.timestamp = self.clock.now();
        }
        if tweet.id.is_empty() {
            tweet.id = Uuid::new_v4().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_limit, ServiceError, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
    use crate::error::ErrorKind;

    #[test]
    fn page_limit_defaults_and_bounds() {
        assert_eq!(normalize_page_limit(0).unwrap(), DEFAULT_PAGE_LIMIT);
        assert_eq!(normalize_page_limit(-7).unwrap(), DEFAULT_PAGE_LIMIT);
        assert_eq!(normalize_page_limit(1).unwrap(), 1);
        assert_eq!(normalize_page_limit(30).unwrap(), MAX_PAGE_LIMIT);

        let err = normalize_page_limit(31).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "limit cannot be more than 30");
    }
}
