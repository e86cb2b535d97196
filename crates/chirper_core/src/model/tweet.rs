//! Tweet domain model.
//!
//! # Responsibility
//! - Define the canonical tweet record and its external JSON shape.
//! - Decompose `replyingTo` references into target id + target author.
//!
//! # Invariants
//! - `author` is non-empty for every persisted tweet.
//! - `id` and `timestamp` are assigned once at creation and never changed.
//! - `likes` and `replies` are sets; membership is never duplicated.
//! - `replying_to` is empty for top-level posts.

use crate::model::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Stable tweet identifier.
pub type TweetId = String;

/// Stable user identifier (user handle).
pub type UserId = String;

/// Separator used by the external `replyingTo` encoding.
pub const REPLY_SEPARATOR: char = ':';

/// Invariant violations detected on a tweet record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TweetValidationError {
    #[error("author is required")]
    MissingAuthor,
    #[error("author is required for tweetID: {0}")]
    MissingAuthorFor(TweetId),
    #[error("tweet id is required")]
    MissingId,
    #[error("timestamp is required for tweetID: {0}")]
    MissingTimestamp(TweetId),
    #[error(
        "invalid format for replyingTo `{0}`. It should be eg {{reply_tweet_id}}:{{reply_tweet_author}}"
    )]
    InvalidReplyTarget(String),
    #[error("replyingTo `{0}` requires the target author")]
    MissingReplyAuthor(TweetId),
}

/// Canonical tweet record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    #[serde(default)]
    pub author: UserId,
    #[serde(default)]
    pub id: TweetId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub likes: BTreeSet<UserId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub replies: BTreeSet<TweetId>,
    /// Bare target id once stored; `"<tweetId>:<authorId>"` on input.
    #[serde(default, rename = "replyingTo")]
    pub replying_to: String,
}

impl Tweet {
    /// Creates a top-level tweet with unset id and timestamp.
    pub fn new(author: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns whether this tweet is a reply to another tweet.
    pub fn is_reply(&self) -> bool {
        !self.replying_to.is_empty()
    }

    /// Checks the invariants every persisted tweet must hold.
    pub fn validate(&self) -> Result<(), TweetValidationError> {
        if self.id.is_empty() {
            return Err(TweetValidationError::MissingId);
        }
        if self.author.is_empty() {
            return Err(TweetValidationError::MissingAuthorFor(self.id.clone()));
        }
        if self.timestamp.is_unset() {
            return Err(TweetValidationError::MissingTimestamp(self.id.clone()));
        }
        Ok(())
    }
}

/// Decomposed `replyingTo` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub tweet_id: TweetId,
    pub author: UserId,
}

impl ReplyTarget {
    /// Parses `"<tweetId>:<authorId>"`.
    ///
    /// Exactly one separator and two non-empty parts are accepted.
    pub fn parse(value: &str) -> Result<Self, TweetValidationError> {
        let mut parts = value.split(REPLY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(tweet_id), Some(author), None) if !tweet_id.is_empty() && !author.is_empty() => {
                Ok(Self {
                    tweet_id: tweet_id.to_string(),
                    author: author.to_string(),
                })
            }
            _ => Err(TweetValidationError::InvalidReplyTarget(value.to_string())),
        }
    }

    /// Renders the external `"<tweetId>:<authorId>"` form.
    pub fn encode(&self) -> String {
        format!("{}{REPLY_SEPARATOR}{}", self.tweet_id, self.author)
    }
}
