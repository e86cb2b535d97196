//! Explicit tweet ↔ storage mapping.
//!
//! # Responsibility
//! - List every stored tweet attribute next to its column in one table.
//! - Convert between [`Tweet`] and its row form without reflection.
//!
//! # Invariants
//! - Conversions destructure `Tweet` exhaustively; a new field does not
//!   compile until it is mapped here.
//! - `likes`/`replies` live in membership tables, not in the `tweets` row.
//! - An empty set is stored as zero membership rows (attribute omitted).

use crate::model::timestamp::Timestamp;
use crate::model::tweet::{Tweet, TweetId, UserId};
use crate::repo::tweet_repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use rusqlite::Row;
use std::collections::BTreeSet;

/// Table holding the scalar tweet attributes.
pub const TWEETS_TABLE: &str = "tweets";

/// Set table keyed by `(tweet_id, tweet_author)` with one member per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberTable {
    pub table: &'static str,
    pub member_column: &'static str,
}

pub const LIKES: MemberTable = MemberTable {
    table: "tweet_likes",
    member_column: "user_id",
};

pub const REPLIES: MemberTable = MemberTable {
    table: "tweet_replies",
    member_column: "reply_id",
};

/// Where a tweet attribute is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Column on the [`TWEETS_TABLE`] row.
    Column(&'static str),
    SetTable(MemberTable),
}

/// Attribute name (external JSON key) → storage location.
///
/// Row reads and writes take their column list and set tables from here.
pub const TWEET_MAPPING: &[(&str, Storage)] = &[
    ("id", Storage::Column("id")),
    ("author", Storage::Column("author")),
    ("text", Storage::Column("text_blob")),
    ("timestamp", Storage::Column("created_at")),
    ("replyingTo", Storage::Column("replying_to")),
    ("likes", Storage::SetTable(LIKES)),
    ("replies", Storage::SetTable(REPLIES)),
];

/// Attributes forming the `tweets` primary key.
const KEY_ATTRIBUTES: [&str; 2] = ["id", "author"];

/// Columns of [`TWEETS_TABLE`] in mapping order.
pub fn tweet_columns() -> impl Iterator<Item = &'static str> {
    TWEET_MAPPING.iter().filter_map(|(_, storage)| match storage {
        Storage::Column(column) => Some(*column),
        Storage::SetTable(_) => None,
    })
}

/// Column storing `attribute`, if it is a scalar attribute.
pub fn column_for(attribute: &str) -> Option<&'static str> {
    TWEET_MAPPING
        .iter()
        .find(|(name, _)| *name == attribute)
        .and_then(|(_, storage)| match storage {
            Storage::Column(column) => Some(*column),
            Storage::SetTable(_) => None,
        })
}

static TWEET_SELECT_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {} FROM {TWEETS_TABLE}",
        tweet_columns().collect::<Vec<_>>().join(", ")
    )
});

static TWEET_UPSERT_SQL: Lazy<String> = Lazy::new(|| {
    let columns: Vec<&str> = tweet_columns().collect();
    let keys: Vec<&str> = KEY_ATTRIBUTES
        .iter()
        .filter_map(|attribute| column_for(attribute))
        .collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|column| !keys.contains(column))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();
    format!(
        "INSERT INTO {TWEETS_TABLE} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {};",
        columns.join(", "),
        columns
            .iter()
            .map(|column| format!(":{column}"))
            .collect::<Vec<_>>()
            .join(", "),
        keys.join(", "),
        updates.join(", ")
    )
});

/// `SELECT <mapped columns> FROM tweets`, without a trailing clause.
pub(crate) fn tweet_select_sql() -> &'static str {
    TWEET_SELECT_SQL.as_str()
}

/// Upsert of one tweet row; parameters are named `:<column>`.
pub(crate) fn tweet_upsert_sql() -> &'static str {
    TWEET_UPSERT_SQL.as_str()
}

/// Row form of the scalar tweet attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TweetRow {
    pub id: TweetId,
    pub author: UserId,
    pub text_blob: String,
    pub created_at: i64,
    pub replying_to: String,
}

/// Row plus set memberships, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TweetRecord {
    pub row: TweetRow,
    pub likes: BTreeSet<UserId>,
    pub replies: BTreeSet<TweetId>,
}

impl TweetRecord {
    /// Maps a validated tweet to its stored form.
    pub fn from_tweet(tweet: &Tweet) -> RepoResult<Self> {
        tweet.validate()?;
        let Tweet {
            author,
            id,
            text,
            timestamp,
            likes,
            replies,
            replying_to,
        } = tweet;

        let created_at = timestamp
            .as_millis()
            .ok_or_else(|| RepoError::InvalidData(format!("tweet `{id}` has no timestamp")))?;

        Ok(Self {
            row: TweetRow {
                id: id.clone(),
                author: author.clone(),
                text_blob: text.clone(),
                created_at,
                replying_to: replying_to.clone(),
            },
            likes: likes.clone(),
            replies: replies.clone(),
        })
    }

    /// Maps a stored record back into the domain entity.
    pub fn into_tweet(self) -> Tweet {
        let TweetRecord {
            row:
                TweetRow {
                    id,
                    author,
                    text_blob,
                    created_at,
                    replying_to,
                },
            likes,
            replies,
        } = self;

        Tweet {
            author,
            id,
            text: text_blob,
            timestamp: Timestamp::from_millis(created_at),
            likes,
            replies,
            replying_to,
        }
    }
}

impl TweetRow {
    /// Column names of the row form, aligned with [`tweet_columns`].
    pub const COLUMNS: [&'static str; 5] =
        ["id", "author", "text_blob", "created_at", "replying_to"];

    /// Reads one row selected with [`tweet_select_sql`].
    pub fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let parsed = Self {
            id: row.get("id")?,
            author: row.get("author")?,
            text_blob: row.get("text_blob")?,
            created_at: row.get("created_at")?,
            replying_to: row.get("replying_to")?,
        };
        if parsed.author.is_empty() {
            return Err(RepoError::InvalidData(format!(
                "tweet `{}` has an empty author",
                parsed.id
            )));
        }
        Ok(parsed)
    }
}
