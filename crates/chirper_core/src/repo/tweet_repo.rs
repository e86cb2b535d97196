//! Tweet repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Own every storage-bound tweet operation: fan-out save, batch save,
//!   scans, author timelines, point lookups and like toggles.
//! - Keep SQL and cursor key layout inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Tweet::validate()` before any SQL mutation.
//! - "Referenced record must exist" preconditions fail with
//!   `RepoError::PreconditionFailed`; they are never silently dropped.
//! - Multi-record writes commit in one transaction or not at all.
//! - Batches above [`BATCH_WRITE_LIMIT`] are rejected before dispatch.

use crate::context::{CallContext, Interrupted};
use crate::cursor::{Cursor, Page};
use crate::db::migrations::latest_version;
use crate::db::{Database, DbError};
use crate::error::ErrorKind;
use crate::model::tweet::{Tweet, TweetId, TweetValidationError, UserId};
use crate::repo::record::{
    tweet_select_sql, tweet_upsert_sql, MemberTable, TweetRecord, TweetRow, LIKES, REPLIES,
};
use log::{debug, info, warn};
use rusqlite::{named_params, params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use thiserror::Error;

/// Fixed physical limit of one batch write.
pub const BATCH_WRITE_LIMIT: usize = 25;

const REQUIRED_TABLES: [&str; 5] = [
    "users",
    "user_tweets",
    "tweets",
    "tweet_likes",
    "tweet_replies",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for tweet and user persistence.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] TweetValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("precondition failed: {entity} `{key}` does not exist")]
    PreconditionFailed { entity: &'static str, key: String },
    #[error("batch of {requested} items exceeds the limit of {limit}")]
    CapacityExceeded { requested: usize, limit: usize },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("store call interrupted: {0:?}")]
    Interrupted(Interrupted),
    #[error("repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
    #[error("invalid persisted tweet data: {0}")]
    InvalidData(String),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Interrupted(_) => ErrorKind::Cancelled,
            Self::Db(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidData(_) => ErrorKind::Store,
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<Interrupted> for RepoError {
    fn from(value: Interrupted) -> Self {
        Self::Interrupted(value)
    }
}

/// Storage operations for tweets.
pub trait TweetRepository: Send + Sync {
    /// Saves the tweet, links it to its author and, when replying, to the
    /// target's reply set, all in one atomic commit.
    ///
    /// `reply_target_author` is required when `tweet.replying_to` is set.
    fn transactional_save(
        &self,
        ctx: &CallContext,
        tweet: &Tweet,
        reply_target_author: Option<&str>,
    ) -> RepoResult<Tweet>;

    /// Inserts or replaces up to [`BATCH_WRITE_LIMIT`] tweets in one batch.
    fn bulk_save(&self, ctx: &CallContext, tweets: &[Tweet]) -> RepoResult<()>;

    /// Returns up to `limit` tweets in key order after `cursor`.
    fn scan_page(&self, ctx: &CallContext, limit: u32, cursor: &str) -> RepoResult<Page<Tweet>>;

    /// Returns one author's tweets, most recent first.
    fn list_by_author(
        &self,
        ctx: &CallContext,
        author: &str,
        cursor: &str,
        limit: u32,
    ) -> RepoResult<Page<Tweet>>;

    fn get_by_id(&self, ctx: &CallContext, id: &str) -> RepoResult<Tweet>;

    /// Flips `acting_user` membership in the tweet's like set.
    ///
    /// `has_liked = true` removes the like, `false` adds it.
    fn toggle_like(
        &self,
        ctx: &CallContext,
        tweet_id: &str,
        author: &str,
        acting_user: &str,
        has_liked: bool,
    ) -> RepoResult<()>;
}

/// SQLite-backed tweet repository.
#[derive(Debug, Clone)]
pub struct SqliteTweetRepository {
    db: Database,
}

impl SqliteTweetRepository {
    /// Constructs a repository from a migrated store handle.
    pub fn try_new(db: Database) -> RepoResult<Self> {
        ensure_connection_ready(&db.lock(), &REQUIRED_TABLES)?;
        Ok(Self { db })
    }
}

impl TweetRepository for SqliteTweetRepository {
    fn transactional_save(
        &self,
        ctx: &CallContext,
        tweet: &Tweet,
        reply_target_author: Option<&str>,
    ) -> RepoResult<Tweet> {
        let record = TweetRecord::from_tweet(tweet)?;
        let reply_target = if tweet.is_reply() {
            match reply_target_author {
                Some(author) if !author.is_empty() => Some((tweet.replying_to.as_str(), author)),
                _ => return Err(TweetValidationError::MissingReplyAuthor(tweet.id.clone()).into()),
            }
        } else {
            None
        };

        ctx.check()?;
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !user_exists(&tx, &record.row.author)? {
            return Err(RepoError::PreconditionFailed {
                entity: "user",
                key: record.row.author.clone(),
            });
        }
        if let Some((target_id, target_author)) = reply_target {
            if !tweet_exists(&tx, target_id, target_author)? {
                return Err(RepoError::PreconditionFailed {
                    entity: "tweet",
                    key: format!("{target_id}:{target_author}"),
                });
            }
        }

        put_record(&tx, &record)?;
        tx.execute(
            "INSERT OR IGNORE INTO user_tweets (user_id, tweet_id) VALUES (?1, ?2);",
            params![record.row.author, record.row.id],
        )?;
        if let Some((target_id, target_author)) = reply_target {
            add_member(&tx, REPLIES, target_id, target_author, &record.row.id)?;
        }

        ctx.check()?;
        tx.commit()?;

        info!(
            "event=tweet_save module=repo status=ok tweet_id={} is_reply={}",
            record.row.id,
            reply_target.is_some()
        );
        Ok(record.into_tweet())
    }

    fn bulk_save(&self, ctx: &CallContext, tweets: &[Tweet]) -> RepoResult<()> {
        if tweets.len() > BATCH_WRITE_LIMIT {
            warn!(
                "event=tweet_bulk_save module=repo status=rejected requested={} limit={}",
                tweets.len(),
                BATCH_WRITE_LIMIT
            );
            return Err(RepoError::CapacityExceeded {
                requested: tweets.len(),
                limit: BATCH_WRITE_LIMIT,
            });
        }
        if tweets.is_empty() {
            return Ok(());
        }

        let records = tweets
            .iter()
            .map(TweetRecord::from_tweet)
            .collect::<RepoResult<Vec<_>>>()?;

        ctx.check()?;
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for record in &records {
            put_record(&tx, record)?;
        }
        ctx.check()?;
        tx.commit()?;

        info!(
            "event=tweet_bulk_save module=repo status=ok count={}",
            records.len()
        );
        Ok(())
    }

    fn scan_page(&self, ctx: &CallContext, limit: u32, cursor: &str) -> RepoResult<Page<Tweet>> {
        let start_after = match Cursor::decode(cursor) {
            Cursor::End => return Ok(Page::empty()),
            Cursor::Start => None,
            after @ Cursor::After(_) => match (after.attribute("id"), after.attribute("author")) {
                (Some(id), Some(author)) => Some((id.to_string(), author.to_string())),
                _ => {
                    warn!("event=tweet_scan module=repo status=cursor_recovered reason=missing_key");
                    None
                }
            },
        };
        let (after_id, after_author) = start_after.unzip();
        let limit = limit.max(1);

        ctx.check()?;
        let conn = self.db.lock();
        let select = tweet_select_sql();
        let mut stmt = conn.prepare_cached(&format!(
            "{select}
             WHERE ?1 IS NULL OR (id, author) > (?1, ?2)
             ORDER BY id ASC, author ASC
             LIMIT ?3;"
        ))?;
        let rows = collect_rows(stmt.query(params![after_id, after_author, i64::from(limit) + 1])?)?;
        drop(stmt);

        let page = assemble_page(&conn, rows, limit, |last| {
            Cursor::after([("id", last.id.clone()), ("author", last.author.clone())])
        })?;
        debug!(
            "event=tweet_scan module=repo status=ok count={} last_page={}",
            page.items.len(),
            page.is_last()
        );
        Ok(page)
    }

    fn list_by_author(
        &self,
        ctx: &CallContext,
        author: &str,
        cursor: &str,
        limit: u32,
    ) -> RepoResult<Page<Tweet>> {
        let start_after = match Cursor::decode(cursor) {
            Cursor::End => return Ok(Page::empty()),
            Cursor::Start => None,
            after @ Cursor::After(_) => {
                let created_at = after
                    .attribute("created_at")
                    .and_then(|value| value.parse::<i64>().ok());
                match (after.attribute("id"), after.attribute("author"), created_at) {
                    (Some(id), Some(cursor_author), Some(created_at)) if cursor_author == author => {
                        Some((created_at, id.to_string()))
                    }
                    _ => {
                        warn!(
                            "event=tweet_list_by_author module=repo status=cursor_recovered reason=foreign_or_partial_key"
                        );
                        None
                    }
                }
            }
        };
        let (after_created_at, after_id) = start_after.unzip();
        let limit = limit.max(1);

        ctx.check()?;
        let conn = self.db.lock();
        let select = tweet_select_sql();
        let mut stmt = conn.prepare_cached(&format!(
            "{select}
             WHERE author = ?1
               AND (?2 IS NULL OR (created_at, id) < (?2, ?3))
             ORDER BY created_at DESC, id DESC
             LIMIT ?4;"
        ))?;
        let rows = collect_rows(stmt.query(params![
            author,
            after_created_at,
            after_id,
            i64::from(limit) + 1
        ])?)?;
        drop(stmt);

        assemble_page(&conn, rows, limit, |last| {
            Cursor::after([
                ("id", last.id.clone()),
                ("author", last.author.clone()),
                ("created_at", last.created_at.to_string()),
            ])
        })
    }

    fn get_by_id(&self, ctx: &CallContext, id: &str) -> RepoResult<Tweet> {
        ctx.check()?;
        let conn = self.db.lock();
        let select = tweet_select_sql();
        let mut stmt = conn.prepare_cached(&format!(
            "{select}
             WHERE id = ?1
             ORDER BY author ASC
             LIMIT 1;"
        ))?;
        let mut rows = collect_rows(stmt.query([id])?)?;
        drop(stmt);

        match rows.pop() {
            Some(row) => load_record(&conn, row).map(TweetRecord::into_tweet),
            None => Err(RepoError::NotFound {
                entity: "tweet",
                id: id.to_string(),
            }),
        }
    }

    fn toggle_like(
        &self,
        ctx: &CallContext,
        tweet_id: &str,
        author: &str,
        acting_user: &str,
        has_liked: bool,
    ) -> RepoResult<()> {
        ctx.check()?;
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !tweet_exists(&tx, tweet_id, author)? {
            return Err(RepoError::PreconditionFailed {
                entity: "tweet",
                key: format!("{tweet_id}:{author}"),
            });
        }

        if has_liked {
            tx.execute(
                &format!(
                    "DELETE FROM {}
                     WHERE tweet_id = ?1 AND tweet_author = ?2 AND {} = ?3;",
                    LIKES.table, LIKES.member_column
                ),
                params![tweet_id, author, acting_user],
            )?;
        } else {
            add_member(&tx, LIKES, tweet_id, author, acting_user)?;
        }

        ctx.check()?;
        tx.commit()?;

        debug!(
            "event=tweet_like_toggle module=repo status=ok tweet_id={tweet_id} action={}",
            if has_liked { "unlike" } else { "like" }
        );
        Ok(())
    }
}

fn put_record(tx: &Transaction<'_>, record: &TweetRecord) -> RepoResult<()> {
    let row = &record.row;
    tx.prepare_cached(tweet_upsert_sql())?.execute(named_params! {
        ":id": row.id,
        ":author": row.author,
        ":text_blob": row.text_blob,
        ":created_at": row.created_at,
        ":replying_to": row.replying_to,
    })?;
    replace_members(tx, LIKES, row, &record.likes)?;
    replace_members(tx, REPLIES, row, &record.replies)?;
    Ok(())
}

fn replace_members(
    tx: &Transaction<'_>,
    set: MemberTable,
    row: &TweetRow,
    members: &BTreeSet<String>,
) -> RepoResult<()> {
    tx.execute(
        &format!(
            "DELETE FROM {} WHERE tweet_id = ?1 AND tweet_author = ?2;",
            set.table
        ),
        params![row.id, row.author],
    )?;
    for member in members {
        add_member(tx, set, &row.id, &row.author, member)?;
    }
    Ok(())
}

fn add_member(
    tx: &Transaction<'_>,
    set: MemberTable,
    tweet_id: &str,
    tweet_author: &str,
    member: &str,
) -> RepoResult<()> {
    let MemberTable {
        table,
        member_column,
    } = set;
    let mut stmt = tx.prepare_cached(&format!(
        "INSERT OR IGNORE INTO {table} (tweet_id, tweet_author, {member_column})
         VALUES (?1, ?2, ?3);"
    ))?;
    stmt.execute(params![tweet_id, tweet_author, member])?;
    Ok(())
}

fn load_members(
    conn: &Connection,
    set: MemberTable,
    row: &TweetRow,
) -> RepoResult<BTreeSet<String>> {
    let MemberTable {
        table,
        member_column,
    } = set;
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {member_column}
         FROM {table}
         WHERE tweet_id = ?1 AND tweet_author = ?2;"
    ))?;
    let mut rows = stmt.query(params![row.id, row.author])?;
    let mut members = BTreeSet::new();
    while let Some(member) = rows.next()? {
        members.insert(member.get(0)?);
    }
    Ok(members)
}

fn load_record(conn: &Connection, row: TweetRow) -> RepoResult<TweetRecord> {
    let likes = load_members(conn, LIKES, &row)?;
    let replies = load_members(conn, REPLIES, &row)?;
    Ok(TweetRecord {
        row,
        likes,
        replies,
    })
}

fn collect_rows(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<TweetRow>> {
    let mut parsed = Vec::new();
    while let Some(row) = rows.next()? {
        parsed.push(TweetRow::from_row(row)?);
    }
    Ok(parsed)
}

/// Trims the look-ahead row and derives the next cursor from the last item.
fn assemble_page<F>(
    conn: &Connection,
    mut rows: Vec<TweetRow>,
    limit: u32,
    cursor_for: F,
) -> RepoResult<Page<Tweet>>
where
    F: Fn(&TweetRow) -> Cursor,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    let next_cursor = match rows.last() {
        Some(last) if has_more => Some(cursor_for(last).encode()),
        _ => None,
    };

    let items = rows
        .into_iter()
        .map(|row| load_record(conn, row).map(TweetRecord::into_tweet))
        .collect::<RepoResult<Vec<_>>>()?;

    Ok(Page { items, next_cursor })
}

pub(crate) fn user_exists(conn: &Connection, user_id: &UserId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn tweet_exists(conn: &Connection, id: &str, author: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tweets WHERE id = ?1 AND author = ?2);",
        params![id, author],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Rejects connections that were not bootstrapped through `db::open_db*`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let actual_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

/// Tweet ids authored by `user_id`, used by the user repository.
pub(crate) fn load_user_tweet_ids(
    conn: &Connection,
    user_id: &str,
) -> RepoResult<BTreeSet<TweetId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT tweet_id
         FROM user_tweets
         WHERE user_id = ?1;",
    )?;
    let mut rows = stmt.query([user_id])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        ids.insert(row.get(0)?);
    }
    Ok(ids)
}
