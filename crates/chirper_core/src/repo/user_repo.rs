//! User repository: the author aggregate tweets fan out into.
//!
//! # Invariants
//! - `create_user` is idempotent on `id`; it never clears the tweet-id set.
//! - The tweet-id set is only grown by `TweetRepository::transactional_save`.

use crate::context::CallContext;
use crate::db::Database;
use crate::model::timestamp::Timestamp;
use crate::model::user::User;
use crate::repo::tweet_repo::{ensure_connection_ready, load_user_tweet_ids, RepoError, RepoResult};
use log::info;
use rusqlite::{params, OptionalExtension};

pub trait UserRepository: Send + Sync {
    /// Creates the user, or updates the display name when it already exists.
    fn create_user(&self, ctx: &CallContext, user: &User) -> RepoResult<()>;
    fn get_user(&self, ctx: &CallContext, id: &str) -> RepoResult<User>;
}

/// SQLite-backed user repository.
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    db: Database,
}

impl SqliteUserRepository {
    pub fn try_new(db: Database) -> RepoResult<Self> {
        ensure_connection_ready(&db.lock(), &["users", "user_tweets"])?;
        Ok(Self { db })
    }
}

impl UserRepository for SqliteUserRepository {
    fn create_user(&self, ctx: &CallContext, user: &User) -> RepoResult<()> {
        if user.id.is_empty() {
            return Err(RepoError::InvalidData("user id is required".to_string()));
        }

        ctx.check()?;
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO users (id, name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name;",
            params![user.id, user.name, user.created_at.as_millis().unwrap_or(0)],
        )?;

        info!("event=user_create module=repo status=ok user_id={}", user.id);
        Ok(())
    }

    fn get_user(&self, ctx: &CallContext, id: &str) -> RepoResult<User> {
        ctx.check()?;
        let conn = self.db.lock();
        let row = conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE id = ?1;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, i64>("created_at")?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, created_at)) = row else {
            return Err(RepoError::NotFound {
                entity: "user",
                id: id.to_string(),
            });
        };
        let tweets = load_user_tweet_ids(&conn, &id)?;
        Ok(User {
            id,
            name,
            created_at: Timestamp::from_millis(created_at),
            tweets,
        })
    }
}
