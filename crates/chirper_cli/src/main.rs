//! Operator CLI for a Chirper store.
//!
//! # Responsibility
//! - Resolve [`CoreConfig`] from environment and flags, then open the store.
//! - Expose bulk import and page listing for local maintenance.
//!
//! Usage: `chirper_cli [--db=PATH] [--log-level=LEVEL] [--log-dir=DIR] <command>`
//!
//! | command                          | effect                                   |
//! |----------------------------------|------------------------------------------|
//! | `version`                        | print the core version                   |
//! | `add-user <id> [name]`           | create or rename a user                  |
//! | `migrate <tweets.json>`          | bulk-import up to 25 tweets, all or none |
//! | `list [limit] [cursor]`          | print one page of all tweets             |
//! | `timeline <author> [limit] [cursor]` | print one page of an author's tweets |

use chirper_core::{
    init_logging, CallContext, Clock, CoreConfig, Database, Page, SqliteTweetRepository,
    SqliteUserRepository, Tweet, TweetRepository, TweetService, User, UserRepository,
};
use log::info;
use std::process::ExitCode;

type CliResult<T> = Result<T, String>;

enum Command {
    Version,
    AddUser { id: String, name: String },
    Migrate { file: String },
    List { limit: i32, cursor: String },
    Timeline { author: String, limit: i32, cursor: String },
}

impl Command {
    fn from_args(args: &[String]) -> CliResult<Self> {
        let positional: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|arg| !arg.starts_with("--"))
            .collect();

        match positional.as_slice() {
            [] | ["version"] => Ok(Self::Version),
            ["add-user", id, rest @ ..] => Ok(Self::AddUser {
                id: id.to_string(),
                name: rest.first().unwrap_or(id).to_string(),
            }),
            ["migrate", file] => Ok(Self::Migrate {
                file: file.to_string(),
            }),
            ["list", rest @ ..] => {
                let (limit, cursor) = page_args(rest)?;
                Ok(Self::List { limit, cursor })
            }
            ["timeline", author, rest @ ..] => {
                let (limit, cursor) = page_args(rest)?;
                Ok(Self::Timeline {
                    author: author.to_string(),
                    limit,
                    cursor,
                })
            }
            other => Err(format!("unrecognized command: {}", other.join(" "))),
        }
    }
}

fn page_args(rest: &[&str]) -> CliResult<(i32, String)> {
    let limit = match rest.first() {
        Some(value) => value
            .parse::<i32>()
            .map_err(|err| format!("invalid limit `{value}`: {err}"))?,
        None => 0,
    };
    let cursor = rest.get(1).map(|value| value.to_string()).unwrap_or_default();
    Ok((limit, cursor))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> CliResult<()> {
    let config = CoreConfig::load(args).map_err(|err| err.to_string())?;
    let command = Command::from_args(args)?;

    if let Command::Version = command {
        println!("chirper_core version={}", chirper_core::core_version());
        return Ok(());
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level, &log_dir.to_string_lossy())?;
    }

    let db = match &config.db_path {
        Some(path) => Database::open(path),
        None => Database::in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let ctx = CallContext::background();
    match command {
        Command::Version => Ok(()),
        Command::AddUser { id, name } => {
            let users = SqliteUserRepository::try_new(db).map_err(|err| err.to_string())?;
            users
                .create_user(&ctx, &User::new(id.as_str(), name))
                .map_err(|err| err.to_string())?;
            println!("user {id} saved");
            Ok(())
        }
        Command::Migrate { file } => migrate(&ctx, service(db)?, &file),
        Command::List { limit, cursor } => {
            let page = service(db)?
                .list_tweets(&ctx, limit, &cursor)
                .map_err(|err| err.to_string())?;
            print_page(&page)
        }
        Command::Timeline {
            author,
            limit,
            cursor,
        } => {
            let page = service(db)?
                .list_author_tweets(&ctx, &author, limit, &cursor)
                .map_err(|err| err.to_string())?;
            print_page(&page)
        }
    }
}

fn service(db: Database) -> CliResult<TweetService<SqliteTweetRepository>> {
    let repo = SqliteTweetRepository::try_new(db).map_err(|err| err.to_string())?;
    Ok(TweetService::new(repo))
}

fn migrate(
    ctx: &CallContext,
    service: TweetService<SqliteTweetRepository>,
    file: &str,
) -> CliResult<()> {
    let raw = std::fs::read_to_string(file).map_err(|err| format!("cannot read `{file}`: {err}"))?;
    let tweets: Vec<Tweet> =
        serde_json::from_str(&raw).map_err(|err| format!("cannot parse `{file}`: {err}"))?;

    let imported = import_tweets(ctx, &service, tweets)?;
    println!("imported {imported} tweets");
    Ok(())
}

/// Saves the whole list in one bulk call: every item lands or none does.
fn import_tweets<R: TweetRepository, C: Clock>(
    ctx: &CallContext,
    service: &TweetService<R, C>,
    tweets: Vec<Tweet>,
) -> CliResult<usize> {
    let saved = service
        .bulk_save_tweets(ctx, tweets)
        .map_err(|err| format!("import failed ({}): {err}", err.kind()))?;
    info!(
        "event=cli_migrate module=cli status=ok count={}",
        saved.len()
    );
    Ok(saved.len())
}

fn print_page(page: &Page<Tweet>) -> CliResult<()> {
    let items = serde_json::to_string_pretty(&page.items).map_err(|err| err.to_string())?;
    println!("{items}");
    println!("next_cursor={}", page.next_token());
    Ok(())
}
