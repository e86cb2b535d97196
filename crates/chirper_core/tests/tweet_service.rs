use chirper_core::{
    CallContext, Database, ErrorKind, FixedClock, Page, RepoError, RepoResult, ServiceError,
    SqliteTweetRepository, SqliteUserRepository, Timestamp, Tweet, TweetRepository, TweetService,
    User, UserRepository, DEFAULT_PAGE_LIMIT,
};
use std::sync::Mutex;
use uuid::Uuid;

const NOW_MILLIS: i64 = 1_518_122_597_860;

#[derive(Debug, Clone, PartialEq)]
enum RepoCall {
    TransactionalSave {
        tweet: Tweet,
        reply_target_author: Option<String>,
    },
    BulkSave(Vec<Tweet>),
    ScanPage {
        limit: u32,
        cursor: String,
    },
    ListByAuthor {
        author: String,
        limit: u32,
    },
    GetById(String),
    ToggleLike {
        tweet_id: String,
        author: String,
        acting_user: String,
        has_liked: bool,
    },
}

/// Records every call; optionally fails writes with a precondition error.
#[derive(Default)]
struct RecordingRepository {
    calls: Mutex<Vec<RepoCall>>,
    fail_writes: bool,
}

impl RecordingRepository {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn record(&self, call: RepoCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<RepoCall> {
        self.calls.lock().unwrap().clone()
    }

    fn write_result(&self) -> RepoResult<()> {
        if self.fail_writes {
            return Err(RepoError::PreconditionFailed {
                entity: "tweet",
                key: "t1:bob".to_string(),
            });
        }
        Ok(())
    }
}

impl TweetRepository for RecordingRepository {
    fn transactional_save(
        &self,
        _ctx: &CallContext,
        tweet: &Tweet,
        reply_target_author: Option<&str>,
    ) -> RepoResult<Tweet> {
        self.record(RepoCall::TransactionalSave {
            tweet: tweet.clone(),
            reply_target_author: reply_target_author.map(str::to_string),
        });
        self.write_result().map(|()| tweet.clone())
    }

    fn bulk_save(&self, _ctx: &CallContext, tweets: &[Tweet]) -> RepoResult<()> {
        self.record(RepoCall::BulkSave(tweets.to_vec()));
        self.write_result()
    }

    fn scan_page(&self, _ctx: &CallContext, limit: u32, cursor: &str) -> RepoResult<Page<Tweet>> {
        self.record(RepoCall::ScanPage {
            limit,
            cursor: cursor.to_string(),
        });
        Ok(Page::empty())
    }

    fn list_by_author(
        &self,
        _ctx: &CallContext,
        author: &str,
        _cursor: &str,
        limit: u32,
    ) -> RepoResult<Page<Tweet>> {
        self.record(RepoCall::ListByAuthor {
            author: author.to_string(),
            limit,
        });
        Ok(Page::empty())
    }

    fn get_by_id(&self, _ctx: &CallContext, id: &str) -> RepoResult<Tweet> {
        self.record(RepoCall::GetById(id.to_string()));
        Err(RepoError::NotFound {
            entity: "tweet",
            id: id.to_string(),
        })
    }

    fn toggle_like(
        &self,
        _ctx: &CallContext,
        tweet_id: &str,
        author: &str,
        acting_user: &str,
        has_liked: bool,
    ) -> RepoResult<()> {
        self.record(RepoCall::ToggleLike {
            tweet_id: tweet_id.to_string(),
            author: author.to_string(),
            acting_user: acting_user.to_string(),
            has_liked,
        });
        self.write_result()
    }
}

fn service(repo: RecordingRepository) -> TweetService<RecordingRepository, FixedClock> {
    TweetService::with_clock(repo, FixedClock::at_millis(NOW_MILLIS))
}

fn ctx() -> CallContext {
    CallContext::background()
}

#[test]
fn save_tweet_without_author_makes_no_store_call() {
    let service = service(RecordingRepository::default());

    let err = service
        .save_tweet(&ctx(), Tweet::new("", "hello"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "author is required");
    assert!(service.repository().calls().is_empty());
}

#[test]
fn save_tweet_rejects_malformed_reply_reference_before_store() {
    let service = service(RecordingRepository::default());

    for replying_to in ["tweetID-I-am-ReplyingTo", "t1:", ":bob", "t1:bob:x"] {
        let mut tweet = Tweet::new("some_handle", "reply");
        tweet.replying_to = replying_to.to_string();
        let err = service.save_tweet(&ctx(), tweet).unwrap_err();
        assert!(
            matches!(err, ServiceError::Validation(ref message) if message.contains("replyingTo")),
            "`{replying_to}` gave {err}"
        );
    }
    assert!(service.repository().calls().is_empty());
}

#[test]
fn save_tweet_decomposes_reply_reference() {
    let service = service(RecordingRepository::default());

    let mut tweet = Tweet::new("sarah_edo", "Nice!");
    tweet.replying_to = "t1:bob".to_string();
    let saved = service.save_tweet(&ctx(), tweet).unwrap();
    assert_eq!(saved.replying_to, "t1");

    match service.repository().calls().as_slice() {
        [RepoCall::TransactionalSave {
            tweet,
            reply_target_author,
        }] => {
            assert_eq!(tweet.replying_to, "t1");
            assert_eq!(reply_target_author.as_deref(), Some("bob"));
        }
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[test]
fn save_tweet_fills_id_and_timestamp_defaults() {
    let service = service(RecordingRepository::default());

    let saved = service
        .save_tweet(&ctx(), Tweet::new("sarah_edo", "top level"))
        .unwrap();
    assert_eq!(saved.timestamp.as_millis(), Some(NOW_MILLIS));
    assert!(Uuid::parse_str(&saved.id).is_ok());

    match service.repository().calls().as_slice() {
        [RepoCall::TransactionalSave {
            reply_target_author,
            ..
        }] => assert!(reply_target_author.is_none()),
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[test]
fn save_tweet_keeps_caller_assigned_id_and_timestamp() {
    let service = service(RecordingRepository::default());

    let mut tweet = Tweet::new("sarah_edo", "imported");
    tweet.id = "SomeID".to_string();
    tweet.timestamp = Timestamp::from_millis(1_510_044_395_650);
    let saved = service.save_tweet(&ctx(), tweet).unwrap();
    assert_eq!(saved.id, "SomeID");
    assert_eq!(saved.timestamp.as_millis(), Some(1_510_044_395_650));
}

#[test]
fn save_tweet_propagates_repository_error_unchanged() {
    let service = service(RecordingRepository::failing());

    let mut tweet = Tweet::new("some_handle", "reply");
    tweet.replying_to = "tweetID:another_author".to_string();
    let err = service.save_tweet(&ctx(), tweet).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repo(RepoError::PreconditionFailed { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(service.repository().calls().len(), 1);
}

#[test]
fn bulk_save_rejects_empty_list_without_store_call() {
    let service = service(RecordingRepository::default());

    let err = service.bulk_save_tweets(&ctx(), Vec::new()).unwrap_err();
    assert_eq!(err.to_string(), "cannot perform action on an empty list");
    assert!(service.repository().calls().is_empty());
}

#[test]
fn bulk_save_with_one_missing_author_writes_nothing() {
    let service = service(RecordingRepository::default());

    let mut first = Tweet::new("some_handle1", "one");
    first.id = "SomeID1".to_string();
    let mut second = Tweet::new("", "two");
    second.id = "SomeID2".to_string();

    let err = service
        .bulk_save_tweets(&ctx(), vec![first, second])
        .unwrap_err();
    assert_eq!(err.to_string(), "author is required for tweetID: SomeID2");
    assert!(service.repository().calls().is_empty());
}

#[test]
fn bulk_save_fills_defaults_per_item() {
    let service = service(RecordingRepository::default());

    let mut preset = Tweet::new("some_handle1", "one");
    preset.id = "SomeID1".to_string();
    let saved = service
        .bulk_save_tweets(&ctx(), vec![preset, Tweet::new("some_handle2", "two")])
        .unwrap();

    assert_eq!(saved[0].id, "SomeID1");
    assert!(!saved[1].id.is_empty());
    assert!(saved
        .iter()
        .all(|tweet| tweet.timestamp.as_millis() == Some(NOW_MILLIS)));
    assert_eq!(
        service.repository().calls(),
        vec![RepoCall::BulkSave(saved.clone())]
    );
}

#[test]
fn list_tweets_applies_page_limit_policy() {
    let service = service(RecordingRepository::default());

    service.list_tweets(&ctx(), 0, "").unwrap();
    service.list_tweets(&ctx(), -3, "").unwrap();
    service.list_tweets(&ctx(), 15, "abc").unwrap();
    let err = service.list_tweets(&ctx(), 31, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(
        service.repository().calls(),
        vec![
            RepoCall::ScanPage {
                limit: DEFAULT_PAGE_LIMIT,
                cursor: String::new()
            },
            RepoCall::ScanPage {
                limit: DEFAULT_PAGE_LIMIT,
                cursor: String::new()
            },
            RepoCall::ScanPage {
                limit: 15,
                cursor: "abc".to_string()
            },
        ]
    );
}

#[test]
fn author_listing_and_lookup_validate_identifiers() {
    let service = service(RecordingRepository::default());

    assert_eq!(
        service
            .list_author_tweets(&ctx(), "", 5, "")
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        service.get_tweet(&ctx(), "").unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert!(service.repository().calls().is_empty());

    service
        .list_author_tweets(&ctx(), "dan_abramov", 0, "")
        .unwrap();
    let missing = service.get_tweet(&ctx(), "nope").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
    assert_eq!(
        service.repository().calls(),
        vec![
            RepoCall::ListByAuthor {
                author: "dan_abramov".to_string(),
                limit: DEFAULT_PAGE_LIMIT
            },
            RepoCall::GetById("nope".to_string()),
        ]
    );
}

#[test]
fn like_toggle_requires_all_identifiers() {
    let service = service(RecordingRepository::default());

    for (tweet_id, author, user) in [("", "bob", "alice"), ("t1", "", "alice"), ("t1", "bob", "")]
    {
        let err = service
            .save_like_toggle(&ctx(), tweet_id, author, user, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(service.repository().calls().is_empty());

    service
        .save_like_toggle(&ctx(), "t1", "bob", "alice", true)
        .unwrap();
    assert_eq!(
        service.repository().calls(),
        vec![RepoCall::ToggleLike {
            tweet_id: "t1".to_string(),
            author: "bob".to_string(),
            acting_user: "alice".to_string(),
            has_liked: true
        }]
    );
}

fn sqlite_service() -> (
    TweetService<SqliteTweetRepository, FixedClock>,
    SqliteUserRepository,
) {
    let db = Database::in_memory().unwrap();
    let users = SqliteUserRepository::try_new(db.clone()).unwrap();
    for id in ["sarah_edo", "bob"] {
        users.create_user(&ctx(), &User::new(id, id)).unwrap();
    }
    let repo = SqliteTweetRepository::try_new(db).unwrap();
    (
        TweetService::with_clock(repo, FixedClock::at_millis(NOW_MILLIS)),
        users,
    )
}

#[test]
fn reply_to_missing_tweet_fails_with_no_partial_write() {
    let (service, users) = sqlite_service();

    let mut reply = Tweet::new("sarah_edo", "...");
    reply.replying_to = "t1:bob".to_string();
    let err = service.save_tweet(&ctx(), reply).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    assert!(users.get_user(&ctx(), "sarah_edo").unwrap().tweets.is_empty());
    assert!(service.list_tweets(&ctx(), 0, "").unwrap().items.is_empty());
}

#[test]
fn reply_fan_out_end_to_end() {
    let (service, users) = sqlite_service();

    let mut root = Tweet::new("bob", "root");
    root.id = "t1".to_string();
    service.save_tweet(&ctx(), root).unwrap();

    let mut reply = Tweet::new("sarah_edo", "...");
    reply.replying_to = "t1:bob".to_string();
    let saved = service.save_tweet(&ctx(), reply).unwrap();

    let root = service.get_tweet(&ctx(), "t1").unwrap();
    assert!(root.replies.contains(&saved.id));
    assert_eq!(root.timestamp.as_millis(), Some(NOW_MILLIS));
    assert!(users
        .get_user(&ctx(), "sarah_edo")
        .unwrap()
        .tweets
        .contains(&saved.id));

    service
        .save_like_toggle(&ctx(), "t1", "bob", "sarah_edo", false)
        .unwrap();
    service
        .save_like_toggle(&ctx(), "t1", "bob", "sarah_edo", false)
        .unwrap();
    let liked = service.get_tweet(&ctx(), "t1").unwrap();
    assert_eq!(liked.likes.len(), 1);

    let timeline = service
        .list_author_tweets(&ctx(), "sarah_edo", 0, "")
        .unwrap();
    assert_eq!(timeline.items, vec![saved]);
}

#[test]
fn bulk_import_over_capacity_is_rejected() {
    let (service, _users) = sqlite_service();

    let batch: Vec<Tweet> = (0..26)
        .map(|i| Tweet::new("importer", format!("tweet {i}")))
        .collect();
    let err = service.bulk_save_tweets(&ctx(), batch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert!(service.list_tweets(&ctx(), 30, "").unwrap().items.is_empty());
}
