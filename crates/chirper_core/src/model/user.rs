//! User aggregate referenced by tweet authors.
//!
//! Only the slice the tweet core needs: identity, display name and the set
//! of authored tweet ids maintained by the save fan-out.

use crate::model::timestamp::Timestamp;
use crate::model::tweet::{TweetId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Timestamp,
    /// Ids of tweets authored by this user.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tweets: BTreeSet<TweetId>,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}
