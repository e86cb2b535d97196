//! Domain model for tweets and the user aggregate they reference.
//!
//! # Responsibility
//! - Define canonical data structures used by service and repository layers.
//! - Own the external encodings of timestamps and reply references.
//!
//! # Invariants
//! - Tweets are identified by a stable string id assigned once.
//! - There is no deletion; records only grow through likes and replies.

pub mod timestamp;
pub mod tweet;
pub mod user;
