//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define storage contracts the service layer depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Tweet::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `PreconditionFailed`,
//!   `CapacityExceeded`) in addition to store transport errors.

pub mod record;
pub mod tweet_repo;
pub mod user_repo;
