//! Core use-case services.
//!
//! # Responsibility
//! - Validate input and orchestrate repository calls into use-case APIs.
//! - Keep transport layers decoupled from storage details.

pub mod tweet_service;
