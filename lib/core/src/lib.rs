//! Core types shared across fedgate crates.
//!
//! This crate provides the rootcause-based `Result` alias, strongly-typed
//! ULID identifiers, and random token generation.

pub mod error;
pub mod id;
pub mod random;

pub use error::Result;
pub use id::{LoginAttemptId, ParseIdError, SessionId, UserId};
