//! Snippetbox Core - Shared value types.
//!
//! This crate provides the small domain types used by the web binary and the
//! CLI:
//! - `web` - The snippet-sharing site and its request pipeline
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP.
//! The optional `postgres` feature adds `sqlx` encode/decode impls.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, validated emails, and snippet lifetimes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
