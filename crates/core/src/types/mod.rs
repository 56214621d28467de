//! Core types for Snippetbox.
//!
//! This module provides type-safe wrappers for the domain concepts shared
//! between the web binary and the CLI.

pub mod email;
pub mod id;
pub mod lifetime;

pub use email::{Email, EmailError};
pub use id::*;
pub use lifetime::{LifetimeError, SnippetLifetime};
