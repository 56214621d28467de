//! Domain models for snippetbox.

pub mod session;
mod snippet;

pub use snippet::Snippet;
