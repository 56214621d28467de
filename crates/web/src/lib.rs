//! Snippetbox web library.
//!
//! The binary in `main.rs` is a thin shell around this crate so the request
//! pipeline, routes and collaborators can be driven in-process by tests.
//!
//! # Request flow
//!
//! ```text
//! standard chain:  RecoverPanic -> LogRequest -> SecureHeaders -> router
//! dynamic chain:   LoadAndSave -> CsrfProtect -> Authenticate -> handler
//! protected:       dynamic + RequireAuthentication
//! guest:           dynamic + RequireUnauthentication
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
