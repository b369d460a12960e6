//! Rapport is a terminal client for a companion chat backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire types and the HTTP client for the backend's
//!   REST routes.
//! - [`auth`] exchanges OAuth authorization codes for bearer tokens, keeps
//!   the token in the system keyring, and records who is signed in.
//! - [`core`] owns the in-memory chat list, the calls that change it, the
//!   background refresh, and configuration.
//! - [`ui`] renders profiles, chats and memories as text and runs the
//!   interactive session.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which resolves settings and dispatches to
//! one-shot commands or [`ui::repl`] for interactive sessions.

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;
pub mod utils;
