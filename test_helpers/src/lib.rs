//! Test helpers shared across the workspace.
//!
//! - [`env`]: serialised environment variable guards.
//! - [`fs`]: temporary configuration directories.
//! - [`http`]: a stub HTTP server with a mutable response.

pub mod env;
pub mod fs;
pub mod http;
