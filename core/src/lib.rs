//! runonce core: the execution guard and the log destinations it writes to.
//!
//! Prefer importing from [`api`] in the `cli` and `plugins` crates.

pub mod api;
pub mod clock;
pub mod config;
pub mod destination;
pub mod error;
pub mod guard;
pub mod naming;
pub mod sink;
