//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`add`] - Record one speed sample
//! - [`dump`] - Print the stored snapshot
//! - [`purge`] - Delete the stored snapshot
//! - [`query`] - Ask for the advisory speed ahead
//! - [`stats`] - Summarize the stored grid

pub mod add;
pub mod common;
pub mod dump;
pub mod purge;
pub mod query;
pub mod stats;
