//! Core types and trait definitions for the passagr editorial pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The pipeline, the storage backends and the API all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod changelog;
pub mod diff;
pub mod entity;
pub mod error;
pub mod policy;
pub mod review;
pub mod source;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
