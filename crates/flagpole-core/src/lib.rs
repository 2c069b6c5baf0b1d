//! Core types and the targeting-page state machine for Flagpole.
//!
//! This crate is deliberately free of HTTP, terminal and database
//! dependencies. The service layer and the persisted context store are
//! expressed as traits; `flagpole-cli` and `flagpole-store-sqlite` implement
//! them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod context;
pub mod controller;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod history;
pub mod history_view;
pub mod model;
pub mod service;
pub mod view_state;

pub use error::{Error, Result};
