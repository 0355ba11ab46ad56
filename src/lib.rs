//! List Movies Library
//!
//! Identifies movie files by content fingerprint, resolves them to movie
//! metadata through remote services and caches the result, so listing a
//! collection again costs no network lookups.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod services;

pub use error::{Error, Result};
