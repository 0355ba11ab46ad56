//! Core business logic modules.

pub mod cache;
pub mod filter;
pub mod fingerprint;
pub mod guesser;
pub mod matcher;
pub mod resolver;
pub mod scanner;
pub mod subtitles;
