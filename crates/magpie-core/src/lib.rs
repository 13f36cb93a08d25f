//! Core types, configuration, and error handling for the Magpie bot.
//!
//! This crate provides the shared foundation used by the review crate and
//! the binary:
//! - [`MagpieError`] — unified error type using `thiserror`
//! - [`BotConfig`] — configuration assembled from environment variables
//! - Shared types: [`ChangedFile`], [`FileStatus`], [`ReviewFinding`],
//!   [`PlacedComment`]

mod config;
mod error;
mod types;

pub use config::{BotConfig, FilterConfig, GithubConfig, LlmConfig};
pub use error::MagpieError;
pub use types::{ChangedFile, FileStatus, PlacedComment, ReviewFinding};

/// A convenience `Result` type for Magpie operations.
pub type Result<T> = std::result::Result<T, MagpieError>;
