//! Common error types for caplink

use thiserror::Error;

/// Common result type for caplink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across caplink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
