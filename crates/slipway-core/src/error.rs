//! Error types for Slipway.
//!
//! One variant per failure class of a release run. Every variant is fatal:
//! the pipeline surfaces it and halts, with no retry and no compensation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("test command failed (exit code {exit_code:?})")]
    TestsFailed { exit_code: Option<i32> },

    #[error("emulation bootstrap failed: {0}")]
    EmulationFailed(String),

    #[error("invalid image tag: {0}")]
    InvalidTag(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
