//! Core domain types for the Slipway release pipeline.
//!
//! This crate contains:
//! - Run identifiers and source events
//! - Tag and namespace resolution
//! - Platform, build request and build result types
//! - Stage contracts the pipeline sequencer drives

pub mod error;
pub mod event;
pub mod id;
pub mod image;
pub mod stage;
pub mod tag;

pub use error::{Error, Result};
pub use id::RunId;
