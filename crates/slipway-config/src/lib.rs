//! KDL configuration parsing for Slipway.
//!
//! A project describes its release pipeline in a `slipway.kdl` file: image
//! name and build inputs, target platforms, registry, primary branch and the
//! test command gating every publish.

pub mod error;
pub mod release;

pub use error::{ConfigError, ConfigResult};
pub use release::{ImageConfig, ReleaseConfig, parse_release_config};
