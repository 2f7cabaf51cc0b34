//! Docker-backed stage implementations for Slipway.
//!
//! - Registry login through the docker CLI
//! - Host test gate
//! - binfmt emulation bootstrap through the Docker Engine API
//! - buildx multi-platform build-and-publish

pub mod binfmt;
pub mod buildx;
pub mod gate;
pub mod login;

pub use binfmt::BinfmtInstaller;
pub use buildx::BuildxBuilder;
pub use gate::HostTestGate;
pub use login::DockerLogin;
