//! Stage contracts for the release pipeline.
//!
//! Each external collaborator the sequencer drives sits behind one async
//! trait, so a run can be exercised against the real Docker daemon or
//! against test doubles.

use std::fmt;

use async_trait::async_trait;

use crate::Result;
use crate::image::{BuildRequest, BuildResult, Platform};

/// Registry credentials. Alive only for the duration of the login call;
/// never persisted and never logged.
#[derive(Clone)]
pub struct Credentials {
    pub principal: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Proof of a completed registry login. The session is process-wide and
/// expires with the runner; there is no logout.
#[derive(Debug, Clone)]
pub struct RegistrySession {
    pub registry: String,
    pub principal: String,
}

/// Authenticates against an image registry.
#[async_trait]
pub trait RegistryAuth: Send + Sync {
    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<RegistrySession>;
}

/// Runs the project's test command. Pass/fail only.
#[async_trait]
pub trait TestGate: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Registers execution support for foreign architectures on the build host,
/// so a single runner can build every target platform. Implementations
/// require privileged execution and fail closed when it is unavailable.
#[async_trait]
pub trait EmulationBootstrap: Send + Sync {
    async fn install(&self, platforms: &[Platform]) -> Result<()>;
}

/// Builds one manifest list covering every requested platform and, when the
/// request says so, pushes it to the registry as part of the same operation.
/// There is no intermediate local artifact and no separately retryable push.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build_and_publish(&self, request: BuildRequest) -> Result<BuildResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_masks_secret() {
        let credentials = Credentials::new("acme", "hunter2");
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("acme"));
        assert!(!rendered.contains("hunter2"));
    }
}
