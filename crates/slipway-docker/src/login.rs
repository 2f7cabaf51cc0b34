//! Registry login via the docker CLI.

use std::process::Stdio;

use async_trait::async_trait;
use slipway_core::stage::{Credentials, RegistryAuth, RegistrySession};
use slipway_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Logs into a registry with `docker login`. The secret is written to the
/// child's stdin so it never appears in an argument list or the process
/// table.
#[derive(Debug, Default)]
pub struct DockerLogin;

impl DockerLogin {
    pub fn new() -> Self {
        Self
    }

    fn login_args(registry: &str, principal: &str) -> Vec<String> {
        vec![
            "login".to_string(),
            registry.to_string(),
            "--username".to_string(),
            principal.to_string(),
            "--password-stdin".to_string(),
        ]
    }
}

#[async_trait]
impl RegistryAuth for DockerLogin {
    async fn login(&self, registry: &str, credentials: &Credentials) -> Result<RegistrySession> {
        info!(registry, principal = %credentials.principal, "Logging into registry");

        let mut child = Command::new("docker")
            .args(Self::login_args(registry, &credentials.principal))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::AuthFailed(format!("failed to run docker login: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::AuthFailed("docker login stdin unavailable".to_string()))?;
        stdin
            .write_all(credentials.secret.as_bytes())
            .await
            .map_err(|e| Error::AuthFailed(format!("failed to send secret: {}", e)))?;
        // Close stdin so the CLI stops reading the password.
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::AuthFailed(format!("docker login did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::AuthFailed(format!(
                "registry '{}' rejected login for '{}': {}",
                registry,
                credentials.principal,
                stderr.trim()
            )));
        }

        info!(registry, "Login succeeded");

        Ok(RegistrySession {
            registry: registry.to_string(),
            principal: credentials.principal.clone(),
        })
    }
}
