//! Cross-architecture emulation bootstrap.
//!
//! Registers binfmt_misc handlers by running the installer image as a
//! one-shot privileged container, so build stages for foreign architectures
//! can execute on this host. Registration mutates host-wide state and is not
//! rolled back; the runner is assumed ephemeral.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use slipway_core::image::Platform;
use slipway_core::stage::EmulationBootstrap;
use slipway_core::{Error, Result, RunId};
use tracing::{debug, info, warn};

/// Installer image that registers qemu binfmt handlers.
const BINFMT_IMAGE: &str = "tonistiigi/binfmt:latest";

/// Installs binfmt emulation through the local Docker daemon.
pub struct BinfmtInstaller {
    docker: Docker,
    run_id: RunId,
}

impl BinfmtInstaller {
    /// Connect to the local Docker daemon.
    pub fn new(run_id: RunId) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::EmulationFailed(e.to_string()))?;
        Ok(Self { docker, run_id })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker, run_id: RunId) -> Self {
        Self { docker, run_id }
    }

    fn container_name(&self) -> String {
        format!("slipway-binfmt-{}", self.run_id.short())
    }

    /// Arguments handed to the installer image.
    fn install_args(platforms: &[Platform]) -> Vec<String> {
        let archs = platforms
            .iter()
            .map(|p| p.arch().to_string())
            .collect::<Vec<_>>()
            .join(",");
        vec!["--install".to_string(), archs]
    }

    async fn remove_container(&self, name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(name, Some(options)).await {
            warn!(container = %name, error = %e, "Failed to remove installer container");
        }
    }
}

#[async_trait]
impl EmulationBootstrap for BinfmtInstaller {
    async fn install(&self, platforms: &[Platform]) -> Result<()> {
        let container_name = self.container_name();

        // Pull the installer image first
        info!(image = BINFMT_IMAGE, "Pulling binfmt installer image");
        let create_image_options = CreateImageOptions {
            from_image: BINFMT_IMAGE.to_string(),
            ..Default::default()
        };

        let mut pull_stream = self
            .docker
            .create_image(Some(create_image_options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Pull warning");
                }
            }
        }

        // binfmt_misc registration needs a privileged container; when the
        // daemon refuses that capability the stage fails closed rather than
        // degrading to native-only builds.
        let host_config = HostConfig {
            privileged: Some(true),
            ..Default::default()
        };

        let config = Config {
            image: Some(BINFMT_IMAGE.to_string()),
            cmd: Some(Self::install_args(platforms)),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        info!(container = %container_name, ?platforms, "Registering emulation handlers");
        self.docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| {
                Error::EmulationFailed(format!("failed to create installer container: {}", e))
            })?;

        if let Err(e) = self
            .docker
            .start_container(&container_name, None::<StartContainerOptions<String>>)
            .await
        {
            self.remove_container(&container_name).await;
            return Err(Error::EmulationFailed(format!(
                "failed to start installer container: {}",
                e
            )));
        }

        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(&container_name, Some(options));
        if let Some(Err(e)) = stream.next().await {
            debug!(error = %e, "Installer wait returned an error, inspecting exit code");
        }

        // The wait stream reports non-zero exits as errors; the inspect
        // state carries the definitive exit code either way.
        let inspect = self
            .docker
            .inspect_container(&container_name, None)
            .await
            .map_err(|e| Error::EmulationFailed(format!("installer container lost: {}", e)));

        let exit_code = match inspect {
            Ok(response) => response.state.and_then(|s| s.exit_code),
            Err(e) => {
                self.remove_container(&container_name).await;
                return Err(e);
            }
        };

        self.remove_container(&container_name).await;

        match exit_code {
            Some(0) => {
                info!("Emulation handlers registered");
                Ok(())
            }
            code => Err(Error::EmulationFailed(format!(
                "installer exited with code {:?}",
                code
            ))),
        }
    }
}
