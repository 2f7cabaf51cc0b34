//! Multi-platform image build and publish.
//!
//! One `docker buildx build` invocation covers every target platform and,
//! when pushing, transmits the resulting manifest list straight to the
//! registry. No local image artifact exists at any point, and build and push
//! are never split into separately retryable steps.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use slipway_core::image::{BuildRequest, BuildResult};
use slipway_core::stage::ImageBuilder;
use slipway_core::{Error, Result, RunId};
use tokio::process::Command;
use tracing::{debug, info};

/// Buildx builder instance shared by every run on this host. Multi-platform
/// manifests need the docker-container driver; the default docker driver
/// cannot produce them.
const BUILDER_NAME: &str = "slipway-builder";

/// Builds and publishes through `docker buildx`.
pub struct BuildxBuilder {
    run_id: RunId,
    builder_name: String,
}

impl BuildxBuilder {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            builder_name: BUILDER_NAME.to_string(),
        }
    }

    /// Use a non-default builder instance name.
    pub fn with_builder_name(run_id: RunId, builder_name: impl Into<String>) -> Self {
        Self {
            run_id,
            builder_name: builder_name.into(),
        }
    }

    /// Where buildx writes its result metadata for this run.
    fn metadata_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("slipway-build-{}.json", self.run_id.short()))
    }

    /// Argument list for the single build-and-publish invocation.
    fn build_args(
        builder_name: &str,
        request: &BuildRequest,
        metadata_path: &std::path::Path,
    ) -> Vec<String> {
        let platforms = request
            .platforms
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut args = vec![
            "buildx".to_string(),
            "build".to_string(),
            "--builder".to_string(),
            builder_name.to_string(),
            "--platform".to_string(),
            platforms,
            "--file".to_string(),
            request.dockerfile.display().to_string(),
            "--tag".to_string(),
            request.image.to_string(),
            "--metadata-file".to_string(),
            metadata_path.display().to_string(),
        ];

        if request.push {
            args.push("--push".to_string());
        }

        args.push(request.context.display().to_string());
        args
    }

    /// Make sure the docker-container builder instance exists. Created once
    /// per host and reused by later runs.
    async fn ensure_builder(&self) -> Result<()> {
        let status = Command::new("docker")
            .args(["buildx", "inspect", &self.builder_name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::BuildFailed(format!("failed to run docker buildx: {}", e)))?;

        if status.success() {
            debug!(builder = %self.builder_name, "Reusing existing buildx builder");
            return Ok(());
        }

        info!(builder = %self.builder_name, "Creating buildx builder");
        let output = Command::new("docker")
            .args([
                "buildx",
                "create",
                "--name",
                &self.builder_name,
                "--driver",
                "docker-container",
            ])
            .output()
            .await
            .map_err(|e| Error::BuildFailed(format!("failed to create buildx builder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::BuildFailed(format!(
                "buildx builder creation failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }

    /// Read the manifest digest buildx recorded, if any.
    async fn read_digest(metadata_path: &std::path::Path) -> Option<String> {
        let content = tokio::fs::read_to_string(metadata_path).await.ok()?;
        let metadata: serde_json::Value = serde_json::from_str(&content).ok()?;
        metadata
            .get("containerimage.digest")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl ImageBuilder for BuildxBuilder {
    async fn build_and_publish(&self, request: BuildRequest) -> Result<BuildResult> {
        self.ensure_builder().await?;

        let metadata_path = self.metadata_path();
        let args = Self::build_args(&self.builder_name, &request, &metadata_path);

        info!(
            image = %request.image,
            platforms = ?request.platforms,
            push = request.push,
            "Building multi-platform image"
        );

        let started = Instant::now();
        let status = Command::new("docker")
            .args(&args)
            .status()
            .await
            .map_err(|e| Error::BuildFailed(format!("failed to run docker buildx build: {}", e)))?;

        if !status.success() {
            return Err(Error::BuildFailed(format!(
                "buildx exited with {}",
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "no status".to_string())
            )));
        }

        let digest = Self::read_digest(&metadata_path).await;
        let _ = tokio::fs::remove_file(&metadata_path).await;

        let result = BuildResult {
            image: request.image,
            platforms: request.platforms,
            pushed: request.push,
            digest,
            duration: started.elapsed(),
        };

        info!(image = %result.image, digest = ?result.digest, "Build finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::image::{ImageRef, Platform};
    use slipway_core::tag::{Namespace, Tag};

    fn make_request(push: bool) -> BuildRequest {
        BuildRequest {
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            platforms: vec![
                Platform::new("linux/amd64").unwrap(),
                Platform::new("linux/arm64").unwrap(),
            ],
            image: ImageRef::new(
                Namespace::from_principal("Acme").unwrap(),
                "vuegraf",
                Tag::new("v2.0.0").unwrap(),
            )
            .unwrap(),
            push,
        }
    }

    #[test]
    fn test_build_args_cover_all_platforms() {
        let request = make_request(true);
        let args = BuildxBuilder::build_args("slipway-builder", &request, std::path::Path::new("/tmp/meta.json"));

        let platform_idx = args.iter().position(|a| a == "--platform").unwrap();
        assert_eq!(args[platform_idx + 1], "linux/amd64,linux/arm64");
    }

    #[test]
    fn test_build_args_tag_is_lowercased_namespace() {
        let request = make_request(true);
        let args = BuildxBuilder::build_args("slipway-builder", &request, std::path::Path::new("/tmp/meta.json"));

        let tag_idx = args.iter().position(|a| a == "--tag").unwrap();
        assert_eq!(args[tag_idx + 1], "acme/vuegraf:v2.0.0");
    }

    #[test]
    fn test_build_args_push_flag() {
        let request = make_request(true);
        let meta = std::path::Path::new("/tmp/meta.json");
        let args = BuildxBuilder::build_args("slipway-builder", &request, meta);
        assert!(args.contains(&"--push".to_string()));

        let request = make_request(false);
        let args = BuildxBuilder::build_args("slipway-builder", &request, meta);
        assert!(!args.contains(&"--push".to_string()));
    }

    #[test]
    fn test_build_args_end_with_context() {
        let request = make_request(true);
        let args = BuildxBuilder::build_args("slipway-builder", &request, std::path::Path::new("/tmp/meta.json"));
        assert_eq!(args.last().unwrap(), ".");
    }

    #[test]
    fn test_metadata_path_is_per_run() {
        let a = BuildxBuilder::new(RunId::new());
        let b = BuildxBuilder::new(RunId::new());
        assert_ne!(a.metadata_path(), b.metadata_path());
    }
}
