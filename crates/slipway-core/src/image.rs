//! Platform, build request and build result types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tag::{Namespace, Tag};
use crate::{Error, Result};

/// A build platform in `os/arch` form, e.g. `linux/amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform(String);

impl Platform {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        match value.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self(value)),
            _ => Err(Error::InvalidInput(format!(
                "'{}' is not an os/arch platform",
                value
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The architecture component, e.g. `amd64`.
    pub fn arch(&self) -> &str {
        // Validated to contain a separator on construction.
        self.0.split_once('/').map(|(_, arch)| arch).unwrap_or("")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full reference an image is published under:
/// `{namespace}/{name}:{tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub namespace: Namespace,
    pub name: String,
    pub tag: Tag,
}

impl ImageRef {
    pub fn new(namespace: Namespace, name: impl Into<String>, tag: Tag) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidInput("image name is empty".to_string()));
        }
        Ok(Self {
            namespace,
            name,
            tag,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.tag)
    }
}

/// One multi-platform build-and-publish request.
/// Constructed once, consumed once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Dockerfile path, relative to the build context.
    pub dockerfile: PathBuf,
    /// Build context directory (the project root).
    pub context: PathBuf,
    /// Platforms the single manifest list must cover.
    pub platforms: Vec<Platform>,
    /// Destination reference.
    pub image: ImageRef,
    /// Push the manifest directly to the registry as part of the build.
    pub push: bool,
}

/// Outcome of a completed build step. The registry is the system of record;
/// nothing here is persisted by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub image: ImageRef,
    pub platforms: Vec<Platform>,
    /// Whether the manifest was pushed to the registry.
    pub pushed: bool,
    /// Manifest digest reported by the builder, when available.
    pub digest: Option<String>,
    pub duration: Duration,
}
