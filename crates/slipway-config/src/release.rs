//! Release configuration parsing.

use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use slipway_core::image::Platform;

use crate::{ConfigError, ConfigResult};

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_PRIMARY_BRANCH: &str = "refs/heads/master";
const DEFAULT_DOCKERFILE: &str = "Dockerfile";
const DEFAULT_CONTEXT: &str = ".";

/// One project's release pipeline configuration (`slipway.kdl`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Project name.
    pub project: String,
    /// Registry host to log into and push to.
    pub registry: String,
    /// Fully qualified reference of the primary branch.
    pub primary_branch: String,
    /// Image build inputs.
    pub image: ImageConfig,
    /// Test command gating every publish, as argv.
    pub test_command: Vec<String>,
}

/// Image build inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image name within the registry namespace.
    pub name: String,
    /// Dockerfile path, relative to the context.
    pub dockerfile: String,
    /// Build context directory, relative to the configuration file.
    pub context: String,
    /// Target platforms. At least two; a single-platform set defeats the
    /// point of a manifest list.
    pub platforms: Vec<Platform>,
}

/// Parse a release configuration from KDL text.
pub fn parse_release_config(kdl: &str) -> ConfigResult<ReleaseConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut project = String::new();
    let mut registry = DEFAULT_REGISTRY.to_string();
    let mut primary_branch = DEFAULT_PRIMARY_BRANCH.to_string();
    let mut image = None;
    let mut test_command = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                project = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;
            }
            "registry" => {
                if let Some(value) = get_first_string_arg(node) {
                    registry = value;
                }
            }
            "primary-branch" => {
                if let Some(value) = get_first_string_arg(node) {
                    primary_branch = value;
                }
            }
            "image" => {
                image = Some(parse_image(node, &project)?);
            }
            "test" => {
                test_command = get_all_string_args(node);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if project.is_empty() {
        return Err(ConfigError::MissingField("project name".to_string()));
    }

    let image = image.ok_or_else(|| ConfigError::MissingField("image block".to_string()))?;

    if test_command.is_empty() {
        return Err(ConfigError::MissingField("test command".to_string()));
    }

    Ok(ReleaseConfig {
        project,
        registry,
        primary_branch,
        image,
        test_command,
    })
}

fn parse_image(node: &KdlNode, project: &str) -> ConfigResult<ImageConfig> {
    let mut name = project.to_string();
    let mut dockerfile = DEFAULT_DOCKERFILE.to_string();
    let mut context = DEFAULT_CONTEXT.to_string();
    let mut platforms = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "name" => {
                    if let Some(value) = get_first_string_arg(child) {
                        name = value;
                    }
                }
                "dockerfile" => {
                    if let Some(value) = get_first_string_arg(child) {
                        dockerfile = value;
                    }
                }
                "context" => {
                    if let Some(value) = get_first_string_arg(child) {
                        context = value;
                    }
                }
                "platform" => {
                    for value in get_all_string_args(child) {
                        let platform =
                            Platform::new(value).map_err(|e| ConfigError::InvalidValue {
                                field: "platform".to_string(),
                                message: e.to_string(),
                            })?;
                        platforms.push(platform);
                    }
                }
                _ => {}
            }
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("image name".to_string()));
    }

    if platforms.len() < 2 {
        return Err(ConfigError::InvalidValue {
            field: "platform".to_string(),
            message: format!(
                "a multi-platform release needs at least two platforms, found {}",
                platforms.len()
            ),
        });
    }

    Ok(ImageConfig {
        name,
        dockerfile,
        context,
        platforms,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
