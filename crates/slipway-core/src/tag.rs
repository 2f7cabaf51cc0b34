//! Registry tag and namespace resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tag published for primary-branch builds.
pub const LATEST_TAG: &str = "latest";

/// A validated registry tag token.
///
/// Never empty; never contains `/`, `:` or whitespace. Case is preserved
/// as-is; registries accept mixed-case tags, and release versions like
/// `v2.0.0-RC1` must survive untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    /// Validate and wrap a tag token.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidTag("tag is empty".to_string()));
        }
        if value.contains('/') || value.contains(':') || value.chars().any(char::is_whitespace) {
            return Err(Error::InvalidTag(format!(
                "'{}' is not a valid tag token",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registry namespace, derived from the registry principal.
///
/// Registries require lowercase repository paths, so the principal is
/// lowercased on construction. The operation is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn from_principal(principal: &str) -> Result<Self> {
        let value = principal.trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(Error::InvalidInput(
                "registry principal is empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the registry tag for a source reference.
///
/// The primary branch and the empty reference both map to `latest`. Any
/// other reference maps to its final path segment (`refs/tags/v2.0.0` →
/// `v2.0.0`); a reference with no separator is its own segment. A reference
/// whose final segment is empty is an error; never a silent fallback to an
/// arbitrary tag.
pub fn resolve_tag(reference: &str, primary_branch_ref: &str) -> Result<Tag> {
    if reference.is_empty() || reference == primary_branch_ref {
        return Tag::new(LATEST_TAG);
    }

    let candidate = reference.rsplit('/').next().unwrap_or(reference);
    if candidate.is_empty() {
        return Err(Error::InvalidTag(format!(
            "reference '{}' has an empty final segment",
            reference
        )));
    }

    Tag::new(candidate)
}
