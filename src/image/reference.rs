//! Image identifiers and their canonical string form

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `{registry, repository, tag}` triple naming one image.
///
/// An empty `registry` means the default namespace of the local image tool, in which case the
/// canonical form omits the registry segment entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into().trim_matches('/').to_string(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn has_registry(&self) -> bool {
        !self.registry.is_empty()
    }

    /// `registry/repository:tag`, or `repository:tag` without a registry
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Local repository name as the image tool lists it, i.e. the canonical form minus the tag
    pub fn local_repository(&self) -> String {
        if self.registry.is_empty() {
            self.repository.clone()
        } else {
            format!("{}/{}", self.registry, self.repository)
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.registry.is_empty() {
            write!(f, "{}:{}", self.repository, self.tag)
        } else {
            write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }
}
