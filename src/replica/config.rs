use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::ReplicaError;
use crate::integrator::DEFAULT_ROLLBACK_WARN_THRESHOLD;

/// Configuration for a replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Site used to author blobs; generated when absent
    pub site: Option<String>,

    /// Check that every delivered blob hashes to its ref
    pub verify_blob_refs: bool,

    /// Rollbacks deeper than this are logged as warnings
    pub rollback_warn_threshold: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            site: None,
            verify_blob_refs: true,
            rollback_warn_threshold: DEFAULT_ROLLBACK_WARN_THRESHOLD,
        }
    }
}

impl ReplicaConfig {
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ReplicaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReplicaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The configured site, or a fresh random one
    pub fn site_or_generate(&self) -> String {
        self.site
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}
