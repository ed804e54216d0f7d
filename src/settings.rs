//! Conversion settings
//!
//! Read from YAML by callers that keep them on disk; every key is optional.
//!
//! ```yaml
//! default_meter: { count: 3, unit: 4 }
//! identity_policy: FreshRandom
//! beam_groups: false
//! ```

use crate::errors::{ConversionError, ConversionResult};
use crate::identity::IdentityPolicy;
use crate::models::Meter;
use serde::{Deserialize, Serialize};

/// Configuration options for one conversion action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    /// Meter assumed when a staff definition has none
    pub default_meter: Meter,

    /// How identifiers are produced
    pub identity_policy: IdentityPolicy,

    /// Insert beam spans after segmentation
    pub beam_groups: bool,

    /// Persist the identity map after a successful content-addressed run
    pub commit_identities: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            default_meter: Meter::default(),
            identity_policy: IdentityPolicy::ContentAddressed,
            beam_groups: true,
            commit_identities: true,
        }
    }
}

impl ConversionSettings {
    pub fn from_yaml(source: &str) -> ConversionResult<Self> {
        serde_yaml::from_str(source).map_err(|e| ConversionError::Settings(e.to_string()))
    }

    pub fn to_yaml(&self) -> ConversionResult<String> {
        serde_yaml::to_string(self).map_err(|e| ConversionError::Settings(e.to_string()))
    }
}
