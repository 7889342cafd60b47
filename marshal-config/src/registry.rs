use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Refuse to build a registry in which a message field points at an unregistered type.
    pub strict_references: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_references: true,
        }
    }
}
