use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// 4 MiB, the same ceiling gRPC puts on a single message by default.
pub const DEFAULT_MAX_MESSAGE_SIZE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound in bytes for a single encoded message, enforced in both directions.
    pub max_message_size: u64,
    /// How many structs, options, sequences, maps and enums may nest inside
    /// each other, counting the message itself.
    pub max_depth: usize,
    /// Accept input that has bytes left over after a complete message was read.
    pub allow_trailing_bytes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            allow_trailing_bytes: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_message_size must be greater than 0".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
