use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf};
use thiserror::Error;

pub mod engine;
pub mod registry;

pub use engine::EngineConfig;
pub use registry::RegistryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read configuration file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Couldn't parse config at {path:?}. Reason: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the codec registry and the encoding engine behind it.
///
/// Every section falls back to its defaults, so an empty file is a valid config.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    pub engine: EngineConfig,
    pub registry: RegistryConfig,
}

impl CodecConfig {
    /// Parses a config from toml text without touching the filesystem.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

pub trait LoadConfiguration {
    fn load(dir: &Path) -> Result<Self, ConfigError>
    where
        Self: Sized + Default + Serialize + DeserializeOwned,
    {
        let path = dir.join(Self::get_path());

        let config = if path.exists() {
            let file_content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;

            toml::from_str(&file_content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            let content = Self::default();

            match toml::to_string(&content) {
                Ok(text) => {
                    if let Err(err) = fs::write(&path, text) {
                        warn!(
                            "Couldn't write default config to {:?}. Reason: {}. Continuing with defaults",
                            &path, err
                        );
                    }
                }
                Err(err) => warn!("Couldn't render default config: {}", err),
            }

            content
        };

        config.validate()?;
        Ok(config)
    }

    fn get_path() -> &'static Path;

    fn validate(&self) -> Result<(), ConfigError>;
}

impl LoadConfiguration for CodecConfig {
    fn get_path() -> &'static Path {
        Path::new("marshal.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()
    }
}
