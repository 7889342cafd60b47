use thiserror::Error;

use crate::{descriptor::DescriptorError, TypeIdentity};

/// Failures while populating a registry. These are programming errors and
/// should abort initialization.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("type `{0}` is already registered")]
    DuplicateRegistration(TypeIdentity),
    #[error("invalid descriptor for `{identity}`: {source}")]
    InvalidDescriptor {
        identity: TypeIdentity,
        #[source]
        source: DescriptorError,
    },
    #[error("field `{field}` of `{identity}` refers to unregistered type `{target}`")]
    UnresolvedReference {
        identity: TypeIdentity,
        field: &'static str,
        target: TypeIdentity,
    },
    #[error("registry is sealed, no further registrations are accepted")]
    Sealed,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("type `{0}` is not registered")]
    UnknownType(String),
    #[error("failed to encode `{identity}`: {source}")]
    Encoding {
        identity: TypeIdentity,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to decode `{identity}`: {source}")]
    Decoding {
        identity: TypeIdentity,
        #[source]
        source: bincode::Error,
    },
    #[error("`{identity}` is registered for `{expected}`, got `{found}`")]
    TypeMismatch {
        identity: TypeIdentity,
        expected: &'static str,
        found: &'static str,
    },
    #[error("registry has not been sealed yet")]
    NotSealed,
}

impl CodecError {
    /// The process does not know the type: a code or deployment mismatch.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, CodecError::UnknownType(_))
    }

    /// The bytes or the message itself were rejected: a data problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            CodecError::Encoding { .. } | CodecError::Decoding { .. }
        )
    }

    /// The type this error is about, when one was involved.
    pub fn identity(&self) -> Option<&str> {
        match self {
            CodecError::UnknownType(name) => Some(name),
            CodecError::Encoding { identity, .. }
            | CodecError::Decoding { identity, .. }
            | CodecError::TypeMismatch { identity, .. } => Some(identity.name()),
            CodecError::NotSealed => None,
        }
    }
}
