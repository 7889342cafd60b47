//! Schema-driven binary codec registry.
//!
//! Message types describe themselves once through `#[derive(Message)]`; a
//! [`Registry`] maps each [`TypeIdentity`] to its [`Descriptor`] and offers a
//! single generic encode/decode path for all of them, including callers that
//! only hold a `&dyn Message`.

// Lets the derive macros refer to `::marshal` from inside this crate.
extern crate self as marshal;

pub mod binary;
pub mod descriptor;
pub mod engine;
mod depth;
mod error;
mod field;
pub mod global;
mod identity;
mod message;
mod registry;

pub use binary::BinaryCodec;
pub use descriptor::{Cardinality, Descriptor, DescriptorError, FieldDescriptor, FieldKind, WireType};
pub use engine::Engine;
pub use error::{CodecError, RegistryError};
pub use field::{Enumeration, FieldValue};
pub use identity::TypeIdentity;
pub use marshal_config::CodecConfig;
pub use marshal_macros::{Enumeration, Message};
pub use message::{Message, Schema};
pub use registry::{Registry, RegistryBuilder};
