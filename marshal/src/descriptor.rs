use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use thiserror::Error;

use crate::{engine::Engine, FieldValue, Message, Schema, TypeIdentity};

/// Largest field number protobuf allows, `2^29 - 1`.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers protobuf keeps for its own implementation.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19000..=19999;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Bytes,
    Enum(TypeIdentity),
    Message(TypeIdentity),
}

impl FieldKind {
    /// Protobuf only accepts integral, bool and string map keys.
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            FieldKind::Bool
                | FieldKind::Int32
                | FieldKind::Int64
                | FieldKind::Uint32
                | FieldKind::Uint64
                | FieldKind::String
        )
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Bool
            | FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::Uint32
            | FieldKind::Uint64
            | FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Float => WireType::Fixed32,
            FieldKind::Double => WireType::Fixed64,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => {
                WireType::LengthDelimited
            }
        }
    }

    /// The message type this kind points at, if any.
    pub fn message_reference(&self) -> Option<TypeIdentity> {
        match self {
            FieldKind::Message(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => f.write_str("bool"),
            FieldKind::Int32 => f.write_str("int32"),
            FieldKind::Int64 => f.write_str("int64"),
            FieldKind::Uint32 => f.write_str("uint32"),
            FieldKind::Uint64 => f.write_str("uint64"),
            FieldKind::Float => f.write_str("float"),
            FieldKind::Double => f.write_str("double"),
            FieldKind::String => f.write_str("string"),
            FieldKind::Bytes => f.write_str("bytes"),
            FieldKind::Enum(identity) | FieldKind::Message(identity) => {
                write!(f, "{identity}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Singular,
    Optional,
    Repeated,
    Map { key: FieldKind },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: &'static str,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
}

impl FieldDescriptor {
    pub fn of<T: FieldValue>(number: u32, name: &'static str) -> Self {
        Self {
            number,
            name,
            kind: T::kind(),
            cardinality: T::cardinality(),
        }
    }

    /// Repeated and map fields are always length delimited on the wire.
    pub fn wire_type(&self) -> WireType {
        match self.cardinality {
            Cardinality::Singular | Cardinality::Optional => self.kind.wire_type(),
            Cardinality::Repeated | Cardinality::Map { .. } => WireType::LengthDelimited,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cardinality {
            Cardinality::Singular => write!(f, "{}", self.kind)?,
            Cardinality::Optional => write!(f, "optional {}", self.kind)?,
            Cardinality::Repeated => write!(f, "repeated {}", self.kind)?,
            Cardinality::Map { key } => write!(f, "map<{key}, {}>", self.kind)?,
        }
        write!(f, " {} = {};", self.name, self.number)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("type identity `{0}` is not a dotted identifier")]
    MalformedIdentity(TypeIdentity),
    #[error("field `{field}` uses number {number}, which is out of range or reserved")]
    InvalidFieldNumber { field: &'static str, number: u32 },
    #[error("fields `{first}` and `{second}` share number {number}")]
    DuplicateFieldNumber {
        number: u32,
        first: &'static str,
        second: &'static str,
    },
    #[error("field name `{0}` is used more than once")]
    DuplicateFieldName(&'static str),
    #[error("field `{field}` is a map keyed by `{key}`, which cannot be a map key")]
    InvalidMapKey { field: &'static str, key: FieldKind },
}

type EncodeFn = fn(&Engine, &dyn Any) -> Option<bincode::Result<Vec<u8>>>;
type DecodeFn = fn(&Engine, &[u8]) -> bincode::Result<Box<dyn Message>>;
type ZeroFn = fn() -> Box<dyn Message>;

fn erased_encode<T: Schema>(
    engine: &Engine,
    message: &dyn Any,
) -> Option<bincode::Result<Vec<u8>>> {
    message
        .downcast_ref::<T>()
        .map(|message| engine.encode(message))
}

fn erased_decode<T: Schema>(engine: &Engine, bytes: &[u8]) -> bincode::Result<Box<dyn Message>> {
    let message: T = engine.decode(bytes)?;
    Ok(Box::new(message))
}

fn erased_zero<T: Schema>() -> Box<dyn Message> {
    Box::new(T::default())
}

/// Field layout of one message type plus the entry points the engine needs
/// to encode and decode it without knowing the concrete type.
///
/// Built once per type through [`Descriptor::of`] and never mutated.
pub struct Descriptor {
    identity: TypeIdentity,
    rust_type: TypeId,
    rust_name: &'static str,
    fields: Vec<FieldDescriptor>,
    encode: EncodeFn,
    decode: DecodeFn,
    zero: ZeroFn,
}

impl Descriptor {
    pub fn of<T: Schema>() -> Self {
        let mut fields = T::fields();
        fields.sort_by_key(|field| field.number);
        Self {
            identity: T::IDENTITY,
            rust_type: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            fields,
            encode: erased_encode::<T>,
            decode: erased_decode::<T>,
            zero: erased_zero::<T>,
        }
    }

    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Fields ordered by number.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields
            .binary_search_by_key(&number, |field| field.number)
            .ok()
            .map(|index| &self.fields[index])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn is_type<T: 'static>(&self) -> bool {
        self.rust_type == TypeId::of::<T>()
    }

    /// Message types referenced by this descriptor's fields, in field order.
    pub fn references(&self) -> impl Iterator<Item = (&'static str, TypeIdentity)> + '_ {
        self.fields.iter().filter_map(|field| {
            field
                .kind
                .message_reference()
                .map(|target| (field.name, target))
        })
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if !self.identity.is_well_formed() {
            return Err(DescriptorError::MalformedIdentity(self.identity));
        }

        let mut numbers: HashMap<u32, &'static str> = HashMap::with_capacity(self.fields.len());
        let mut names: HashMap<&'static str, u32> = HashMap::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.number == 0
                || field.number > MAX_FIELD_NUMBER
                || RESERVED_FIELD_NUMBERS.contains(&field.number)
            {
                return Err(DescriptorError::InvalidFieldNumber {
                    field: field.name,
                    number: field.number,
                });
            }
            if let Some(first) = numbers.insert(field.number, field.name) {
                return Err(DescriptorError::DuplicateFieldNumber {
                    number: field.number,
                    first,
                    second: field.name,
                });
            }
            if names.insert(field.name, field.number).is_some() {
                return Err(DescriptorError::DuplicateFieldName(field.name));
            }
            if let Cardinality::Map { key } = field.cardinality {
                if !key.is_valid_map_key() {
                    return Err(DescriptorError::InvalidMapKey {
                        field: field.name,
                        key,
                    });
                }
            }
        }
        Ok(())
    }

    /// `None` when `message` is not of this descriptor's Rust type.
    pub(crate) fn encode_erased(
        &self,
        engine: &Engine,
        message: &dyn Any,
    ) -> Option<bincode::Result<Vec<u8>>> {
        (self.encode)(engine, message)
    }

    pub(crate) fn decode_erased(
        &self,
        engine: &Engine,
        bytes: &[u8],
    ) -> bincode::Result<Box<dyn Message>> {
        (self.decode)(engine, bytes)
    }

    pub fn zero_value(&self) -> Box<dyn Message> {
        (self.zero)()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("identity", &self.identity)
            .field("rust_name", &self.rust_name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Renders the schema in proto-like syntax, one field per line.
impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "message {} {{", self.identity)?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        write!(f, "}}")
    }
}
