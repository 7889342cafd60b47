use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::{Cardinality, FieldKind, TypeIdentity};

/// Maps a Rust field type onto the schema vocabulary.
///
/// Containers report the kind of their element and set the cardinality, so
/// `Vec<Upstream>` is a repeated `Upstream` and `HashMap<String, u32>` is a
/// map from string to uint32.
pub trait FieldValue {
    fn kind() -> FieldKind;

    fn cardinality() -> Cardinality {
        Cardinality::Singular
    }
}

/// A closed set of named values, implemented by `#[derive(Enumeration)]`.
pub trait Enumeration: FieldValue {
    const IDENTITY: TypeIdentity;
    const VARIANTS: &'static [&'static str];
}

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn kind() -> FieldKind {
                    FieldKind::$kind
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float,
    f64 => Double,
    String => String,
    Bytes => Bytes,
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn cardinality() -> Cardinality {
        match T::cardinality() {
            Cardinality::Singular => Cardinality::Optional,
            other => other,
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn cardinality() -> Cardinality {
        T::cardinality()
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn cardinality() -> Cardinality {
        Cardinality::Repeated
    }
}

impl<K: FieldValue, V: FieldValue, S> FieldValue for HashMap<K, V, S> {
    fn kind() -> FieldKind {
        V::kind()
    }

    fn cardinality() -> Cardinality {
        Cardinality::Map { key: K::kind() }
    }
}

impl<K: FieldValue, V: FieldValue> FieldValue for BTreeMap<K, V> {
    fn kind() -> FieldKind {
        V::kind()
    }

    fn cardinality() -> Cardinality {
        Cardinality::Map { key: K::kind() }
    }
}
