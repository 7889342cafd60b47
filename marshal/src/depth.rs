//! Nesting limits around the engine.
//!
//! bincode recurses once per nested struct, option, sequence, map or enum and
//! puts no bound on it, so input that nests deeply enough exhausts the stack.
//! Decoding runs through [`Seed`], which counts those levels and fails once
//! the limit is reached. [`check`] walks a value before encoding with the same
//! counting rules, so everything that encodes also decodes.

use std::fmt;

use serde::{de, ser, Serialize};

const EXCEEDED: &str = "nesting depth limit exceeded";

/// Deserializes `S` with at most `remaining` nested levels.
pub(crate) struct Seed<S> {
    inner: S,
    remaining: usize,
}

impl<S> Seed<S> {
    pub(crate) fn new(inner: S, remaining: usize) -> Self {
        Self { inner, remaining }
    }
}

impl<'de, S: de::DeserializeSeed<'de>> de::DeserializeSeed<'de> for Seed<S> {
    type Value = S::Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        self.inner.deserialize(Depth {
            inner: deserializer,
            remaining: self.remaining,
        })
    }
}

struct Depth<D> {
    inner: D,
    remaining: usize,
}

macro_rules! forward_deserialize {
    ($($method:ident),* $(,)?) => {
        $(
            fn $method<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                self.inner.$method(Visit {
                    inner: visitor,
                    remaining: self.remaining,
                })
            }
        )*
    };
}

impl<'de, D: de::Deserializer<'de>> de::Deserializer<'de> for Depth<D> {
    type Error = D::Error;

    forward_deserialize! {
        deserialize_any,
        deserialize_bool,
        deserialize_i8,
        deserialize_i16,
        deserialize_i32,
        deserialize_i64,
        deserialize_i128,
        deserialize_u8,
        deserialize_u16,
        deserialize_u32,
        deserialize_u64,
        deserialize_u128,
        deserialize_f32,
        deserialize_f64,
        deserialize_char,
        deserialize_str,
        deserialize_string,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_option,
        deserialize_unit,
        deserialize_seq,
        deserialize_map,
        deserialize_identifier,
        deserialize_ignored_any,
    }

    fn deserialize_unit_struct<V>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_unit_struct(name, visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_newtype_struct(name, visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_tuple(len, visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_tuple_struct(name, len, visitor)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.deserialize_enum(name, variants, visitor)
    }

    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

struct Visit<V> {
    inner: V,
    remaining: usize,
}

impl<V> Visit<V> {
    /// Levels left below the compound value being entered.
    fn descend<E: de::Error>(&self) -> Result<usize, E> {
        self.remaining
            .checked_sub(1)
            .ok_or_else(|| E::custom(EXCEEDED))
    }
}

macro_rules! forward_visit {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<E: de::Error>(self, value: $ty) -> Result<Self::Value, E> {
                self.inner.$method(value)
            }
        )*
    };
}

impl<'de, V: de::Visitor<'de>> de::Visitor<'de> for Visit<V> {
    type Value = V::Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.inner.expecting(formatter)
    }

    forward_visit! {
        visit_bool(bool),
        visit_i8(i8),
        visit_i16(i16),
        visit_i32(i32),
        visit_i64(i64),
        visit_i128(i128),
        visit_u8(u8),
        visit_u16(u16),
        visit_u32(u32),
        visit_u64(u64),
        visit_u128(u128),
        visit_f32(f32),
        visit_f64(f64),
        visit_char(char),
        visit_str(&str),
        visit_borrowed_str(&'de str),
        visit_string(String),
        visit_bytes(&[u8]),
        visit_borrowed_bytes(&'de [u8]),
        visit_byte_buf(Vec<u8>),
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        self.inner.visit_none()
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        self.inner.visit_unit()
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let remaining = self.descend::<D::Error>()?;
        self.inner.visit_some(Depth {
            inner: deserializer,
            remaining,
        })
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let remaining = self.descend::<D::Error>()?;
        self.inner.visit_newtype_struct(Depth {
            inner: deserializer,
            remaining,
        })
    }

    fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let remaining = self.descend::<A::Error>()?;
        self.inner.visit_seq(Access {
            inner: seq,
            remaining,
        })
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let remaining = self.descend::<A::Error>()?;
        self.inner.visit_map(Access {
            inner: map,
            remaining,
        })
    }

    fn visit_enum<A>(self, data: A) -> Result<Self::Value, A::Error>
    where
        A: de::EnumAccess<'de>,
    {
        let remaining = self.descend::<A::Error>()?;
        self.inner.visit_enum(Enum {
            inner: data,
            remaining,
        })
    }
}

struct Access<A> {
    inner: A,
    remaining: usize,
}

impl<'de, A: de::SeqAccess<'de>> de::SeqAccess<'de> for Access<A> {
    type Error = A::Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        self.inner
            .next_element_seed(Seed::new(seed, self.remaining))
    }

    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

impl<'de, A: de::MapAccess<'de>> de::MapAccess<'de> for Access<A> {
    type Error = A::Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        self.inner.next_key_seed(Seed::new(seed, self.remaining))
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        self.inner.next_value_seed(Seed::new(seed, self.remaining))
    }

    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

struct Enum<A> {
    inner: A,
    remaining: usize,
}

impl<'de, A: de::EnumAccess<'de>> de::EnumAccess<'de> for Enum<A> {
    type Error = A::Error;
    type Variant = Enum<A::Variant>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let remaining = self.remaining;
        let (value, variant) = self.inner.variant_seed(Seed::new(seed, remaining))?;
        Ok((
            value,
            Enum {
                inner: variant,
                remaining,
            },
        ))
    }
}

impl<'de, A: de::VariantAccess<'de>> de::VariantAccess<'de> for Enum<A> {
    type Error = A::Error;

    fn unit_variant(self) -> Result<(), Self::Error> {
        self.inner.unit_variant()
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        self.inner
            .newtype_variant_seed(Seed::new(seed, self.remaining))
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.tuple_variant(len, visitor)
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        let visitor = Visit {
            inner: visitor,
            remaining: self.remaining,
        };
        self.inner.struct_variant(fields, visitor)
    }
}

/// Fails when `value` nests deeper than `max_depth` levels.
pub(crate) fn check<T: Serialize + ?Sized>(value: &T, max_depth: usize) -> bincode::Result<()> {
    value.serialize(Check {
        remaining: max_depth,
    })
}

#[derive(Clone, Copy)]
struct Check {
    remaining: usize,
}

impl Check {
    fn descend(self) -> bincode::Result<Check> {
        match self.remaining.checked_sub(1) {
            Some(remaining) => Ok(Check { remaining }),
            None => Err(<bincode::Error as ser::Error>::custom(EXCEEDED)),
        }
    }
}

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _: $ty) -> bincode::Result<()> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for Check {
    type Ok = ();
    type Error = bincode::Error;
    type SerializeSeq = Check;
    type SerializeTuple = Check;
    type SerializeTupleStruct = Check;
    type SerializeTupleVariant = Check;
    type SerializeMap = Check;
    type SerializeStruct = Check;
    type SerializeStructVariant = Check;

    accept! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    }

    fn serialize_none(self) -> bincode::Result<()> {
        Ok(())
    }

    fn serialize_unit(self) -> bincode::Result<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> bincode::Result<()> {
        value.serialize(self.descend()?)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> bincode::Result<()> {
        self.descend().map(|_| ())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> bincode::Result<()> {
        value.serialize(self.descend()?)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> bincode::Result<()> {
        value.serialize(self.descend()?)
    }

    fn serialize_seq(self, _: Option<usize>) -> bincode::Result<Check> {
        self.descend()
    }

    fn serialize_tuple(self, _: usize) -> bincode::Result<Check> {
        self.descend()
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> bincode::Result<Check> {
        self.descend()
    }

    // the enum and its payload each count, as on the decoding side
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> bincode::Result<Check> {
        self.descend()?.descend()
    }

    fn serialize_map(self, _: Option<usize>) -> bincode::Result<Check> {
        self.descend()
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> bincode::Result<Check> {
        self.descend()
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> bincode::Result<Check> {
        self.descend()?.descend()
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

impl ser::SerializeSeq for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeMap for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> bincode::Result<()> {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Check {
    type Ok = ();
    type Error = bincode::Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> bincode::Result<()> {
        value.serialize(*self)
    }

    fn end(self) -> bincode::Result<()> {
        Ok(())
    }
}
