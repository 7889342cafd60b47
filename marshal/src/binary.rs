use crate::{global, CodecError, Schema};

/// Per-type `marshal_binary`/`unmarshal_binary` methods, backed by the
/// process-wide registry. Every [`Schema`] type gets them for free.
pub trait BinaryCodec {
    fn marshal_binary(&self) -> Result<Vec<u8>, CodecError>;

    fn unmarshal_binary(&mut self, bytes: &[u8]) -> Result<(), CodecError>;
}

impl<T: Schema> BinaryCodec for T {
    fn marshal_binary(&self) -> Result<Vec<u8>, CodecError> {
        global::registry()?.encode_as(self)
    }

    fn unmarshal_binary(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        global::registry()?.decode_into(bytes, self)
    }
}
