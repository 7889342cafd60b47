use std::{any::Any, fmt::Debug};

use serde::{de::DeserializeOwned, Serialize};

use crate::{descriptor::Descriptor, FieldDescriptor, TypeIdentity};

/// Object safe handle to any message instance.
///
/// This is what callers that only hold an opaque message work with; the
/// registry resolves the concrete codec from [`Message::type_identity`].
/// Implemented by `#[derive(Message)]`.
pub trait Message: Any + Send + Sync + Debug {
    fn type_identity(&self) -> TypeIdentity;

    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl dyn Message {
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

/// Static side of a message type: its identity and field layout.
///
/// `Default` provides the zero value a decode starts from.
pub trait Schema: Message + Serialize + DeserializeOwned + Default + Sized {
    const IDENTITY: TypeIdentity;

    fn fields() -> Vec<FieldDescriptor>;

    fn descriptor() -> Descriptor {
        Descriptor::of::<Self>()
    }
}
