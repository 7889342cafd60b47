//! Process-wide registry for code that cannot thread a [`Registry`] through.
//!
//! Registrations go into a pending builder behind a mutex. [`seal`] builds it
//! and publishes the result exactly once; readers only ever see the sealed,
//! fully populated registry.

use std::sync::{LazyLock, OnceLock};

use marshal_config::CodecConfig;
use parking_lot::Mutex;

use crate::{CodecError, Message, Registry, RegistryBuilder, RegistryError, Schema, TypeIdentity};

static PENDING: LazyLock<Mutex<Option<RegistryBuilder>>> =
    LazyLock::new(|| Mutex::new(Some(RegistryBuilder::new())));

static SEALED: OnceLock<Registry> = OnceLock::new();

pub fn configure(config: &CodecConfig) -> Result<(), RegistryError> {
    match PENDING.lock().as_mut() {
        Some(builder) => {
            builder.apply_config(config);
            Ok(())
        }
        None => Err(RegistryError::Sealed),
    }
}

pub fn register<T: Schema>() -> Result<(), RegistryError> {
    match PENDING.lock().as_mut() {
        Some(builder) => builder.register::<T>().map(|_| ()),
        None => Err(RegistryError::Sealed),
    }
}

/// Runs `f`, e.g. a generated `register_all`, against a fresh builder that
/// shares the pending configuration, then merges the result.
///
/// The lock is not held while `f` runs, so `f` may call back into this
/// module. What `f` registers on its builder lands all at once when it
/// returns `Ok` and is dropped when it fails or collides with a pending type.
/// Calls `f` makes to [`register`] directly are not rolled back.
pub fn register_with<F>(f: F) -> Result<(), RegistryError>
where
    F: FnOnce(&mut RegistryBuilder) -> Result<(), RegistryError>,
{
    let mut scratch = match PENDING.lock().as_ref() {
        Some(builder) => builder.fork(),
        None => return Err(RegistryError::Sealed),
    };
    f(&mut scratch)?;

    match PENDING.lock().as_mut() {
        Some(builder) => builder.merge(scratch).map(|_| ()),
        None => Err(RegistryError::Sealed),
    }
}

/// Freezes the pending registrations. Sealing twice returns the same
/// registry; a failed seal leaves the pending builder in place so the
/// missing types can still be registered.
pub fn seal() -> Result<&'static Registry, RegistryError> {
    let mut pending = PENDING.lock();
    if let Some(registry) = SEALED.get() {
        return Ok(registry);
    }

    let Some(builder) = pending.as_ref() else {
        return Err(RegistryError::Sealed);
    };
    builder.validate()?;

    let Some(builder) = pending.take() else {
        return Err(RegistryError::Sealed);
    };
    let registry = builder.build()?;
    Ok(SEALED.get_or_init(|| registry))
}

pub fn registry() -> Result<&'static Registry, CodecError> {
    SEALED.get().ok_or(CodecError::NotSealed)
}

pub fn is_sealed() -> bool {
    SEALED.get().is_some()
}

pub fn encode(message: &dyn Message) -> Result<Vec<u8>, CodecError> {
    registry()?.encode(message)
}

pub fn decode(bytes: &[u8], identity: TypeIdentity) -> Result<Box<dyn Message>, CodecError> {
    registry()?.decode(bytes, identity)
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.global.Path")]
    struct Path {
        path: String,
        port: u32,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.global.Expose")]
    struct Expose {
        paths: Vec<Path>,
    }

    // The global registry lives for the whole test binary, so its lifecycle
    // is exercised in one test.
    #[test]
    fn test_lifecycle() {
        let expose = Expose {
            paths: vec![Path {
                path: "/health".to_string(),
                port: 8080,
            }],
        };
        assert!(matches!(encode(&expose), Err(CodecError::NotSealed)));

        register::<Expose>().unwrap();
        assert!(matches!(
            seal(),
            Err(RegistryError::UnresolvedReference { .. })
        ));
        assert!(!is_sealed());

        // a closure that fails leaves nothing behind
        let err = register_with(|builder| {
            builder.register::<Path>()?;
            builder.register::<Expose>()?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration(id) if id == Expose::IDENTITY));
        assert!(matches!(
            seal(),
            Err(RegistryError::UnresolvedReference { .. })
        ));

        // the closure may call back into the global registry
        register_with(|_| register::<Path>()).unwrap();
        assert!(matches!(
            register_with(|builder| builder.register::<Path>().map(|_| ())),
            Err(RegistryError::DuplicateRegistration(_))
        ));

        let sealed = seal().unwrap();
        assert_eq!(sealed.len(), 2);
        assert!(std::ptr::eq(sealed, seal().unwrap()));
        assert!(matches!(register::<Path>(), Err(RegistryError::Sealed)));
        assert!(matches!(
            configure(&CodecConfig::default()),
            Err(RegistryError::Sealed)
        ));

        let bytes = encode(&expose).unwrap();
        let decoded = decode(&bytes, Expose::IDENTITY).unwrap();
        assert_eq!(decoded.downcast_ref::<Expose>(), Some(&expose));
    }
}
