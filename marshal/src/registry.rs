use std::{collections::HashMap, sync::Arc};

use log::{debug, info, trace};
use marshal_config::CodecConfig;

use crate::{
    descriptor::Descriptor, engine::Engine, CodecError, Message, RegistryError, Schema,
    TypeIdentity,
};

/// Collects descriptors during startup.
///
/// Registration takes `&mut self`, so it cannot overlap with codec traffic;
/// [`RegistryBuilder::build`] freezes the result into a [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    engine: Engine,
    strict_references: bool,
    descriptors: HashMap<TypeIdentity, Descriptor>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        let mut builder = Self {
            engine: Engine::default(),
            strict_references: true,
            descriptors: HashMap::new(),
        };
        builder.apply_config(config);
        builder
    }

    pub fn apply_config(&mut self, config: &CodecConfig) {
        self.engine = Engine::new(&config.engine);
        self.strict_references = config.registry.strict_references;
    }

    pub fn register<T: Schema>(&mut self) -> Result<&mut Self, RegistryError> {
        self.register_descriptor(Descriptor::of::<T>())
    }

    /// Adds `descriptor` under its identity. On error the builder is left
    /// exactly as it was.
    pub fn register_descriptor(
        &mut self,
        descriptor: Descriptor,
    ) -> Result<&mut Self, RegistryError> {
        let identity = descriptor.identity();
        if self.descriptors.contains_key(&identity) {
            return Err(RegistryError::DuplicateRegistration(identity));
        }
        descriptor
            .validate()
            .map_err(|source| RegistryError::InvalidDescriptor { identity, source })?;

        debug!(
            "registered message type {} ({})",
            identity,
            descriptor.rust_name()
        );
        self.descriptors.insert(identity, descriptor);
        Ok(self)
    }

    /// Moves every descriptor of `other` into this builder. Either all of
    /// them are added or, when one is already registered here, none are.
    pub fn merge(&mut self, other: RegistryBuilder) -> Result<&mut Self, RegistryError> {
        let mut identities: Vec<_> = other.descriptors.keys().collect();
        identities.sort();
        if let Some(identity) = identities
            .into_iter()
            .find(|identity| self.descriptors.contains_key(*identity))
        {
            return Err(RegistryError::DuplicateRegistration(*identity));
        }

        self.descriptors.extend(other.descriptors);
        Ok(self)
    }

    /// An empty builder with the same engine and reference policy.
    pub(crate) fn fork(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            strict_references: self.strict_references,
            descriptors: HashMap::new(),
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.descriptors.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Checks that every message field points at a registered type. A no-op
    /// when strict references are turned off.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !self.strict_references {
            return Ok(());
        }

        let mut identities: Vec<_> = self.descriptors.keys().collect();
        identities.sort();
        for identity in identities {
            let descriptor = &self.descriptors[identity];
            for (field, target) in descriptor.references() {
                if !self.descriptors.contains_key(&target) {
                    return Err(RegistryError::UnresolvedReference {
                        identity: *identity,
                        field,
                        target,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        self.validate()?;

        info!(
            "codec registry built with {} message types",
            self.descriptors.len()
        );
        Ok(Registry {
            engine: self.engine,
            descriptors: self
                .descriptors
                .into_iter()
                .map(|(identity, descriptor)| (identity, Arc::new(descriptor)))
                .collect(),
        })
    }
}

/// Frozen mapping from type identity to descriptor.
///
/// Nothing in here changes after construction, so any number of threads can
/// encode and decode through a shared reference without locking.
#[derive(Debug)]
pub struct Registry {
    engine: Engine,
    descriptors: HashMap<TypeIdentity, Arc<Descriptor>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn get(&self, identity: &str) -> Option<&Arc<Descriptor>> {
        self.descriptors.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.descriptors.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All registered identities, sorted by name.
    pub fn identities(&self) -> Vec<TypeIdentity> {
        let mut identities: Vec<_> = self.descriptors.keys().copied().collect();
        identities.sort();
        identities
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<Descriptor>> {
        self.descriptors.values()
    }

    fn lookup(&self, identity: &str) -> Result<&Descriptor, CodecError> {
        self.descriptors
            .get(identity)
            .map(Arc::as_ref)
            .ok_or_else(|| CodecError::UnknownType(identity.to_string()))
    }

    fn lookup_typed<T: Schema>(&self) -> Result<&Descriptor, CodecError> {
        let descriptor = self.lookup(T::IDENTITY.name())?;
        if !descriptor.is_type::<T>() {
            return Err(CodecError::TypeMismatch {
                identity: T::IDENTITY,
                expected: descriptor.rust_name(),
                found: std::any::type_name::<T>(),
            });
        }
        Ok(descriptor)
    }

    /// Encodes a message known only through its handle.
    pub fn encode(&self, message: &dyn Message) -> Result<Vec<u8>, CodecError> {
        let identity = message.type_identity();
        let descriptor = self.lookup(identity.name())?;

        let bytes = descriptor
            .encode_erased(&self.engine, message.as_any())
            .ok_or_else(|| CodecError::TypeMismatch {
                identity,
                expected: descriptor.rust_name(),
                found: message.type_name(),
            })?
            .map_err(|source| CodecError::Encoding { identity, source })?;

        trace!("encoded {} into {} bytes", identity, bytes.len());
        Ok(bytes)
    }

    pub fn encode_as<T: Schema>(&self, message: &T) -> Result<Vec<u8>, CodecError> {
        self.lookup_typed::<T>()?;

        let bytes = self
            .engine
            .encode(message)
            .map_err(|source| CodecError::Encoding {
                identity: T::IDENTITY,
                source,
            })?;

        trace!("encoded {} into {} bytes", T::IDENTITY, bytes.len());
        Ok(bytes)
    }

    pub fn decode(
        &self,
        bytes: &[u8],
        identity: TypeIdentity,
    ) -> Result<Box<dyn Message>, CodecError> {
        self.decode_named(bytes, identity.name())
    }

    /// Like [`Registry::decode`] for names that arrive at runtime, e.g. next
    /// to the payload in a storage record.
    pub fn decode_named(&self, bytes: &[u8], name: &str) -> Result<Box<dyn Message>, CodecError> {
        let descriptor = self.lookup(name)?;
        let identity = descriptor.identity();

        descriptor
            .decode_erased(&self.engine, bytes)
            .map_err(|source| decoding_failed(identity, bytes, source))
    }

    pub fn decode_as<T: Schema>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.lookup_typed::<T>()?;

        self.engine
            .decode(bytes)
            .map_err(|source| decoding_failed(T::IDENTITY, bytes, source))
    }

    /// Replaces `target` with the message decoded from `bytes`. On error
    /// `target` is untouched.
    pub fn decode_into<T: Schema>(&self, bytes: &[u8], target: &mut T) -> Result<(), CodecError> {
        *target = self.decode_as(bytes)?;
        Ok(())
    }

    /// A zero valued instance of a registered type.
    pub fn new_message(&self, name: &str) -> Result<Box<dyn Message>, CodecError> {
        Ok(self.lookup(name)?.zero_value())
    }
}

fn decoding_failed(identity: TypeIdentity, bytes: &[u8], source: bincode::Error) -> CodecError {
    debug!(
        "rejected {} bytes as {}: {}",
        bytes.len(),
        identity,
        source
    );
    CodecError::Decoding { identity, source }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use marshal_config::{EngineConfig, RegistryConfig};
    use rayon::prelude::*;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.Weights")]
    struct Weights {
        passing: i32,
        warning: i32,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.Service")]
    struct Service {
        name: String,
        port: i32,
        tags: Vec<String>,
        meta: HashMap<String, String>,
        weights: Option<Weights>,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.Empty")]
    struct Empty {}

    // Claims the identity of `Weights` without being it.
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.Weights")]
    struct Impostor {
        passing: i64,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, marshal::Message)]
    #[message(name = "test.Chain")]
    struct Chain {
        next: Option<Box<Chain>>,
    }

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder
            .register::<Weights>()
            .unwrap()
            .register::<Service>()
            .unwrap()
            .register::<Empty>()
            .unwrap();
        builder.build().unwrap()
    }

    fn service(index: usize) -> Service {
        Service {
            name: format!("web-{index}"),
            port: 8000 + index as i32,
            tags: vec!["primary".to_string(), format!("shard-{}", index % 4)],
            meta: HashMap::from([
                ("version".to_string(), "2".to_string()),
                ("index".to_string(), index.to_string()),
            ]),
            weights: Some(Weights {
                passing: index as i32,
                warning: 1,
            }),
        }
    }

    #[test]
    fn test_round_trip() {
        let registry = registry();
        let original = service(7);

        let bytes = registry.encode(&original).unwrap();
        let decoded = registry.decode(&bytes, Service::IDENTITY).unwrap();
        assert_eq!(decoded.type_identity(), Service::IDENTITY);
        assert_eq!(decoded.downcast_ref::<Service>(), Some(&original));

        let typed: Service = registry.decode_as(&bytes).unwrap();
        assert_eq!(typed, original);
        assert_eq!(registry.encode_as(&original).unwrap(), bytes);
    }

    #[test]
    fn test_round_trip_defaults() {
        let registry = registry();
        let bytes = registry.encode(&Service::default()).unwrap();
        let decoded: Service = registry.decode_as(&bytes).unwrap();
        assert_eq!(decoded, Service::default());
    }

    #[test]
    fn test_zero_field_type() {
        let registry = registry();

        let bytes = registry.encode(&Empty {}).unwrap();
        assert!(bytes.is_empty());

        let decoded = registry.decode(&[], Empty::IDENTITY).unwrap();
        assert_eq!(decoded.downcast_ref::<Empty>(), Some(&Empty {}));
    }

    #[test]
    fn test_unknown_type() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Weights>().unwrap();
        let registry = builder.build().unwrap();

        let err = registry.encode(&Empty {}).unwrap_err();
        assert!(err.is_unknown_type());
        assert_eq!(err.identity(), Some("test.Empty"));

        let err = registry.decode(&[], Empty::IDENTITY).unwrap_err();
        assert!(err.is_unknown_type());

        let err = registry.decode_named(&[0, 0], "test.Nope").unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(name) if name == "test.Nope"));

        assert!(registry.decode_as::<Empty>(&[]).unwrap_err().is_unknown_type());
        assert!(registry.new_message("test.Nope").unwrap_err().is_unknown_type());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Weights>().unwrap();

        let err = builder.register::<Weights>().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration(id) if id == Weights::IDENTITY));

        let err = builder.register::<Impostor>().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration(_)));

        // the first mapping survives both attempts
        let registry = builder.build().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("test.Weights").unwrap().is_type::<Weights>());
        let bytes = registry
            .encode(&Weights {
                passing: 3,
                warning: 1,
            })
            .unwrap();
        assert_eq!(
            registry.decode_as::<Weights>(&bytes).unwrap(),
            Weights {
                passing: 3,
                warning: 1
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let registry = registry();

        let err = registry.encode(&Impostor { passing: 1 }).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));

        let err = registry.decode_as::<Impostor>(&[2, 2]).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_truncation() {
        let registry = registry();
        let bytes = registry.encode(&service(3)).unwrap();

        for end in 0..bytes.len() {
            let err = registry
                .decode(&bytes[..end], Service::IDENTITY)
                .unwrap_err();
            assert!(err.is_data_error(), "prefix of {end} bytes: {err}");
        }
    }

    #[test]
    fn test_malformed() {
        let registry = registry();

        // option tag outside 0/1
        let mut bytes = registry
            .encode(&Service {
                weights: None,
                ..service(1)
            })
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 7;
        assert!(registry
            .decode(&bytes, Service::IDENTITY)
            .unwrap_err()
            .is_data_error());

        // a name that is not utf-8
        let bytes = [4, 0xff, 0xfe, 0xfd, 0xfc, 0, 0, 0, 0];
        let err = registry.decode(&bytes, Service::IDENTITY).unwrap_err();
        assert!(matches!(err, CodecError::Decoding { identity, .. } if identity == Service::IDENTITY));
    }

    #[test]
    fn test_oversize_message() {
        let mut builder = RegistryBuilder::with_config(&CodecConfig {
            engine: EngineConfig {
                max_message_size: 32,
                ..Default::default()
            },
            ..Default::default()
        });
        builder.register::<Weights>().unwrap();
        builder.register::<Service>().unwrap();
        let registry = builder.build().unwrap();

        let err = registry.encode(&service(1)).unwrap_err();
        assert!(matches!(err, CodecError::Encoding { .. }));

        let bytes = self::registry().encode(&service(1)).unwrap();
        let err = registry.decode(&bytes, Service::IDENTITY).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_unresolved_reference() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Service>().unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnresolvedReference { field: "Weights", target, .. } if target == Weights::IDENTITY
        ));

        let mut lenient = RegistryBuilder::with_config(&CodecConfig {
            registry: RegistryConfig {
                strict_references: false,
            },
            ..Default::default()
        });
        lenient.register::<Service>().unwrap();
        let registry = lenient.build().unwrap();
        let bytes = registry.encode(&service(2)).unwrap();
        assert_eq!(registry.decode_as::<Service>(&bytes).unwrap(), service(2));
    }

    #[test]
    fn test_introspection() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.identities(),
            [Empty::IDENTITY, Service::IDENTITY, Weights::IDENTITY]
        );
        assert!(registry.contains("test.Service"));
        assert!(!registry.contains("test.Upstream"));

        let zero = registry.new_message("test.Weights").unwrap();
        assert_eq!(zero.downcast_ref::<Weights>(), Some(&Weights::default()));
    }

    #[test]
    fn test_decode_into() {
        let registry = registry();
        let bytes = registry.encode(&service(5)).unwrap();

        let mut target = Service::default();
        registry.decode_into(&bytes, &mut target).unwrap();
        assert_eq!(target, service(5));

        assert!(registry.decode_into(&bytes[..3], &mut target).is_err());
        assert_eq!(target, service(5));
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = registry();

        let results: Vec<(usize, Service)> = (0..256)
            .into_par_iter()
            .map(|index| {
                let bytes = registry.encode(&service(index)).unwrap();
                let decoded = registry.decode(&bytes, Service::IDENTITY).unwrap();
                (index, *decoded.downcast::<Service>().unwrap())
            })
            .collect();

        assert_eq!(results.len(), 256);
        for (index, decoded) in results {
            assert_eq!(decoded, service(index));
        }
    }

    #[test]
    fn test_merge() {
        let mut first = RegistryBuilder::new();
        first.register::<Weights>().unwrap();

        let mut second = first.fork();
        second.register::<Service>().unwrap().register::<Weights>().unwrap();
        let err = first.merge(second).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration(id) if id == Weights::IDENTITY));
        assert_eq!(first.len(), 1);

        let mut third = first.fork();
        third.register::<Service>().unwrap();
        first.merge(third).unwrap();
        assert_eq!(first.build().unwrap().len(), 2);
    }

    #[test]
    fn test_nesting_limit() {
        let mut builder = RegistryBuilder::with_config(&CodecConfig {
            engine: EngineConfig {
                max_depth: 16,
                ..Default::default()
            },
            ..Default::default()
        });
        builder.register::<Chain>().unwrap();
        let registry = builder.build().unwrap();

        // seven links nest 15 deep, eight nest 17
        let link = |next| Chain {
            next: Some(Box::new(next)),
        };
        let shallow = (0..7).fold(Chain::default(), |next, _| link(next));
        let bytes = registry.encode(&shallow).unwrap();
        assert_eq!(registry.decode_as::<Chain>(&bytes).unwrap(), shallow);

        let deep = (0..8).fold(Chain::default(), |next, _| link(next));
        let err = registry.encode(&deep).unwrap_err();
        assert!(matches!(err, CodecError::Encoding { identity, .. } if identity == Chain::IDENTITY));

        let mut bytes = vec![1u8; 100_000];
        bytes.push(0);
        let err = registry.decode(&bytes, Chain::IDENTITY).unwrap_err();
        assert!(matches!(err, CodecError::Decoding { identity, .. } if identity == Chain::IDENTITY));
    }
}
