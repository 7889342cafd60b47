use std::marker::PhantomData;

use bincode::{ErrorKind, Options};
use marshal_config::EngineConfig;
use serde::{de::DeserializeOwned, Serialize};

use crate::depth;

/// Thin adapter over the structured-encoding engine (`bincode` with varint
/// integers, little endian).
///
/// Size and nesting limits are applied on both sides: encoding a message
/// over either limit fails instead of producing bytes no peer would accept,
/// and decoding rejects input before it can exhaust memory or the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    max_message_size: u64,
    max_depth: usize,
    allow_trailing_bytes: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_message_size: config.max_message_size,
            max_depth: config.max_depth,
            allow_trailing_bytes: config.allow_trailing_bytes,
        }
    }

    pub fn max_message_size(&self) -> u64 {
        self.max_message_size
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new().with_limit(self.max_message_size)
    }

    pub fn encode<T>(&self, value: &T) -> bincode::Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        depth::check(value, self.max_depth)?;
        self.options().serialize(value)
    }

    /// Reads exactly one value from `bytes`. Running out of input is an
    /// error, never a read past the slice.
    pub fn decode<T>(&self, bytes: &[u8]) -> bincode::Result<T>
    where
        T: DeserializeOwned,
    {
        // bincode drops its limit when reading from a slice
        if bytes.len() as u64 > self.max_message_size {
            return Err(Box::new(ErrorKind::SizeLimit));
        }

        let seed = depth::Seed::new(PhantomData::<T>, self.max_depth);
        if self.allow_trailing_bytes {
            self.options()
                .allow_trailing_bytes()
                .deserialize_seed(seed, bytes)
        } else {
            self.options().deserialize_seed(seed, bytes)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Path {
        listener_port: i32,
        path: String,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Empty {}

    #[derive(Serialize, Deserialize, PartialEq, Debug, Default)]
    struct Node {
        child: Option<Box<Node>>,
    }

    // `levels` links below the root, nesting 2 * levels + 1 deep
    fn chain(levels: usize) -> Node {
        (0..levels).fold(Node::default(), |node, _| Node {
            child: Some(Box::new(node)),
        })
    }

    #[test]
    fn test_empty_struct_is_empty() {
        let engine = Engine::default();
        let bytes = engine.encode(&Empty {}).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(engine.decode::<Empty>(&[]).unwrap(), Empty {});
    }

    #[test]
    fn test_trailing_bytes() {
        let strict = Engine::default();
        let mut bytes = strict
            .encode(&Path {
                listener_port: 21500,
                path: "/metrics".to_string(),
            })
            .unwrap();
        bytes.push(0);

        assert!(strict.decode::<Path>(&bytes).is_err());

        let lenient = Engine::new(&EngineConfig {
            allow_trailing_bytes: true,
            ..Default::default()
        });
        assert_eq!(lenient.decode::<Path>(&bytes).unwrap().path, "/metrics");
    }

    #[test]
    fn test_size_limit() {
        let engine = Engine::new(&EngineConfig {
            max_message_size: 16,
            ..Default::default()
        });
        let path = Path {
            listener_port: 1,
            path: "x".repeat(64),
        };

        let err = engine.encode(&path).unwrap_err();
        assert!(matches!(*err, ErrorKind::SizeLimit));

        let bytes = Engine::default().encode(&path).unwrap();
        let err = engine.decode::<Path>(&bytes).unwrap_err();
        assert!(matches!(*err, ErrorKind::SizeLimit));
    }

    #[test]
    fn test_hostile_length_prefix() {
        // listener_port = 0, then a string claiming u64::MAX bytes
        let mut bytes = vec![0, 253];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(Engine::default().decode::<Path>(&bytes).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let engine = Engine::new(&EngineConfig {
            max_depth: 9,
            ..Default::default()
        });

        let bytes = engine.encode(&chain(4)).unwrap();
        assert_eq!(engine.decode::<Node>(&bytes).unwrap(), chain(4));

        let err = engine.encode(&chain(5)).unwrap_err();
        assert!(matches!(*err, ErrorKind::Custom(ref msg) if msg.contains("depth")));

        let bytes = Engine::default().encode(&chain(5)).unwrap();
        let err = engine.decode::<Node>(&bytes).unwrap_err();
        assert!(matches!(*err, ErrorKind::Custom(ref msg) if msg.contains("depth")));
    }

    #[test]
    fn test_hostile_nesting() {
        // a million `Some` tags in a row
        let mut bytes = vec![1u8; 1_000_000];
        bytes.push(0);
        assert!(Engine::default().decode::<Node>(&bytes).is_err());
    }
}
