#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use marshal::{CodecConfig, Registry};

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    marshal_pbservice::registry(&CodecConfig::default())
        .expect("pbservice descriptors are valid")
});

// Arbitrary input must decode or fail cleanly for every registered type, and
// anything that decodes must survive another round trip.
fuzz_target!(|data: &[u8]| {
    for identity in REGISTRY.identities() {
        if let Ok(message) = REGISTRY.decode(data, identity) {
            let bytes = REGISTRY
                .encode(message.as_ref())
                .expect("decoded message encodes");
            REGISTRY
                .decode(&bytes, identity)
                .expect("re-encoded message decodes");
        }
    }
});
