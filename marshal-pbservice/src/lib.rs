//! Service catalog messages of the `consul.pbservice` package.
//!
//! Types only describe themselves; encoding goes through a
//! [`marshal::Registry`] populated by [`register_all`].

use log::debug;
use marshal::{CodecConfig, Descriptor, Registry, RegistryBuilder, RegistryError, Schema};

mod proxy;
mod service;

pub use proxy::{
    AccessLogsConfig, ConnectProxyConfig, ExposeConfig, ExposePath, LogSinkType,
    MeshGatewayConfig, MeshGatewayMode, ProxyMode, TransparentProxyConfig, Upstream,
};
pub use service::{
    PeeringServiceMeta, ServiceAddress, ServiceConnect, ServiceDefinition, Weights,
};

pub const PACKAGE: &str = "consul.pbservice";

/// Every message of the package. Keep in the order of the schema file.
pub static DESCRIPTORS: &[fn() -> Descriptor] = &[
    ConnectProxyConfig::descriptor,
    Upstream::descriptor,
    ServiceConnect::descriptor,
    PeeringServiceMeta::descriptor,
    ExposeConfig::descriptor,
    ExposePath::descriptor,
    MeshGatewayConfig::descriptor,
    TransparentProxyConfig::descriptor,
    AccessLogsConfig::descriptor,
    ServiceDefinition::descriptor,
    ServiceAddress::descriptor,
    Weights::descriptor,
];

pub fn register_all(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    for descriptor in DESCRIPTORS {
        builder.register_descriptor(descriptor())?;
    }
    debug!("registered {} {} messages", DESCRIPTORS.len(), PACKAGE);
    Ok(())
}

/// A registry holding exactly this package.
pub fn registry(config: &CodecConfig) -> Result<Registry, RegistryError> {
    let mut builder = RegistryBuilder::with_config(config);
    register_all(&mut builder)?;
    builder.build()
}
