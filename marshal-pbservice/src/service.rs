use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ConnectProxyConfig;

/// A service as registered with an agent.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ServiceDefinition")]
pub struct ServiceDefinition {
    pub kind: String,
    #[field(name = "ID")]
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub address: String,
    #[field(number = 16)]
    pub tagged_addresses: HashMap<String, ServiceAddress>,
    #[field(number = 6)]
    pub meta: HashMap<String, String>,
    #[field(number = 7)]
    pub port: i32,
    #[field(number = 18)]
    pub socket_path: String,
    #[field(number = 13)]
    pub weights: Option<Weights>,
    #[field(number = 14)]
    pub token: String,
    #[field(number = 15)]
    pub enable_tag_override: bool,
    #[field(number = 9)]
    pub proxy: Option<ConnectProxyConfig>,
    #[field(number = 10)]
    pub connect: Option<ServiceConnect>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ServiceAddress")]
pub struct ServiceAddress {
    pub address: String,
    pub port: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, marshal::Message)]
#[message(name = "consul.pbservice.Weights")]
pub struct Weights {
    pub passing: i32,
    pub warning: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ServiceConnect")]
pub struct ServiceConnect {
    pub native: bool,
    #[field(number = 3)]
    pub sidecar_service: Option<Box<ServiceDefinition>>,
    pub peer_meta: Option<PeeringServiceMeta>,
}

/// Metadata about a service imported from a cluster peer.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.PeeringServiceMeta")]
pub struct PeeringServiceMeta {
    #[field(name = "SNI")]
    pub sni: Vec<String>,
    #[field(name = "SpiffeID")]
    pub spiffe_id: Vec<String>,
    pub protocol: String,
}
