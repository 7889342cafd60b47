use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, marshal::Enumeration)]
#[enumeration(name = "consul.pbservice.ProxyMode")]
pub enum ProxyMode {
    #[default]
    Default,
    Transparent,
    Direct,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, marshal::Enumeration)]
#[enumeration(name = "consul.pbservice.MeshGatewayMode")]
pub enum MeshGatewayMode {
    #[default]
    Default,
    None,
    Local,
    Remote,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, marshal::Enumeration)]
#[enumeration(name = "consul.pbservice.LogSinkType")]
pub enum LogSinkType {
    #[default]
    Default,
    File,
    StdErr,
    StdOut,
}

/// Proxy settings of a connect sidecar or gateway.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ConnectProxyConfig")]
pub struct ConnectProxyConfig {
    pub destination_service_name: String,
    #[field(name = "DestinationServiceID")]
    pub destination_service_id: String,
    pub local_service_address: String,
    pub local_service_port: i32,
    /// Opaque proxy configuration, passed through to the proxy as is.
    pub config: HashMap<String, String>,
    pub upstreams: Vec<Upstream>,
    pub mesh_gateway: MeshGatewayConfig,
    pub expose: ExposeConfig,
    pub mode: ProxyMode,
    pub transparent_proxy: TransparentProxyConfig,
    pub local_service_socket_path: String,
    pub access_logs: AccessLogsConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.Upstream")]
pub struct Upstream {
    pub destination_type: String,
    pub destination_namespace: String,
    pub destination_name: String,
    pub datacenter: String,
    pub local_bind_address: String,
    pub local_bind_port: i32,
    pub config: HashMap<String, String>,
    pub mesh_gateway: MeshGatewayConfig,
    pub centrally_configured: bool,
    pub local_bind_socket_path: String,
    pub local_bind_socket_mode: String,
    pub destination_partition: String,
    pub destination_peer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.MeshGatewayConfig")]
pub struct MeshGatewayConfig {
    pub mode: MeshGatewayMode,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.TransparentProxyConfig")]
pub struct TransparentProxyConfig {
    pub outbound_listener_port: i32,
    pub dialed_directly: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.AccessLogsConfig")]
pub struct AccessLogsConfig {
    pub enabled: bool,
    pub disable_listener_logs: bool,
    pub r#type: LogSinkType,
    pub path: String,
    #[field(name = "JSONFormat")]
    pub json_format: String,
    pub text_format: String,
}

/// Paths exposed through the proxy without mTLS, typically health checks.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ExposeConfig")]
pub struct ExposeConfig {
    pub checks: bool,
    pub paths: Vec<ExposePath>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, marshal::Message)]
#[message(name = "consul.pbservice.ExposePath")]
pub struct ExposePath {
    pub listener_port: i32,
    pub path: String,
    pub local_path_port: i32,
    pub protocol: String,
    pub parsed_from_check: bool,
}
