//! Bundles the gateway's long-lived, shared dependencies behind a
//! single `Arc`, constructed once at startup and cloned into every
//! connection handler.

use crate::config::Config;
use crate::control_plane::ControlPlaneClient;
use crate::endpoint::EndpointRegistry;
use crate::slot::SlotPolicy;

pub struct GatewayDeps {
    pub config: Config,
    pub control_plane: ControlPlaneClient,
    pub slot_policy: SlotPolicy,
    pub endpoint_registry: EndpointRegistry,
}

impl GatewayDeps {
    pub fn new(config: Config) -> Self {
        let control_plane = ControlPlaneClient::new(&config);
        let slot_policy = SlotPolicy::new(&config.named_tunnels_range, &config.random_tunnels_range);
        let endpoint_registry = EndpointRegistry::new(&config.unix_sockets_directory);
        Self {
            config,
            control_plane,
            slot_policy,
            endpoint_registry,
        }
    }
}
