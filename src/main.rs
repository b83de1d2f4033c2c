//! Multi-tenant reverse-tunnel gateway.
//!
//! Clients authenticate over SSH with a public key, request a numbered
//! slot via `-R <slot>:localhost:<port>`, and are handed a unix-socket
//! stream endpoint bridged to their forwarded channel. See
//! [`ssh::TunnelServer`] for the per-connection state machine.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use russh::server::Server as _;

use expose_tunnel_gateway::bootstrap;
use expose_tunnel_gateway::config;
use expose_tunnel_gateway::gateway::GatewayDeps;
use expose_tunnel_gateway::key::load_or_materialize_host_key;
use expose_tunnel_gateway::ssh::TunnelServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init()?;
    let cfg = config::get();

    bootstrap::init_logging(cfg);
    info!("starting expose tunnel gateway");

    bootstrap::ensure_endpoint_directory(cfg).await?;
    bootstrap::relax_umask();

    let host_key = load_or_materialize_host_key(cfg).await?;

    let deps = Arc::new(GatewayDeps::new(cfg.clone()));

    let server_config = russh::server::Config {
        methods: russh::MethodSet::PUBLICKEY,
        server_id: russh::SshId::Standard("SSH-2.0-EXPOSE SSH Server".to_string()),
        keys: vec![host_key],
        keepalive_interval: Some(Duration::from_secs(30)),
        inactivity_timeout: Some(Duration::from_secs(1800)),
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        ..Default::default()
    };
    let server_config = Arc::new(server_config);

    let mut server = TunnelServer::new(deps);
    let addr = format!("{}:{}", cfg.ssh_server_host, cfg.ssh_server_port);
    info!("listening on {}", addr);

    server.run_on_address(server_config, addr).await?;
    Ok(())
}
