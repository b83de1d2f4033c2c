//! `TunnelServer`: the `russh::server::Server` implementation that
//! spawns one [`SshHandler`] per inbound connection.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use russh::server::{Handler, Server};

use super::SshHandler;
use crate::gateway::GatewayDeps;

#[derive(Clone)]
pub struct TunnelServer {
    deps: Arc<GatewayDeps>,
}

impl TunnelServer {
    pub fn new(deps: Arc<GatewayDeps>) -> Self {
        Self { deps }
    }
}

impl Server for TunnelServer {
    type Handler = SshHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        info!("new ssh connection from {:?}", peer_addr);
        SshHandler::new(self.deps.clone(), peer_addr)
    }

    fn handle_session_error(&mut self, error: <Self::Handler as Handler>::Error) {
        error!("session error: {:?}", error);
    }
}
