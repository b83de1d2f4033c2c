//! Per-connection SSH handler. Authenticates every offered public key
//! against the ControlPlane, accepts numbered `tcpip-forward` requests
//! as tunnel bind attempts, rejects `streamlocal-forward` outright, and
//! hands the session channel to the interactive greeter once opened.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use russh::keys::PublicKey;
use russh::server::{Auth, Handle, Handler, Msg, Session};
use russh::{Channel, ChannelId};
use russh_keys::HashAlg;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::context::{ConnectionContext, Rejection, TunnelTable};
use crate::gateway::GatewayDeps;

use super::greeter;
use super::session::request_forward;

pub struct SshHandler {
    deps: Arc<GatewayDeps>,
    context: ConnectionContext,
    tunnels: TunnelTable,
    session_handle: Option<Handle>,
    session_channel_id: Option<ChannelId>,
    acceptors: Vec<JoinHandle<()>>,
    timeout_cancel: Option<oneshot::Sender<()>>,
}

impl SshHandler {
    pub fn new(deps: Arc<GatewayDeps>, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            deps,
            context: ConnectionContext::new(peer_addr),
            tunnels: TunnelTable::new(),
            session_handle: None,
            session_channel_id: None,
            acceptors: Vec::new(),
            timeout_cancel: None,
        }
    }

    /// Tear down every tunnel registered on this connection: abort the
    /// acceptor loops and release each bound endpoint.
    async fn cleanup_tunnels(&mut self) {
        for acceptor in self.acceptors.drain(..) {
            acceptor.abort();
        }
        for (_, tunnel) in self.tunnels.drain() {
            self.deps
                .endpoint_registry
                .release(
                    &tunnel.endpoint_path,
                    &tunnel.meta_path,
                    &tunnel.tunnel_name,
                    &self.deps.control_plane,
                )
                .await;
            info!("released tunnel {}", tunnel.tunnel_name);
        }
        if let Some(cancel) = self.timeout_cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[async_trait]
impl Handler for SshHandler {
    type Error = crate::error::GatewayError;

    async fn auth_succeeded(&mut self, session: &mut Session) -> Result<(), Self::Error> {
        let handle = session.handle();
        self.session_handle = Some(handle);
        Ok(())
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.context.username = user.to_string();

        let key_line = public_key.to_openssh().unwrap_or_default();

        if !self.context.key_matches {
            let (matches, is_stargazer) = self.deps.control_plane.key_matches(user, &key_line).await;
            if matches {
                self.context.key_matches = true;
                self.context.is_stargazer = is_stargazer;
            }
        }

        // The gateway always accepts at the transport level; rejection
        // (if any) is reported interactively once the session channel
        // opens, matching the upstream control plane's own behavior.
        Ok(Auth::Accept)
    }

    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let handle = session.handle();
        let granted = request_forward(
            &self.deps,
            &mut self.context,
            &mut self.tunnels,
            &mut self.acceptors,
            &handle,
            address,
            *port,
        )
        .await;
        Ok(granted)
    }

    async fn cancel_tcpip_forward(
        &mut self,
        _address: &str,
        port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if let Some(tunnel) = self.tunnels.values().find(|t| t.slot == port).cloned() {
            self.tunnels.remove(&tunnel.tunnel_name);
            self.deps
                .endpoint_registry
                .release(
                    &tunnel.endpoint_path,
                    &tunnel.meta_path,
                    &tunnel.tunnel_name,
                    &self.deps.control_plane,
                )
                .await;
            info!("cancelled tunnel {} (slot {})", tunnel.tunnel_name, port);
        }
        Ok(true)
    }

    /// Unix-socket forwarding is never supported; the requester is
    /// reported this at the interactive-greeter stage.
    async fn streamlocal_forward(
        &mut self,
        socket_path: &str,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        warn!("rejecting streamlocal-forward request for {}", socket_path);
        self.context.record_rejection(Rejection::UnixSocketRejected);
        Ok(false)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let channel_id = channel.id();
        self.session_channel_id = Some(channel_id);

        let handle = session.handle();
        let deps = self.deps.clone();
        let context = self.context.clone();

        let cancel = greeter::run(deps, handle, channel_id, context).await;
        self.timeout_cancel = cancel;

        Ok(true)
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.session_channel_id == Some(channel) {
            info!("session channel {:?} closed, cleaning up", channel);
            self.cleanup_tunnels().await;
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// File transfer (`scp`/`sftp` exec) is out of scope: reject every
    /// exec request.
    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        warn!("exec request rejected on channel {:?}", channel);
        session.channel_failure(channel)?;
        Ok(())
    }
}
