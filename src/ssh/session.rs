//! `TunnelSession`: the forward-request state machine invoked from the
//! SSH `tcpip_forward` global request. Validates the requested slot,
//! binds a stream endpoint, registers it with the ControlPlane cache,
//! and spawns the acceptor loop that bridges inbound stream
//! connections to forwarded-tcpip SSH channels.

use std::sync::Arc;

use log::{error, info};
use russh::server::Handle;
use tokio::task::JoinHandle;

use crate::context::{ConnectionContext, Rejection, Tunnel, TunnelTable};
use crate::gateway::GatewayDeps;
use crate::slot::SlotClass;

/// Handles one `tcpip-forward` global request for `listen_host`/`slot`.
///
/// Returns `true` when russh should report the bind as granted to the
/// client (a real tunnel was registered); `false` otherwise — either a
/// rejection was recorded on `context` (invalid slot, name collision)
/// or the endpoint was merely busy, which is reported identically to
/// "not in port-forwarding mode" by the greeter.
pub async fn request_forward(
    deps: &Arc<GatewayDeps>,
    context: &mut ConnectionContext,
    tunnels: &mut TunnelTable,
    acceptors: &mut Vec<JoinHandle<()>>,
    handle: &Handle,
    listen_host: &str,
    slot: u32,
) -> bool {
    let class = deps.slot_policy.classify(slot);
    if class == SlotClass::Invalid {
        context.record_rejection(Rejection::InvalidSlot(slot));
        return false;
    }

    let tunnel_name = match deps.slot_policy.name(&context.username, slot) {
        Some(name) => name,
        None => {
            context.record_rejection(Rejection::InvalidSlot(slot));
            return false;
        }
    };

    if deps.control_plane.tunnel_exists(&tunnel_name).await {
        context.record_rejection(Rejection::TunnelExists(tunnel_name));
        return false;
    }

    let bound = match deps.endpoint_registry.bind(&tunnel_name).await {
        Ok(bound) => bound,
        Err(e) => {
            // Busy or otherwise unbindable: no rejection banner, the
            // connection just falls through to the usage-help case if
            // no other forward succeeds on it.
            info!("endpoint bind failed for {}: {}", tunnel_name, e);
            return false;
        }
    };

    let cache_registered = deps
        .control_plane
        .cache_add(&tunnel_name, &deps.control_plane.container_addr)
        .await;
    if !cache_registered {
        error!("cache_add reported failure for {}", tunnel_name);
    }

    context.record_endpoint(bound.endpoint_path.clone(), tunnel_name.clone());
    tunnels.insert(
        tunnel_name.clone(),
        Tunnel {
            slot,
            tunnel_name: tunnel_name.clone(),
            endpoint_path: bound.endpoint_path,
            meta_path: bound.meta_path,
            cache_registered,
        },
    );

    let connected_host = listen_host.to_string();
    let log_name = tunnel_name.clone();
    let acceptor_handle = handle.clone();
    acceptors.push(tokio::spawn(async move {
        loop {
            let (stream, _) = match bound.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept failed on endpoint {}: {}", log_name, e);
                    break;
                }
            };

            let channel_result = acceptor_handle
                .channel_open_forwarded_tcpip(&connected_host, slot, "127.0.0.1", 0)
                .await;

            let channel = match channel_result {
                Ok(channel) => channel,
                Err(e) => {
                    error!("forwarded-tcpip open failed for {}: {}", log_name, e);
                    continue;
                }
            };

            let bridge_name = log_name.clone();
            tokio::spawn(async move {
                let mut endpoint_stream = stream;
                let mut channel_stream = channel.into_stream();
                if let Err(e) =
                    tokio::io::copy_bidirectional(&mut endpoint_stream, &mut channel_stream).await
                {
                    info!("bridge closed for {}: {}", bridge_name, e);
                }
            });
        }
    }));

    true
}
