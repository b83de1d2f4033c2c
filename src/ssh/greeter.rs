//! Writes banners, tunnel URLs, and QR codes to the client's session
//! stream; enforces the absolute session timeout; exits with
//! structured reason codes by closing the session channel.

use std::sync::Arc;

use log::info;
use russh::server::Handle;
use russh::ChannelId;
use tokio::sync::oneshot;

use crate::context::{ConnectionContext, Rejection};
use crate::gateway::GatewayDeps;
use crate::slot::random_suffix;

/// Runs the full decision tree for one session channel, then — only
/// on the success path — the absolute-timeout watchdog. Returns a
/// cancellation handle for that watchdog (`None` on every exit-1 path,
/// since no watchdog was started).
pub async fn run(
    deps: Arc<GatewayDeps>,
    handle: Handle,
    channel_id: ChannelId,
    context: ConnectionContext,
) -> Option<oneshot::Sender<()>> {
    // 1. Unrecognised user.
    if !context.key_matches {
        let welcome = deps.control_plane.banner("welcome").await;
        let unrecognised = deps.control_plane.banner("unrecognised_user").await;
        write_line(&handle, channel_id, &format!("{}\n\n", welcome)).await;
        write_line(&handle, channel_id, &format!("{}\n", unrecognised)).await;
        info!("user rejected: ssh key does not match");
        close(&handle, channel_id).await;
        return None;
    }

    // 2/3. A recorded rejection from the forward-request phase.
    match &context.rejection {
        Some(Rejection::InvalidSlot(n)) => {
            write_line(
                &handle,
                channel_id,
                &format!(
                    "Invalid slot number: {}. Please use slots 1-{} only.\n",
                    n, deps.slot_policy.max_slot
                ),
            )
            .await;
            info!("user rejected: invalid slot {}", n);
            close(&handle, channel_id).await;
            return None;
        }
        Some(Rejection::TunnelExists(name)) => {
            write_line(
                &handle,
                channel_id,
                &format!("Tunnel already exists: {}. Please use a different slot.\n", name),
            )
            .await;
            info!("user rejected: tunnel {} already exists", name);
            close(&handle, channel_id).await;
            return None;
        }
        _ => {}
    }

    // 4. Unix socket forwarding rejected, or no tunnel was ultimately registered.
    let unix_socket_rejected = matches!(context.rejection, Some(Rejection::UnixSocketRejected));
    if unix_socket_rejected || context.endpoints.is_empty() {
        write_line(&handle, channel_id, &usage_help(&deps, &context.username)).await;
        if unix_socket_rejected {
            info!("user rejected: unix socket forwarding not allowed");
        } else {
            info!("user rejected: not in port forwarding mode");
        }
        close(&handle, channel_id).await;
        return None;
    }

    // 5. Success: report every bound tunnel, then arm the watchdog.
    for (_, name) in &context.endpoints {
        let plain = format!("{}.{}", name, deps.config.http_url);
        let tls = format!("https://{}.{}", name, deps.config.http_url);
        let qrcode = deps.control_plane.qrcode(&tls).await;
        write_line(
            &handle,
            channel_id,
            &format!("Internet address: {}\nTLS termination: {}\n\n{}\n", plain, tls, qrcode),
        )
        .await;
        info!("exposed on {}", plain);
    }

    let (cancel_tx, cancel_rx) = oneshot::channel();
    spawn_timeout_watchdog(deps, handle, channel_id, cancel_rx);
    Some(cancel_tx)
}

fn spawn_timeout_watchdog(
    deps: Arc<GatewayDeps>,
    handle: Handle,
    channel_id: ChannelId,
    cancel_rx: oneshot::Receiver<()>,
) {
    let timeout = std::time::Duration::from_secs(deps.config.timeout_minutes * 60);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                let hours = deps.config.timeout_hours();
                write_line(
                    &handle,
                    channel_id,
                    &format!("\nTimeout: automatically disconnected after {} hours.\n", hours),
                )
                .await;
                info!("user automatically disconnected after {} hours", hours);
                close(&handle, channel_id).await;
            }
            _ = cancel_rx => {}
        }
    });
}

async fn write_line(handle: &Handle, channel_id: ChannelId, text: &str) {
    let _ = handle.data(channel_id, text.as_bytes().to_vec().into()).await;
}

async fn close(handle: &Handle, channel_id: ChannelId) {
    let _ = handle.close(channel_id).await;
}

fn usage_help(deps: &GatewayDeps, username: &str) -> String {
    let named = deps.slot_policy.named;
    let random = deps.slot_policy.random;
    let max_slot = deps.slot_policy.max_slot;
    let timeout_hours = deps.config.timeout_hours();
    let suffix = random_suffix();
    let ssh_url = &deps.config.ssh_server_url;

    format!(
        "Usage: ssh -R <slot>:localhost:<localport> {ssh_url}\n\
\n\
Tunnel naming rules:\n\
- Slots {named_start}-{named_end}: Named as {username}, {username}-2, {username}-3, etc.\n\
- Slots {random_start}-{random_end}: Random names like {username}-{suffix}\n\
- Maximum: {max_slot} concurrent tunnels per user (slots 1-{max_slot})\n\
- Session limit: {timeout_hours} hours\n\
\n\
Only numbered slots are supported. Unix socket forwarding is not allowed.\n\
\n\
Examples:\n\
ssh -R 1:localhost:3000 {ssh_url}                              Named tunnel: {username}\n\
ssh -R 2:localhost:8080 {ssh_url}                              Named tunnel: {username}-2\n\
ssh -R 1:localhost:3000 -R 2:localhost:8080 {ssh_url}          Named tunnels: {username}, {username}-2\n\
ssh -R {random_start}:localhost:9000 {ssh_url}                 Random tunnel name\n",
        ssh_url = ssh_url,
        named_start = named.start,
        named_end = named.end,
        random_start = random.start,
        random_end = random.end,
        max_slot = max_slot,
        timeout_hours = timeout_hours,
        username = username,
        suffix = suffix,
    )
}
