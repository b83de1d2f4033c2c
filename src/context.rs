//! Per-connection state: the typed record that replaces the source's
//! untyped "extra info" bag on the SSH connection object.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Tagged reason carried from the global-request phase to the
/// interactive greeter. At most one is recorded per connection; the
/// first one recorded is the one reported (later rejections on the
/// same connection do not overwrite it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InvalidSlot(u32),
    TunnelExists(String),
    UnixSocketRejected,
}

/// One per SSH session. Mutated only on that connection's own task —
/// no locking required beyond the event loop's own turn discipline.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub peer_addr: Option<SocketAddr>,
    pub username: String,
    pub key_matches: bool,
    pub is_stargazer: bool,
    /// `endpoint_path -> tunnel_name` for every successfully bound
    /// tunnel on this connection, in insertion order.
    pub endpoints: Vec<(String, String)>,
    pub rejection: Option<Rejection>,
}

impl ConnectionContext {
    pub fn new(peer_addr: Option<SocketAddr>) -> Self {
        Self {
            peer_addr,
            username: String::new(),
            key_matches: false,
            is_stargazer: false,
            endpoints: Vec::new(),
            rejection: None,
        }
    }

    /// Record a rejection reason, but only if none has been recorded
    /// yet on this connection — the greeter reports the first one.
    pub fn record_rejection(&mut self, rejection: Rejection) {
        if self.rejection.is_none() {
            self.rejection = Some(rejection);
        }
    }

    pub fn record_endpoint(&mut self, endpoint_path: String, tunnel_name: String) {
        self.endpoints.push((endpoint_path, tunnel_name));
    }
}

/// Transient per-tunnel bookkeeping, alive only within one connection.
#[derive(Debug, Clone)]
pub struct Tunnel {
    pub slot: u32,
    pub tunnel_name: String,
    pub endpoint_path: String,
    pub meta_path: String,
    pub cache_registered: bool,
}

/// Maps tunnel name to its owning `Tunnel` record for the duration of
/// the connection; used by teardown to drive the cleanup sweep.
pub type TunnelTable = HashMap<String, Tunnel>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_rejection_wins() {
        let mut ctx = ConnectionContext::new(None);
        ctx.record_rejection(Rejection::InvalidSlot(9));
        ctx.record_rejection(Rejection::UnixSocketRejected);
        assert_eq!(ctx.rejection, Some(Rejection::InvalidSlot(9)));
    }

    #[test]
    fn endpoints_preserve_insertion_order() {
        let mut ctx = ConnectionContext::new(None);
        ctx.record_endpoint("./alice.sock".into(), "alice".into());
        ctx.record_endpoint("./alice-2.sock".into(), "alice-2".into());
        assert_eq!(
            ctx.endpoints,
            vec![
                ("./alice.sock".to_string(), "alice".to_string()),
                ("./alice-2.sock".to_string(), "alice-2".to_string()),
            ]
        );
    }
}
