//! Domain error types shared across the gateway.

use thiserror::Error;

/// Errors that can arise while servicing one SSH connection or one
/// forward request on it. Most variants are handled locally (logged,
/// folded into a conservative default, or surfaced as a rejection
/// banner); only [`GatewayError::StartupError`] is fatal to the process.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A ControlPlane call failed (transport error or non-2xx response).
    /// Never fatal: the caller falls back to the operation's documented
    /// conservative default.
    #[error("control plane unavailable: {0}")]
    ControlPlaneUnavailable(String),

    /// `EndpointRegistry::bind` found the path already in use.
    #[error("endpoint busy: {0}")]
    EndpointBusy(String),

    /// No presented public key matched the asserted username. The SSH
    /// layer still accepts; this is only observed by the greeter.
    #[error("no key matched for user '{0}'")]
    AuthDeferred(String),

    /// `slot` fell outside `[1, max_slot]`.
    #[error("invalid slot number: {0}")]
    InvalidSlot(u32),

    /// `ControlPlane.tunnel_exists` reported a name collision.
    #[error("tunnel already exists: {0}")]
    TunnelExists(String),

    /// A `streamlocal-forward` (unix-socket) global request was rejected.
    #[error("unix socket forwarding is not supported")]
    UnixSocketForward,

    /// The session opened with no active tunnel and no other rejection
    /// to report; the greeter falls back to the usage-help banner.
    #[error("no forward request registered on this connection")]
    NoForward,

    /// The absolute session timeout elapsed.
    #[error("session timeout")]
    SessionTimeout,

    /// Transport-level failure (SSH protocol error, I/O error). Logged,
    /// triggers teardown, never shown to the user.
    #[error("transport error: {0}")]
    TransportError(#[from] std::io::Error),

    /// Underlying SSH protocol error from `russh`.
    #[error("ssh error: {0}")]
    SshError(#[from] russh::Error),

    /// Fatal: the process cannot start (bind failure, bad host key,
    /// bad configuration).
    #[error("startup error: {0}")]
    StartupError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_slot_display() {
        let err = GatewayError::InvalidSlot(9);
        assert_eq!(format!("{}", err), "invalid slot number: 9");
    }

    #[test]
    fn tunnel_exists_display() {
        let err = GatewayError::TunnelExists("eve".to_string());
        assert_eq!(format!("{}", err), "tunnel already exists: eve");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::TransportError(_)));
    }
}
