//! Owns the stream-endpoint directory: creates `<name>.sock` stream
//! listeners paired with an empty `<name>.meta` marker file, and tears
//! both down (plus the ControlPlane cache entry) on release.
//!
//! Each listener is independent; the only shared state is the owning
//! connection's own `endpoints` mapping, mutated exclusively on that
//! connection's task. Collision across connections is ultimately
//! prevented by the stream listener bind itself failing when the path
//! is already in use.

use std::path::{Path, PathBuf};

use log::{error, warn};
use tokio::net::UnixListener;

use crate::control_plane::ControlPlaneClient;
use crate::error::GatewayError;

pub struct EndpointRegistry {
    directory: PathBuf,
}

/// A bound stream endpoint: the accept-ready listener plus the two
/// filesystem paths the external proxy and the cleanup sweep need.
pub struct BoundEndpoint {
    pub listener: UnixListener,
    pub endpoint_path: String,
    pub meta_path: String,
}

impl EndpointRegistry {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn paths_for(&self, tunnel_name: &str) -> (PathBuf, PathBuf) {
        (
            self.directory.join(format!("{}.sock", tunnel_name)),
            self.directory.join(format!("{}.meta", tunnel_name)),
        )
    }

    /// Bind a stream listener for `tunnel_name`. Fails with
    /// [`GatewayError::EndpointBusy`] if the socket path already
    /// exists; the meta marker is created (truncate-if-exists) first
    /// either way since it carries no exclusivity semantics of its own.
    pub async fn bind(&self, tunnel_name: &str) -> Result<BoundEndpoint, GatewayError> {
        let (endpoint_path, meta_path) = self.paths_for(tunnel_name);

        tokio::fs::File::create(&meta_path)
            .await
            .map_err(|e| GatewayError::StartupError(format!("creating meta file: {}", e)))?;

        let listener = match UnixListener::bind(&endpoint_path) {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                return Err(GatewayError::EndpointBusy(endpoint_path.display().to_string()));
            }
            Err(e) => {
                return Err(GatewayError::StartupError(format!(
                    "binding endpoint {}: {}",
                    endpoint_path.display(),
                    e
                )));
            }
        };

        Ok(BoundEndpoint {
            listener,
            endpoint_path: endpoint_path.display().to_string(),
            meta_path: meta_path.display().to_string(),
        })
    }

    /// Remove the endpoint and meta files (best effort, ignoring
    /// not-found) and invoke `cache_remove`. Never fails the caller.
    pub async fn release(
        &self,
        endpoint_path: &str,
        meta_path: &str,
        tunnel_name: &str,
        control_plane: &ControlPlaneClient,
    ) {
        remove_best_effort(endpoint_path).await;
        remove_best_effort(meta_path).await;
        if !control_plane.cache_remove(tunnel_name).await {
            warn!("cache_remove reported failure for {}", tunnel_name);
        }
    }
}

async fn remove_best_effort(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!("error removing {}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            access_token: String::new(),
            unix_sockets_directory: "./".to_string(),
            main_url: String::new(),
            http_url: String::new(),
            ssh_server_url: String::new(),
            config_directory: ".".to_string(),
            timeout_minutes: 120,
            named_tunnels_range: "1-3".to_string(),
            random_tunnels_range: "4-5".to_string(),
            ssh_server_host: "0.0.0.0".to_string(),
            ssh_server_port: 2222,
            ssh_server_key: String::new(),
            log_level: "info".to_string(),
            log_depth: 2,
            key_matches_account_url: "http://127.0.0.1:1/keyMatchesAccount".to_string(),
            is_user_stargazer_url: "http://127.0.0.1:1/isUserStargazer".to_string(),
            generate_qrcode_url: "http://127.0.0.1:1/generateQRCode".to_string(),
            banner_url: "http://127.0.0.1:1/getBanner".to_string(),
            cache_add_url: "http://127.0.0.1:1/addToNginxCache".to_string(),
            cache_remove_url: "http://127.0.0.1:1/removeFromNginxCache".to_string(),
            check_if_tunnel_exists_url: "http://127.0.0.1:1/checkIfTunnelExists".to_string(),
        }
    }

    #[tokio::test]
    async fn bind_creates_socket_and_meta_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EndpointRegistry::new(dir.path());

        let bound = registry.bind("alice").await.unwrap();

        assert!(Path::new(&bound.endpoint_path).exists());
        assert!(Path::new(&bound.meta_path).exists());
        assert_eq!(bound.endpoint_path, dir.path().join("alice.sock").display().to_string());
        assert_eq!(bound.meta_path, dir.path().join("alice.meta").display().to_string());
    }

    #[tokio::test]
    async fn bind_twice_on_same_name_yields_endpoint_busy() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EndpointRegistry::new(dir.path());

        let _first = registry.bind("bob").await.unwrap();
        let second = registry.bind("bob").await;

        assert!(matches!(second, Err(GatewayError::EndpointBusy(_))));
    }

    #[tokio::test]
    async fn bind_then_release_restores_original_directory_state() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EndpointRegistry::new(dir.path());
        let control_plane = ControlPlaneClient::new(&test_config());

        let bound = registry.bind("carol").await.unwrap();
        drop(bound.listener);
        registry
            .release(&bound.endpoint_path, &bound.meta_path, "carol", &control_plane)
            .await;

        assert!(!Path::new(&bound.endpoint_path).exists());
        assert!(!Path::new(&bound.meta_path).exists());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EndpointRegistry::new(dir.path());
        let control_plane = ControlPlaneClient::new(&test_config());

        let bound = registry.bind("dave").await.unwrap();
        drop(bound.listener);
        registry
            .release(&bound.endpoint_path, &bound.meta_path, "dave", &control_plane)
            .await;
        // second release on already-removed paths must not panic
        registry
            .release(&bound.endpoint_path, &bound.meta_path, "dave", &control_plane)
            .await;
    }
}
