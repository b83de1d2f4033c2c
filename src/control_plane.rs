//! Thin HTTP capability wrapping the seven ControlPlane operations.
//!
//! Every call is side-effect-safe to retry except `cache_add`/
//! `cache_remove`, which are idempotent by design. A single pooled
//! `reqwest::Client` with a 10 s per-request timeout backs all seven
//! calls; transport failures and non-2xx responses are caught here and
//! folded into each operation's documented conservative default rather
//! than propagated to the caller.

use std::net::ToSocketAddrs;
use std::time::Duration;

use log::{error, info, warn};
use serde::Deserialize;

use crate::config::Config;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct ControlPlaneClient {
    http: reqwest::Client,
    key_matches_account_url: String,
    is_user_stargazer_url: String,
    generate_qrcode_url: String,
    banner_url: String,
    cache_add_url: String,
    cache_remove_url: String,
    check_if_tunnel_exists_url: String,
    /// This gateway's own reachable address, resolved once at startup.
    /// Empty when `fly-local-6pn` does not resolve.
    pub container_addr: String,
}

#[derive(Deserialize, Default)]
struct KeyMatchesResponse {
    #[serde(default)]
    matches: bool,
    #[serde(default, rename = "isStargazer")]
    is_stargazer: bool,
}

#[derive(Deserialize, Default)]
struct StargazerResponse {
    #[serde(default, rename = "isStargazer")]
    is_stargazer: bool,
}

#[derive(Deserialize, Default)]
struct QrCodeResponse {
    #[serde(default, rename = "qrCodeText")]
    qr_code_text: String,
}

#[derive(Deserialize, Default)]
struct BannerResponse {
    #[serde(default, rename = "bannerContent")]
    banner_content: String,
}

/// Resolve `fly-local-6pn` to an IPv6 address. Returns `None` (and logs)
/// if resolution fails; callers then use an empty `addr`.
fn resolve_container_addr() -> Option<String> {
    match ("fly-local-6pn", 0).to_socket_addrs() {
        Ok(mut addrs) => addrs
            .find(|addr| addr.is_ipv6())
            .map(|addr| addr.ip().to_string()),
        Err(e) => {
            warn!("error retrieving IPv6 address for fly-local-6pn: {}", e);
            None
        }
    }
}

impl ControlPlaneClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        let container_addr = resolve_container_addr().unwrap_or_default();

        Self {
            http,
            key_matches_account_url: config.key_matches_account_url.clone(),
            is_user_stargazer_url: config.is_user_stargazer_url.clone(),
            generate_qrcode_url: config.generate_qrcode_url.clone(),
            banner_url: config.banner_url.clone(),
            cache_add_url: config.cache_add_url.clone(),
            cache_remove_url: config.cache_remove_url.clone(),
            check_if_tunnel_exists_url: config.check_if_tunnel_exists_url.clone(),
            container_addr,
        }
    }

    /// `(matches, is_stargazer)`; `(false, false)` on any error.
    pub async fn key_matches(&self, username: &str, key_line: &str) -> (bool, bool) {
        let result = self
            .http
            .get(&self.key_matches_account_url)
            .query(&[("username", username), ("key", key_line)])
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<KeyMatchesResponse>().await {
                    Ok(body) => {
                        if body.matches {
                            info!("key matches account {}", username);
                        } else {
                            info!("key does not match account {}", username);
                        }
                        (body.matches, body.is_stargazer)
                    }
                    Err(e) => {
                        error!("malformed key_matches response for {}: {}", username, e);
                        (false, false)
                    }
                }
            }
            Ok(resp) => {
                info!("user {} not found or not a stargazer ({})", username, resp.status());
                (false, false)
            }
            Err(e) => {
                error!("error checking ssh keys for {}: {}", username, e);
                (false, false)
            }
        }
    }

    /// `false` on any error.
    pub async fn is_stargazer(&self, username: &str) -> bool {
        let result = self
            .http
            .get(&self.is_user_stargazer_url)
            .query(&[("username", username)])
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => resp
                .json::<StargazerResponse>()
                .await
                .map(|body| body.is_stargazer)
                .unwrap_or(false),
            Ok(_) => false,
            Err(e) => {
                error!("error checking stargazer status for {}: {}", username, e);
                false
            }
        }
    }

    /// Pre-rendered QR code string; empty on any error.
    pub async fn qrcode(&self, url: &str) -> String {
        let result = self
            .http
            .get(&self.generate_qrcode_url)
            .query(&[("url", url)])
            .send()
            .await;

        match result {
            Ok(resp) => resp
                .json::<QrCodeResponse>()
                .await
                .map(|body| body.qr_code_text)
                .unwrap_or_default(),
            Err(e) => {
                error!("error generating qr code for {}: {}", url, e);
                String::new()
            }
        }
    }

    /// `banner_type` is one of `"welcome"`, `"unrecognised_user"`. Empty
    /// string on any error.
    pub async fn banner(&self, banner_type: &str) -> String {
        let result = self
            .http
            .get(&self.banner_url)
            .query(&[("type", banner_type)])
            .send()
            .await;

        match result {
            Ok(resp) => resp
                .json::<BannerResponse>()
                .await
                .map(|body| body.banner_content)
                .unwrap_or_default(),
            Err(e) => {
                error!("error getting banner for {}: {}", banner_type, e);
                String::new()
            }
        }
    }

    /// `false` (logged) on any error.
    pub async fn cache_add(&self, name: &str, addr: &str) -> bool {
        let result = self
            .http
            .get(&self.cache_add_url)
            .query(&[("app_name", name), ("ipv6", addr)])
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                error!("error adding to proxy cache for {}: {}", name, e);
                false
            }
        }
    }

    /// `false` (logged) on any error. Safe to call more than once.
    pub async fn cache_remove(&self, name: &str) -> bool {
        let result = self
            .http
            .get(&self.cache_remove_url)
            .query(&[("app_name", name)])
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                error!("error removing from proxy cache for {}: {}", name, e);
                false
            }
        }
    }

    /// Fail-open deliberately flipped per the specification: any
    /// non-200 response or transport error is treated as `true`
    /// (tunnel exists, refuse) rather than the conservative `false`
    /// used by every other operation. See the design notes on this
    /// intentional divergence.
    pub async fn tunnel_exists(&self, name: &str) -> bool {
        let result = self
            .http
            .get(&self.check_if_tunnel_exists_url)
            .query(&[("app_name", name)])
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                error!("error checking if tunnel exists for {}: {}", name, e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    async fn key_matches_defaults_to_false_false_on_connection_failure() {
        let client = ControlPlaneClient::new(&test_config());
        let (matches, is_stargazer) = client.key_matches("alice", "ssh-ed25519 AAAA").await;
        assert!(!matches);
        assert!(!is_stargazer);
    }

    #[tokio::test]
    async fn tunnel_exists_fails_open_to_true_on_connection_failure() {
        let client = ControlPlaneClient::new(&test_config());
        assert!(client.tunnel_exists("eve").await);
    }

    #[tokio::test]
    async fn cache_add_and_remove_default_to_false_on_connection_failure() {
        let client = ControlPlaneClient::new(&test_config());
        assert!(!client.cache_add("alice", "::1").await);
        assert!(!client.cache_remove("alice").await);
    }

    #[tokio::test]
    async fn qrcode_and_banner_default_to_empty_string_on_connection_failure() {
        let client = ControlPlaneClient::new(&test_config());
        assert_eq!(client.qrcode("https://alice.example.com").await, "");
        assert_eq!(client.banner("welcome").await, "");
    }
}
