//! Centralized configuration for the gateway.
//!
//! Every option in this module has a documented default, so loading
//! never panics on a missing environment variable — only a malformed
//! numeric field is a startup error.

use std::sync::OnceLock;

mod env {
    pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
    pub const UNIX_SOCKETS_DIRECTORY: &str = "UNIX_SOCKETS_DIRECTORY";
    pub const MAIN_URL: &str = "MAIN_URL";
    pub const HTTP_URL: &str = "HTTP_URL";
    pub const SSH_SERVER_URL: &str = "SSH_SERVER_URL";
    pub const CONFIG_DIRECTORY: &str = "CONFIG_DIRECTORY";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const NAMED_TUNNELS_RANGE: &str = "NAMED_TUNNELS_RANGE";
    pub const RANDOM_TUNNELS_RANGE: &str = "RANDOM_TUNNELS_RANGE";
    pub const SSH_SERVER_HOST: &str = "SSH_SERVER_HOST";
    pub const SSH_SERVER_PORT: &str = "SSH_SERVER_PORT";
    pub const SSH_SERVER_KEY: &str = "SSH_SERVER_KEY";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_DEPTH: &str = "LOG_DEPTH";
    pub const KEY_MATCHES_ACCOUNT_URL: &str = "KEY_MATCHES_ACCOUNT_URL";
    pub const IS_USER_STARGAZER_URL: &str = "IS_USER_STARGAZER_URL";
    pub const GENERATE_QRCODE_URL: &str = "GENERATE_QRCODE_URL";
    pub const BANNER_URL: &str = "BANNER_URL";
    pub const CACHE_ADD_URL: &str = "CACHE_ADD_URL";
    pub const CACHE_REMOVE_URL: &str = "CACHE_REMOVE_URL";
    pub const CHECK_IF_TUNNEL_EXISTS_URL: &str = "CHECK_IF_TUNNEL_EXISTS";
}

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    /// Reserved; never consumed by the core (see spec open question).
    pub access_token: String,
    pub unix_sockets_directory: String,
    pub main_url: String,
    pub http_url: String,
    pub ssh_server_url: String,
    pub config_directory: String,
    pub timeout_minutes: u64,
    pub named_tunnels_range: String,
    pub random_tunnels_range: String,
    pub ssh_server_host: String,
    pub ssh_server_port: u16,
    pub ssh_server_key: String,
    pub log_level: String,
    /// Call-site depth accepted for compatibility; unused by `log`/`env_logger`.
    pub log_depth: u32,
    pub key_matches_account_url: String,
    pub is_user_stargazer_url: String,
    pub generate_qrcode_url: String,
    pub banner_url: String,
    pub cache_add_url: String,
    pub cache_remove_url: String,
    pub check_if_tunnel_exists_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    fn load() -> anyhow::Result<Self> {
        let timeout_minutes = var_or(env::TIMEOUT, "120")
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a positive integer: {}", env::TIMEOUT, e))?;

        let ssh_server_port = var_or(env::SSH_SERVER_PORT, "2222").parse().map_err(|e| {
            anyhow::anyhow!("{} must be a valid port number: {}", env::SSH_SERVER_PORT, e)
        })?;

        let log_depth = var_or(env::LOG_DEPTH, "2")
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be an integer: {}", env::LOG_DEPTH, e))?;

        Ok(Self {
            access_token: var_or(env::ACCESS_TOKEN, ""),
            unix_sockets_directory: var_or(env::UNIX_SOCKETS_DIRECTORY, "./"),
            main_url: var_or(env::MAIN_URL, ""),
            http_url: var_or(env::HTTP_URL, ""),
            ssh_server_url: var_or(env::SSH_SERVER_URL, ""),
            config_directory: var_or(env::CONFIG_DIRECTORY, "."),
            timeout_minutes,
            named_tunnels_range: var_or(env::NAMED_TUNNELS_RANGE, "1-3"),
            random_tunnels_range: var_or(env::RANDOM_TUNNELS_RANGE, "4-5"),
            ssh_server_host: var_or(env::SSH_SERVER_HOST, "0.0.0.0"),
            ssh_server_port,
            ssh_server_key: var_or(env::SSH_SERVER_KEY, ""),
            log_level: var_or(env::LOG_LEVEL, "info"),
            log_depth,
            key_matches_account_url: var_or(
                env::KEY_MATCHES_ACCOUNT_URL,
                "http://localhost:3000/keyMatchesAccount",
            ),
            is_user_stargazer_url: var_or(
                env::IS_USER_STARGAZER_URL,
                "http://localhost:3000/isUserStargazer",
            ),
            generate_qrcode_url: var_or(
                env::GENERATE_QRCODE_URL,
                "http://localhost:3000/generateQRCode",
            ),
            banner_url: var_or(env::BANNER_URL, "http://localhost:3000/getBanner"),
            cache_add_url: var_or(
                env::CACHE_ADD_URL,
                "http://localhost:3000/addToNginxCache",
            ),
            cache_remove_url: var_or(
                env::CACHE_REMOVE_URL,
                "http://localhost:3000/removeFromNginxCache",
            ),
            check_if_tunnel_exists_url: var_or(
                env::CHECK_IF_TUNNEL_EXISTS_URL,
                "http://localhost:3000/checkIfTunnelExists",
            ),
        })
    }

    /// Absolute session timeout, rendered in whole hours for user-facing text.
    pub fn timeout_hours(&self) -> u64 {
        self.timeout_minutes / 60
    }

    pub fn host_key_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.config_directory).join("id_rsa_host")
    }
}

/// Load configuration from the environment (reading `.env` first if
/// present). Must be called once at startup before [`get`].
pub fn init() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("config::init() called more than once"))
}

/// Get the global configuration. Panics if [`init`] has not run.
pub fn get() -> &'static Config {
    CONFIG.get().expect("config::init() must run before config::get()")
}
