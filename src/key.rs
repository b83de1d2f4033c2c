//! Host key materialization.
//!
//! The gateway never generates its own host key. If `id_rsa_host` is
//! absent from the configured directory, it is written verbatim from
//! `SSH_SERVER_KEY` and mode-locked to `0o600`; either way the file is
//! then loaded as the long-lived server key.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use log::{info, warn};
use russh_keys::HashAlg;

use crate::config::Config;

pub async fn load_or_materialize_host_key(config: &Config) -> anyhow::Result<russh_keys::PrivateKey> {
    let path = config.host_key_path();

    if !path.exists() {
        warn!("ssh server key created from environment");
        tokio::fs::write(&path, &config.ssh_server_key).await?;
        set_owner_only_permissions(&path).await?;
        info!("ssh server key created at {}", path.display());
    } else {
        info!("ssh server key exists at {}", path.display());
    }

    let key_data = tokio::fs::read_to_string(&path).await?;
    let key = russh_keys::PrivateKey::from_openssh(&key_data)?;
    info!(
        "server key fingerprint: {}",
        key.public_key().fingerprint(HashAlg::Sha256)
    );
    Ok(key)
}

async fn set_owner_only_permissions(path: &Path) -> anyhow::Result<()> {
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn materializes_key_from_literal_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let key = russh_keys::PrivateKey::random(
            &mut rand::thread_rng(),
            russh_keys::Algorithm::Ed25519,
        )
        .unwrap();
        let key_text = key.to_openssh(russh_keys::ssh_key::LineEnding::LF).unwrap();

        let config = Config {
            config_directory: dir.path().display().to_string(),
            ssh_server_key: key_text.to_string(),
            ..test_config()
        };

        let loaded = load_or_materialize_host_key(&config).await.unwrap();
        assert_eq!(
            loaded.public_key().fingerprint(HashAlg::Sha256).to_string(),
            key.public_key().fingerprint(HashAlg::Sha256).to_string()
        );

        let perms = tokio::fs::metadata(config.host_key_path())
            .await
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

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
            key_matches_account_url: String::new(),
            is_user_stargazer_url: String::new(),
            generate_qrcode_url: String::new(),
            banner_url: String::new(),
            cache_add_url: String::new(),
            cache_remove_url: String::new(),
            check_if_tunnel_exists_url: String::new(),
        }
    }
}
