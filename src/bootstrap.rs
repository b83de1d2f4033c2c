//! Startup-time preparation: logging, directory layout, and the
//! process umask. Split out from `main` so each step is independently
//! testable and so `main` reads as a short, linear sequence.

use std::path::Path;

use log::info;
use nix::sys::stat::Mode;
use nix::unistd::umask;

use crate::config::Config;

/// Initializes `env_logger` from `config.log_level`. `LOG_DEPTH` is
/// accepted as configuration (for compatibility with deployments that
/// set it) but has no effect on this logger's call-site reporting.
pub fn init_logging(config: &Config) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();
}

/// Relaxes the process umask so endpoint stream sockets are created
/// world-accessible, matching the external proxy's expected access
/// mode. Mirrors the original `os.umask(0o000)` call.
pub fn relax_umask() {
    umask(Mode::empty());
}

/// Ensures the unix-socket endpoint directory exists.
pub async fn ensure_endpoint_directory(config: &Config) -> anyhow::Result<()> {
    let dir = Path::new(&config.unix_sockets_directory);
    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
        info!("created unix sockets directory at {}", dir.display());
    }
    Ok(())
}
