//! Command-line / environment configuration shared by front ends.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{FileStore, KeyValueStore};

/// Backend, storage and cache settings.
///
/// Flatten into a front end's parser with `#[command(flatten)]`.
#[derive(Debug, Clone, clap::Args)]
pub struct ConsoleConfig {
    /// Base URL of the console backend.
    #[arg(
        long,
        global = true,
        default_value = "http://127.0.0.1:8000",
        env = "CLUSTERDECK_BACKEND"
    )]
    pub backend_url: String,

    /// Directory holding saved presets and connections.
    #[arg(
        long,
        global = true,
        default_value = ".clusterdeck",
        env = "CLUSTERDECK_DATA_DIR"
    )]
    pub data_dir: PathBuf,

    /// Lifetime of cached query responses, in seconds.
    #[arg(long, global = true, default_value = "300", env = "CLUSTERDECK_CACHE_TTL")]
    pub cache_ttl: u64,

    /// Backend request timeout, in seconds.
    #[arg(long, global = true, default_value = "15", env = "CLUSTERDECK_TIMEOUT")]
    pub timeout: u64,

    /// Serve data from the built-in demo fleet instead of a backend.
    #[arg(long, global = true)]
    pub demo: bool,
}

impl ConsoleConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Opens the file store under `data_dir`.
    pub fn open_store(&self) -> io::Result<Arc<dyn KeyValueStore>> {
        Ok(Arc::new(FileStore::open(&self.data_dir)?))
    }
}
