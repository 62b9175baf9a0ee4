// SecureDB: Runtime configuration
//
// Resolved once at startup from CLI flags and `SECUREDB_*` environment
// variables (via clap's `env` support). Everything on disk lives under
// `data_dir`; the gateway socket lives under `$XDG_RUNTIME_DIR`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SecureDbError;
use crate::keys::{FileKeySlot, KeyManager, KeySlot, KeyringKeySlot, KEYRING_SERVICE};
use crate::store::{Database, RecordStore};

pub use crate::keys::DEFAULT_KEY_SLOT;

/// Where the record key is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeyBackend {
    /// `keys.json` in the data directory.
    #[default]
    File,
    /// The platform keyring.
    Keyring,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub key_backend: KeyBackend,
    pub key_slot: String,
}

impl Config {
    pub fn new(data_dir: Option<PathBuf>, key_backend: KeyBackend) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(Self::default_data_dir),
            key_backend,
            key_slot: DEFAULT_KEY_SLOT.to_string(),
        }
    }

    /// `<platform data dir>/securedb`, or `./securedb` if the platform has none.
    pub fn default_data_dir() -> PathBuf {
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("securedb")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("securedb.db")
    }

    pub fn key_file(&self) -> PathBuf {
        self.data_dir.join("keys.json")
    }

    /// `$XDG_RUNTIME_DIR/securedb/securedb.sock`, falling back to `/tmp`.
    pub fn socket_path(&self) -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        runtime_dir.join("securedb").join("securedb.sock")
    }

    pub fn key_slot(&self) -> Arc<dyn KeySlot> {
        match self.key_backend {
            KeyBackend::File => Arc::new(FileKeySlot::new(self.key_file(), &self.key_slot)),
            KeyBackend::Keyring => Arc::new(KeyringKeySlot::new(KEYRING_SERVICE, &self.key_slot)),
        }
    }

    pub fn key_manager(&self) -> KeyManager {
        KeyManager::new(self.key_slot())
    }

    /// Create the data directory if needed and open the record store on the
    /// SQLite database inside it.
    pub fn open_store(&self) -> Result<RecordStore<Database>, SecureDbError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let db = Database::open(&self.db_path())?;
        Ok(RecordStore::new(db, self.key_manager()))
    }
}

/// Settings for the live feed bridge.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub file: PathBuf,
    pub interval: Duration,
    pub addr: SocketAddr,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("public").join("pieChart.json"),
            interval: Duration::from_secs(5),
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
