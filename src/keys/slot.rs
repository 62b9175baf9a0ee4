// SecureDB: Durable key slots
//
// A key slot is a single named entry in a durable key-value environment that
// lives outside the record database. Its value is the raw key exported as a
// JSON array of byte values, e.g. `[12,250,...]`.
//
// Backends:
//   - `FileKeySlot`:    JSON object file in the data directory (default)
//   - `KeyringKeySlot`: platform keyring (Keychain / Credential Manager / Secret Service)
//   - `MemoryKeySlot`:  volatile, for tests and embedding

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::KeyError;

/// Service name used to identify SecureDB entries in the platform keyring.
pub const KEYRING_SERVICE: &str = "securedb";

/// Default name of the slot entry holding the record key.
pub const DEFAULT_KEY_SLOT: &str = "encryptionKey";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable storage of the raw record key.
pub trait KeySlot: Send + Sync {
    /// Name of the slot entry.
    fn name(&self) -> &str;

    /// Load the raw key bytes, or `None` if the slot is empty.
    fn load(&self) -> Result<Option<Zeroizing<Vec<u8>>>, KeyError>;

    /// Persist the raw key bytes, replacing any previous value.
    fn store(&self, raw: &[u8]) -> Result<(), KeyError>;

    /// Persist `raw` only if the slot is still empty. Returns the bytes the
    /// slot holds afterwards, which belong to another writer if it got
    /// there first.
    fn store_if_absent(&self, raw: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        if let Some(existing) = self.load()? {
            return Ok(existing);
        }
        self.store(raw)?;
        Ok(self
            .load()?
            .unwrap_or_else(|| Zeroizing::new(raw.to_vec())))
    }
}

fn encode_value(raw: &[u8]) -> Value {
    Value::from(raw)
}

fn encode_raw(raw: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(encode_value(raw).to_string())
}

fn decode_raw(encoded: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    serde_json::from_str::<Vec<u8>>(encoded)
        .map(Zeroizing::new)
        .map_err(|e| KeyError::Malformed(format!("expected a JSON byte array: {}", e)))
}

fn decode_value(value: Value) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    serde_json::from_value::<Vec<u8>>(value)
        .map(Zeroizing::new)
        .map_err(|e| KeyError::Malformed(format!("expected a JSON byte array: {}", e)))
}

// ─── File Slot ───────────────────────────────────────────────────────────────

/// Key slot backed by a JSON object file: `{ "<slot name>": [bytes...] }`.
///
/// Other entries in the file are preserved on write. Writers serialize on an
/// advisory lock held on a sibling `.lock` file, then replace the file through
/// a uniquely named temporary file and an atomic rename. The file is
/// owner-only on unix.
pub struct FileKeySlot {
    path: PathBuf,
    name: String,
}

impl FileKeySlot {
    pub fn new(path: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            path: path.into(),
            name: name.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Take the writer lock. Released when the returned file is dropped.
    fn lock(&self) -> Result<fs::File, KeyError> {
        fs::create_dir_all(self.dir())?;
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))?;
        file.lock()?;
        Ok(file)
    }

    fn read_entries(&self) -> Result<Map<String, Value>, KeyError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => Zeroizing::new(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(KeyError::Io(e)),
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            KeyError::Malformed(format!("{} is not a JSON object: {}", self.path.display(), e))
        })
    }

    /// Write `entries` with `raw` under this slot's name. Caller holds the lock.
    fn write_entries(&self, mut entries: Map<String, Value>, raw: &[u8]) -> Result<(), KeyError> {
        entries.insert(self.name.clone(), encode_value(raw));
        let encoded = Zeroizing::new(serde_json::to_string(&entries).map_err(|e| {
            KeyError::Malformed(format!("failed to encode key slot: {}", e))
        })?);

        let mut tmp = NamedTempFile::new_in(self.dir())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        tmp.write_all(encoded.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| KeyError::Io(e.error))?;

        tracing::debug!(slot = %self.name, path = %self.path.display(), "Key slot written");
        Ok(())
    }
}

impl KeySlot for FileKeySlot {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Option<Zeroizing<Vec<u8>>>, KeyError> {
        let mut entries = self.read_entries()?;
        match entries.remove(&self.name) {
            Some(value) => decode_value(value).map(Some),
            None => Ok(None),
        }
    }

    fn store(&self, raw: &[u8]) -> Result<(), KeyError> {
        let _lock = self.lock()?;
        let entries = self.read_entries()?;
        self.write_entries(entries, raw)
    }

    fn store_if_absent(&self, raw: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let _lock = self.lock()?;
        let mut entries = self.read_entries()?;
        if let Some(existing) = entries.remove(&self.name) {
            return decode_value(existing);
        }
        self.write_entries(entries, raw)?;
        Ok(Zeroizing::new(raw.to_vec()))
    }
}

// ─── Keyring Slot ────────────────────────────────────────────────────────────

/// Key slot backed by the `keyring` crate. Dispatches to:
///   - Linux: D-Bus Secret Service (GNOME Keyring / KDE Wallet)
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringKeySlot {
    service: String,
    name: String,
}

impl KeyringKeySlot {
    pub fn new(service: &str, name: &str) -> Self {
        Self {
            service: service.to_string(),
            name: name.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.name)
            .map_err(|e| KeyError::Keyring(format!("failed to create keyring entry: {}", e)))
    }
}

impl KeySlot for KeyringKeySlot {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Option<Zeroizing<Vec<u8>>>, KeyError> {
        match self.entry()?.get_password() {
            Ok(encoded) => {
                let encoded = Zeroizing::new(encoded);
                decode_raw(&encoded).map(Some)
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyError::Keyring(format!(
                "failed to retrieve encryption key: {}",
                e
            ))),
        }
    }

    fn store(&self, raw: &[u8]) -> Result<(), KeyError> {
        let encoded = encode_raw(raw);
        self.entry()?
            .set_password(&encoded)
            .map_err(|e| KeyError::Keyring(format!("failed to store encryption key: {}", e)))?;
        tracing::debug!(slot = %self.name, "Encryption key stored in platform keyring");
        Ok(())
    }
}

// ─── Memory Slot ─────────────────────────────────────────────────────────────

/// Volatile key slot. Counts writes so callers can verify the key was
/// persisted exactly once.
pub struct MemoryKeySlot {
    name: String,
    raw: Mutex<Option<Zeroizing<Vec<u8>>>>,
    writes: AtomicUsize,
}

impl MemoryKeySlot {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_KEY_SLOT.to_string(),
            raw: Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    /// Create a slot pre-loaded with raw key bytes (not necessarily valid).
    pub fn with_raw(raw: Vec<u8>) -> Self {
        let slot = Self::new();
        *slot.raw.lock() = Some(Zeroizing::new(raw));
        slot
    }

    /// Number of writes seen so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryKeySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySlot for MemoryKeySlot {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Option<Zeroizing<Vec<u8>>>, KeyError> {
        Ok(self.raw.lock().clone())
    }

    fn store(&self, raw: &[u8]) -> Result<(), KeyError> {
        *self.raw.lock() = Some(Zeroizing::new(raw.to_vec()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn store_if_absent(&self, raw: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let mut slot = self.raw.lock();
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        *slot = Some(Zeroizing::new(raw.to_vec()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(raw.to_vec()))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
