//! File-backed persistence for bootstrap data and the bound secret.
//!
//! Two files under the state directory:
//! - `bootstrap.bin`: the compacted `ssid\0password\0additional\0` blob
//! - `secret.bin`: the key installed by BIND (mode 0600 on unix)
//!
//! Writes go to a temporary file first and are renamed into place, so a
//! crash never leaves a half-written blob. Persisting an empty value
//! removes the file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bstwifi_core::{BIND_KEY_MAX, STORAGE_SIZE};
use tracing::{debug, info};

const DATA_FILE: &str = "bootstrap.bin";
const SECRET_FILE: &str = "secret.bin";

/// Persistent state of the device
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Open (and create if needed) the state directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        info!(dir = %dir.display(), "Opened credential store");
        Ok(Self { dir })
    }

    /// State directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored bootstrap data, if any
    pub fn load_data(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.load(DATA_FILE, STORAGE_SIZE)
    }

    /// Stored shared secret, if any
    pub fn load_secret(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.load(SECRET_FILE, BIND_KEY_MAX)
    }

    /// Replace the bootstrap data. Empty erases it.
    pub fn save_data(&self, blob: &[u8]) -> Result<(), StoreError> {
        self.save(DATA_FILE, blob, STORAGE_SIZE)
    }

    /// Replace the shared secret. Empty erases it.
    pub fn save_secret(&self, key: &[u8]) -> Result<(), StoreError> {
        self.save(SECRET_FILE, key, BIND_KEY_MAX)
    }

    fn load(&self, name: &str, max: usize) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.dir.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        if bytes.len() > max {
            return Err(StoreError::Oversized {
                path,
                size: bytes.len(),
                max,
            });
        }
        debug!(file = name, size = bytes.len(), "Loaded persisted value");
        Ok((!bytes.is_empty()).then_some(bytes))
    }

    fn save(&self, name: &str, bytes: &[u8], max: usize) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        if bytes.len() > max {
            return Err(StoreError::Oversized {
                path,
                size: bytes.len(),
                max,
            });
        }

        if bytes.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(file = name, "Erased persisted value");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StoreError::Io { path, source }),
            };
        }

        let tmp = self.dir.join(format!("{name}.tmp"));
        write_private(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(file = name, size = bytes.len(), "Persisted value");
        Ok(())
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} holds {size} bytes, at most {max} allowed", path.display())]
    Oversized {
        path: PathBuf,
        size: usize,
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("state")).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_loads_nothing() {
        let (_dir, store) = store();
        assert_eq!(store.load_data().unwrap(), None);
        assert_eq!(store.load_secret().unwrap(), None);
    }

    #[test]
    fn save_and_load() {
        let (_dir, store) = store();
        store.save_data(b"WLAN\0pw\0\0").unwrap();
        store.save_secret(b"bound-key").unwrap();

        assert_eq!(store.load_data().unwrap().as_deref(), Some(&b"WLAN\0pw\0\0"[..]));
        assert_eq!(store.load_secret().unwrap().as_deref(), Some(&b"bound-key"[..]));
        assert!(!store.dir().join("bootstrap.bin.tmp").exists());
    }

    #[test]
    fn empty_value_erases() {
        let (_dir, store) = store();
        store.save_secret(b"bound-key").unwrap();
        store.save_secret(b"").unwrap();
        assert_eq!(store.load_secret().unwrap(), None);
        assert!(!store.dir().join("secret.bin").exists());

        // Erasing twice is fine
        store.save_secret(b"").unwrap();
    }

    #[test]
    fn oversized_values_rejected() {
        let (_dir, store) = store();
        let err = store.save_secret(&[1; BIND_KEY_MAX + 1]).unwrap_err();
        assert!(matches!(err, StoreError::Oversized { size: 33, max: 32, .. }));

        fs::write(store.dir().join("bootstrap.bin"), vec![1; STORAGE_SIZE + 1]).unwrap();
        assert!(matches!(
            store.load_data(),
            Err(StoreError::Oversized { .. })
        ));
    }

    #[test]
    fn survives_reopen() {
        let (dir, store) = store();
        store.save_data(b"WLAN\0\0\0").unwrap();
        drop(store);

        let reopened = CredentialStore::open(dir.path().join("state")).unwrap();
        assert_eq!(reopened.load_data().unwrap().as_deref(), Some(&b"WLAN\0\0\0"[..]));
    }

    #[cfg(unix)]
    #[test]
    fn secret_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save_secret(b"bound-key").unwrap();
        let mode = fs::metadata(store.dir().join("secret.bin"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
