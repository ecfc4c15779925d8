//! File-backed keyed record storage.
//!
//! A generic persistent mapping from an opaque string key to a record, one
//! file per key under a namespace directory. Writes land in a temp file in
//! the same directory and are renamed over the target, so a reader observes
//! either the old or the new record in full, never a partial write. Rename
//! is the atomic primitive; there are no locks, and access to different keys
//! never contends.
//!
//! Keys are hex-encoded for the filename so arbitrary ticket and token id
//! strings stay filesystem-safe.

use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use super::codec;
use super::error::SessionError;

/// A persistent `key -> record` map, generic over the record type.
pub struct FileRecordHandler<R> {
    dir: PathBuf,
    _record: PhantomData<R>,
}

impl<R> FileRecordHandler<R>
where
    R: Serialize + DeserializeOwned,
{
    /// A handler for one namespace under the store root. No I/O happens
    /// until [`prepare`](Self::prepare).
    pub fn new(root: &Path, namespace: &str) -> Self {
        Self {
            dir: root.join(namespace),
            _record: PhantomData,
        }
    }

    /// Create the namespace directory. Idempotent.
    pub fn prepare(&self) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).map_err(SessionError::Init)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(key))
    }

    /// Create or overwrite the entry for `key`, wholesale.
    pub fn store(&self, key: &str, record: &R) -> Result<(), SessionError> {
        if key.is_empty() {
            return Err(SessionError::Persistence(std::io::Error::new(
                ErrorKind::InvalidInput,
                "empty record key",
            )));
        }

        let bytes = codec::encode(record)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(SessionError::Persistence)?;
        tmp.write_all(&bytes).map_err(SessionError::Persistence)?;
        tmp.persist(self.entry_path(key))
            .map_err(|e| SessionError::Persistence(e.error))?;

        Ok(())
    }

    /// The current record for `key`, or `None` when no entry exists.
    ///
    /// A record that no longer decodes is reported as `None` so the read
    /// path keeps working, but logged as an error: that is storage
    /// corruption, not normal absence.
    pub fn get(&self, key: &str) -> Result<Option<R>, SessionError> {
        if key.is_empty() {
            return Ok(None);
        }

        let bytes = match fs::read(self.entry_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Storage(e)),
        };

        match codec::decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                error!(key, error = %e, "stored record does not decode, treating as absent");
                Ok(None)
            }
        }
    }

    /// Replace the entry for `key` with a new record. Replacing a key that
    /// has no entry is not an error; it behaves as [`store`](Self::store).
    pub fn replace(&self, key: &str, record: &R) -> Result<(), SessionError> {
        self.store(key, record)
    }

    /// Delete the entry for `key`, reporting whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, SessionError> {
        if key.is_empty() {
            return Ok(false);
        }
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Storage(e)),
        }
    }

    /// All `(key, record)` pairs in the namespace.
    ///
    /// Filenames that do not decode back to a key (e.g. a temp file left by
    /// a crashed write) are skipped quietly; records that do not decode are
    /// skipped loudly.
    pub fn entries(&self) -> Result<Vec<(String, R)>, SessionError> {
        let mut entries = Vec::new();

        for dir_entry in fs::read_dir(&self.dir).map_err(SessionError::Storage)? {
            let dir_entry = dir_entry.map_err(SessionError::Storage)?;
            let file_name = dir_entry.file_name();
            let file_name = file_name.to_string_lossy();

            let key = match hex::decode(file_name.as_ref())
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok())
            {
                Some(key) => key,
                None => {
                    debug!(file = %file_name, "skipping non-record file in namespace");
                    continue;
                }
            };

            let bytes = match fs::read(dir_entry.path()) {
                Ok(bytes) => bytes,
                // entry pruned or replaced under our feet; skip it
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(SessionError::Storage(e)),
            };

            match codec::decode(&bytes) {
                Ok(record) => entries.push((key, record)),
                Err(e) => {
                    error!(key, error = %e, "stored record does not decode, skipping");
                }
            }
        }

        Ok(entries)
    }
}
