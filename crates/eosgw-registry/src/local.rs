//! On-disk registry driver
//!
//! Layout under the base folder:
//!
//! ```text
//! buckets/<name>          JSON-encoded bucket
//! users/<uid>/<name>      empty marker, one per assignment
//! users/<uid>/.metadata   JSON {"default_bucket_path": ...}
//! ```

use crate::BucketRegistry;
use crate::error::{RegistryError, Result};
use eosgw_common::Bucket;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

const BUCKETS_FOLDER: &str = "buckets";
const USERS_FOLDER: &str = "users";
const METADATA_FILE: &str = ".metadata";

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_bucket_path: Option<String>,
}

/// Registry stored as a directory tree
pub struct LocalRegistry {
    base: PathBuf,
    lock: RwLock<()>,
    // Keeps an ephemeral base folder alive for the registry's lifetime
    _temp: Option<TempDir>,
}

impl LocalRegistry {
    /// Open (or initialize) a registry rooted at `folder`.
    ///
    /// An empty path selects a fresh temporary directory, removed when the
    /// registry is dropped.
    pub fn open(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref();
        let (base, temp) = if folder.as_os_str().is_empty() {
            let temp = tempfile::Builder::new().prefix("eosgw").tempdir()?;
            (temp.path().to_path_buf(), Some(temp))
        } else {
            (folder.to_path_buf(), None)
        };

        fs::create_dir_all(base.join(BUCKETS_FOLDER))?;
        fs::create_dir_all(base.join(USERS_FOLDER))?;
        debug!("Opened local registry at {}", base.display());

        Ok(Self {
            base,
            lock: RwLock::new(()),
            _temp: temp,
        })
    }

    /// Base folder of the registry
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn bucket_file(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.base.join(BUCKETS_FOLDER).join(name))
    }

    fn user_folder(&self, uid: u64) -> PathBuf {
        self.base.join(USERS_FOLDER).join(uid.to_string())
    }

    fn metadata_file(&self, uid: u64) -> PathBuf {
        self.user_folder(uid).join(METADATA_FILE)
    }

    fn read_bucket(&self, name: &str) -> Result<Bucket> {
        let data = fs::read(self.bucket_file(name)?).map_err(|e| not_found_or(e, name))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn read_metadata(&self, uid: u64) -> Result<UserMetadata> {
        match fs::read(self.metadata_file(uid)) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(UserMetadata::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Dot-files are never buckets: user metadata and leftovers of
/// interrupted atomic writes
fn is_hidden_entry(entry: &fs::DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().starts_with(b".")
}

impl BucketRegistry for LocalRegistry {
    fn create_bucket(&self, bucket: Bucket) -> Result<()> {
        let path = self.bucket_file(&bucket.name)?;
        let _guard = self.lock.write();
        if path.exists() {
            return Err(RegistryError::AlreadyExists(bucket.name));
        }
        write_atomic(&path, &serde_json::to_vec(&bucket)?)
    }

    fn get_bucket(&self, name: &str) -> Result<Bucket> {
        let _guard = self.lock.read();
        self.read_bucket(name)
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        let path = self.bucket_file(name)?;
        let _guard = self.lock.write();
        fs::remove_file(&path).map_err(|e| not_found_or(e, name))?;

        for entry in fs::read_dir(self.base.join(USERS_FOLDER))? {
            let marker = entry?.path().join(name);
            match fs::remove_file(&marker) {
                Ok(()) => debug!("Dropped assignment {}", marker.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let _guard = self.lock.read();
        let mut buckets = Vec::new();
        for entry in fs::read_dir(self.base.join(BUCKETS_FOLDER))? {
            let entry = entry?;
            if is_hidden_entry(&entry) || !entry.file_type()?.is_file() {
                continue;
            }
            let data = fs::read(entry.path())?;
            buckets.push(serde_json::from_slice::<Bucket>(&data)?);
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    fn assign_bucket(&self, name: &str, uid: u64) -> Result<()> {
        let bucket = self.bucket_file(name)?;
        let _guard = self.lock.write();
        if !bucket.is_file() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        let folder = self.user_folder(uid);
        fs::create_dir_all(&folder)?;
        fs::File::create(folder.join(name))?;
        Ok(())
    }

    fn unassign_bucket(&self, name: &str, uid: u64) -> Result<()> {
        validate_name(name)?;
        let _guard = self.lock.write();
        match fs::remove_file(self.user_folder(uid).join(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn is_assigned(&self, name: &str, uid: u64) -> Result<bool> {
        validate_name(name)?;
        let _guard = self.lock.read();
        Ok(self.user_folder(uid).join(name).is_file())
    }

    fn list_buckets_by_user(&self, uid: u64) -> Result<Vec<String>> {
        let _guard = self.lock.read();
        let entries = match fs::read_dir(self.user_folder(uid)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !is_hidden_entry(&entry) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn default_bucket_path(&self, uid: u64) -> Result<Option<String>> {
        let _guard = self.lock.read();
        Ok(self
            .read_metadata(uid)?
            .default_bucket_path
            .filter(|path| !path.is_empty()))
    }

    fn set_default_bucket_path(&self, uid: u64, path: &str) -> Result<()> {
        let _guard = self.lock.write();
        let mut metadata = self.read_metadata(uid)?;
        metadata.default_bucket_path = Some(path.to_string());

        fs::create_dir_all(self.user_folder(uid))?;
        write_atomic(&self.metadata_file(uid), &serde_json::to_vec(&metadata)?)
    }
}

/// A bucket name must be usable as a single file name
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn not_found_or(err: io::Error, name: &str) -> RegistryError {
    if err.kind() == io::ErrorKind::NotFound {
        RegistryError::NotFound(name.to_string())
    } else {
        err.into()
    }
}

/// Write through a temporary file in the same folder, then rename
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
