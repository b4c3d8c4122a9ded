//! Core types shared by the clients, the registry and the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username sent when the uid has no entry in the local user database
pub const UNKNOWN_USER: &str = "<unknown>";

/// The remote identity a single request is performed as
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: u64,
    pub gid: u64,
}

impl Identity {
    #[must_use]
    pub const fn new(uid: u64, gid: u64) -> Self {
        Self { uid, gid }
    }

    /// Resolve the username for this uid from the local user database.
    ///
    /// Returns [`UNKNOWN_USER`] when the uid is absent or the lookup fails.
    #[must_use]
    pub fn username(&self) -> String {
        let Ok(raw) = u32::try_from(self.uid) else {
            return UNKNOWN_USER.to_string();
        };
        match nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(raw)) {
            Ok(Some(user)) => user.name,
            _ => UNKNOWN_USER.to_string(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// A registered bucket and its backing directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket name (unique, immutable)
    pub name: String,
    /// Absolute path of the backing directory
    pub path: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Bucket {
    /// Create a bucket entry stamped with the current time
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            created_at: Utc::now(),
        }
    }

    /// Compose the backing path of a bucket created under `parent`
    #[must_use]
    pub fn backing_path(parent: &str, name: &str) -> String {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }

    /// Absolute path of `key` inside this bucket
    #[must_use]
    pub fn object_path(&self, key: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), key.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::new(1000, 100).to_string(), "1000:100");
    }

    #[test]
    fn test_username_root() {
        assert_eq!(Identity::new(0, 0).username(), "root");
    }

    #[test]
    fn test_username_unknown() {
        assert_eq!(Identity::new(u64::from(u32::MAX) - 7, 0).username(), UNKNOWN_USER);
        assert_eq!(Identity::new(u64::MAX, 0).username(), UNKNOWN_USER);
    }

    #[test]
    fn test_bucket_paths() {
        assert_eq!(Bucket::backing_path("/eos/user/a/", "photos"), "/eos/user/a/photos");

        let bucket = Bucket::new("photos", "/eos/user/a/photos");
        assert_eq!(bucket.object_path("2024/img.png"), "/eos/user/a/photos/2024/img.png");
        assert_eq!(bucket.object_path("/x"), "/eos/user/a/photos/x");
    }

    #[test]
    fn test_bucket_json() {
        let bucket = Bucket::new("b", "/eos/b");
        let json = serde_json::to_string(&bucket).unwrap();
        let parsed: Bucket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bucket);
    }
}
