//! Normalized view of remote namespace entries

use chrono::{DateTime, Utc};
use eosgw_proto::rpc::{MdResponse, Time, Type};

/// Kind of a namespace entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Container,
}

/// A file or container as reported by the metadata service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteNode {
    pub kind: NodeKind,
    /// Absolute path, without trailing `/` (except for the root)
    pub path: String,
    pub size: u64,
    pub uid: u64,
    pub gid: u64,
    pub mtime: DateTime<Utc>,
    pub etag: String,
    /// Number of direct files plus containers (0 for files)
    pub children: u64,
}

impl RemoteNode {
    /// Normalize a metadata response.
    ///
    /// Returns `None` when the body matching the declared type is missing.
    #[must_use]
    pub fn from_response(response: MdResponse) -> Option<Self> {
        match Type::try_from(response.r#type).ok()? {
            Type::Container => {
                let cmd = response.cmd?;
                Some(Self {
                    kind: NodeKind::Container,
                    path: normalize_path(&cmd.path),
                    size: u64::try_from(cmd.tree_size).unwrap_or(0),
                    uid: cmd.uid,
                    gid: cmd.gid,
                    mtime: to_datetime(cmd.mtime),
                    etag: cmd.etag,
                    children: cmd.files.saturating_add(cmd.containers),
                })
            }
            Type::File => {
                let fmd = response.fmd?;
                Some(Self {
                    kind: NodeKind::File,
                    path: normalize_path(&fmd.path),
                    size: fmd.size,
                    uid: fmd.uid,
                    gid: fmd.gid,
                    mtime: to_datetime(fmd.mtime),
                    etag: fmd.etag,
                    children: 0,
                })
            }
            Type::Listing | Type::Stat => None,
        }
    }

    #[must_use]
    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Last path segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Path without trailing `/`; the root stays `/`
pub(crate) fn normalize_path(raw: &[u8]) -> String {
    let path = String::from_utf8_lossy(raw);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn to_datetime(time: Option<Time>) -> DateTime<Utc> {
    time.and_then(|t| {
        let secs = i64::try_from(t.sec).ok()?;
        let nanos = u32::try_from(t.n_sec).ok()?;
        DateTime::from_timestamp(secs, nanos)
    })
    .unwrap_or_default()
}

/// Filters for a directory listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilters {
    /// Only entries whose name starts with this prefix
    pub name_prefix: Option<String>,
    /// Descend below the direct children
    pub recursive: bool,
    /// Depth bound for recursive listings (unbounded when `None`)
    pub max_depth: Option<u64>,
}

impl ListFilters {
    /// Direct children only
    #[must_use]
    pub fn shallow() -> Self {
        Self::default()
    }

    /// The whole subtree
    #[must_use]
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.name_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Depth sent on the wire
    pub(crate) fn wire_depth(&self) -> u64 {
        if self.recursive {
            self.max_depth.unwrap_or(u64::MAX)
        } else {
            1
        }
    }

    /// Anchored filename regex sent on the wire
    pub(crate) fn wire_regex(&self) -> Option<String> {
        self.name_prefix
            .as_deref()
            .map(|prefix| format!("^{}", regex::escape(prefix)))
    }
}
