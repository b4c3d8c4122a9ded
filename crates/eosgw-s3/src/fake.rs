//! In-memory namespace and data plane for backend tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use eosgw_client::{
    ClientError, DataPlane, Download, ListFilters, Namespace, NodeKind, NodeStream, RemoteNode,
    Result, UploadStream,
};
use eosgw_common::Identity;
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
struct Entry {
    kind: NodeKind,
    uid: u64,
    gid: u64,
    data: Bytes,
}

/// A tree of files and directories shared by both traits
#[derive(Default)]
pub struct FakeEos {
    entries: Mutex<BTreeMap<String, Entry>>,
    pub fail_mkdir: AtomicBool,
    pub hide_length: AtomicBool,
    /// (operation, path, uid) of every mutating call
    pub calls: Mutex<Vec<(&'static str, String, u64)>>,
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

impl FakeEos {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.insert("/", NodeKind::Container, Identity::new(0, 0), Bytes::new());
        fake
    }

    fn insert(&self, path: &str, kind: NodeKind, who: Identity, data: Bytes) {
        self.entries.lock().insert(
            path.to_string(),
            Entry {
                kind,
                uid: who.uid,
                gid: who.gid,
                data,
            },
        );
    }

    /// Create a directory and its parents
    pub fn add_dir(&self, path: &str, who: Identity) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if !self.exists(&current) {
                self.insert(&current, NodeKind::Container, who, Bytes::new());
            }
        }
    }

    /// Create a file (and its parent directories)
    pub fn add_file(&self, path: &str, who: Identity, data: &[u8]) {
        self.add_dir(parent(path), who);
        self.insert(path, NodeKind::File, who, Bytes::copy_from_slice(data));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn data(&self, path: &str) -> Option<Bytes> {
        self.entries.lock().get(path).map(|e| e.data.clone())
    }

    pub fn calls(&self, op: &str) -> Vec<(String, u64)> {
        self.calls
            .lock()
            .iter()
            .filter(|(name, _, _)| *name == op)
            .map(|(_, path, uid)| (path.clone(), *uid))
            .collect()
    }

    fn record(&self, op: &'static str, path: &str, who: Identity) {
        self.calls.lock().push((op, path.to_string(), who.uid));
    }

    fn node(&self, path: &str, entry: &Entry) -> RemoteNode {
        let children = if entry.kind == NodeKind::Container {
            self.children(path).len() as u64
        } else {
            0
        };
        RemoteNode {
            kind: entry.kind,
            path: path.to_string(),
            size: entry.data.len() as u64,
            uid: entry.uid,
            gid: entry.gid,
            mtime: Utc::now(),
            etag: format!("\"{:x}\"", md5::compute(&entry.data)),
            children,
        }
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.descendants(dir)
            .into_iter()
            .filter(|path| parent(path) == dir)
            .collect()
    }

    fn descendants(&self, dir: &str) -> Vec<String> {
        let base = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.entries
            .lock()
            .keys()
            .filter(|path| path.starts_with(&base) && path.as_str() != dir)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Namespace for FakeEos {
    async fn stat(&self, _who: Identity, path: &str) -> Result<RemoteNode> {
        let entry = self.entries.lock().get(path).cloned();
        entry
            .map(|entry| self.node(path, &entry))
            .ok_or_else(|| ClientError::not_found(path))
    }

    async fn list(&self, _who: Identity, dir: &str, filters: &ListFilters) -> Result<NodeStream> {
        if !self.exists(dir) {
            return Err(ClientError::Remote {
                code: 2,
                message: format!("{dir}: no such directory"),
            });
        }
        let paths = if filters.recursive {
            self.descendants(dir)
        } else {
            self.children(dir)
        };

        let mut nodes = Vec::new();
        for path in paths {
            let name = path.rsplit('/').next().unwrap_or_default();
            if let Some(prefix) = &filters.name_prefix
                && !name.starts_with(prefix.as_str())
            {
                continue;
            }
            let entry = self.entries.lock().get(&path).cloned();
            if let Some(entry) = entry {
                nodes.push(Ok(self.node(&path, &entry)));
            }
        }
        Ok(futures::stream::iter(nodes).boxed())
    }

    async fn mkdir(&self, who: Identity, path: &str, _mode: u32, recursive: bool) -> Result<()> {
        self.record("mkdir", path, who);
        if self.fail_mkdir.load(Ordering::SeqCst) {
            return Err(ClientError::Remote {
                code: 5,
                message: "mkdir failed".to_string(),
            });
        }
        if self.exists(path) {
            return Err(ClientError::Remote {
                code: 17,
                message: format!("{path}: file exists"),
            });
        }
        if !recursive && !self.exists(parent(path)) {
            return Err(ClientError::Remote {
                code: 2,
                message: format!("{path}: no parent"),
            });
        }
        self.add_dir(path, who);
        Ok(())
    }

    async fn rmdir(&self, who: Identity, path: &str) -> Result<()> {
        self.record("rmdir", path, who);
        if !self.children(path).is_empty() {
            return Err(ClientError::Remote {
                code: 39,
                message: format!("{path}: directory not empty"),
            });
        }
        self.entries
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(path))
    }

    async fn remove(&self, who: Identity, path: &str, recursive: bool) -> Result<()> {
        self.record("remove", path, who);
        if !self.exists(path) {
            return Err(ClientError::not_found(path));
        }
        let below = self.descendants(path);
        if !below.is_empty() && !recursive {
            return Err(ClientError::Remote {
                code: 21,
                message: format!("{path}: is a directory"),
            });
        }
        let mut entries = self.entries.lock();
        for path in below {
            entries.remove(&path);
        }
        entries.remove(path);
        Ok(())
    }
}

#[async_trait]
impl DataPlane for FakeEos {
    async fn download(&self, _who: Identity, path: &str) -> Result<Download> {
        let data = self.data(path).ok_or(ClientError::UnexpectedStatus {
            url: path.to_string(),
            status: 404,
        })?;
        let content_length = if self.hide_length.load(Ordering::SeqCst) {
            None
        } else {
            Some(data.len() as u64)
        };
        Ok(Download {
            stream: futures::stream::iter(vec![Ok(data)]).boxed(),
            content_length,
        })
    }

    async fn upload(&self, who: Identity, path: &str, body: UploadStream, length: u64) -> Result<()> {
        if !self.exists(parent(path)) {
            return Err(ClientError::UnexpectedStatus {
                url: path.to_string(),
                status: 404,
            });
        }
        let chunks: Vec<Bytes> = body
            .try_collect()
            .await
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let data: Vec<u8> = chunks.concat();
        assert_eq!(data.len() as u64, length, "declared length mismatch");
        self.insert(path, NodeKind::File, who, Bytes::from(data));
        Ok(())
    }
}
