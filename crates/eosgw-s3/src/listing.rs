//! S3 listing emulation over directory traversal
//!
//! The namespace can only enumerate a directory (one level or the whole
//! subtree), optionally filtered by leaf-name prefix. S3 listings are
//! rebuilt from that: the requested prefix picks the directory to walk,
//! entries are turned into bucket-relative keys, hidden entries are dropped,
//! and the result is sorted and paged by key.
//!
//! The walk itself is not bounded: a recursive listing streams the whole
//! subtree below the prefix. Only the page window is buffered, so memory
//! stays proportional to `max_keys` while time grows with the subtree.

use crate::xml::{CommonPrefix, ObjectContent, Owner, STORAGE_CLASS_STANDARD, format_timestamp};
use eosgw_client::RemoteNode;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Marker of version-history folders
pub const VERSION_FOLDER_MARKER: &str = ".sys.v#.";
/// Marker of in-flight atomic upload files
pub const ATOMIC_FILE_MARKER: &str = ".sys.a#";

/// Whether `path` is, or lies below, a hidden resource
#[must_use]
pub fn is_hidden(path: &str) -> bool {
    path.contains(VERSION_FOLDER_MARKER) || path.contains(ATOMIC_FILE_MARKER)
}

/// Split an S3 prefix at its last `/`.
///
/// The head (including the `/`) names a directory below the bucket, the
/// tail is a leaf-name prefix inside it.
#[must_use]
pub fn split_prefix(prefix: &str) -> (&str, &str) {
    match prefix.rfind('/') {
        Some(i) => prefix.split_at(i + 1),
        None => ("", prefix),
    }
}

/// Directory to walk for `head` below `bucket_path`
#[must_use]
pub fn listing_dir(bucket_path: &str, head: &str) -> String {
    let head = head.trim_matches('/');
    let base = bucket_path.trim_end_matches('/');
    if head.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{head}")
    }
}

/// Key of `path` relative to the bucket, `None` if outside of it
#[must_use]
pub fn relative_key<'a>(bucket_path: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(bucket_path.trim_end_matches('/'))?;
    let key = rest.strip_prefix('/')?.trim_end_matches('/');
    (!key.is_empty()).then_some(key)
}

/// An object in a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub node: RemoteNode,
}

impl ObjectEntry {
    #[must_use]
    pub fn to_content(&self) -> ObjectContent {
        ObjectContent {
            key: self.key.clone(),
            last_modified: format_timestamp(&self.node.mtime),
            etag: self.node.etag.clone(),
            size: self.node.size,
            storage_class: STORAGE_CLASS_STANDARD.to_string(),
            owner: Some(Owner::new(self.node.uid.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Entry {
    Object(Box<ObjectEntry>),
    Prefix,
}

/// One page of a listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Last key or prefix of the page, when more entries remain
    pub next_marker: Option<String>,
}

impl Page {
    #[must_use]
    pub fn contents_xml(&self) -> Vec<ObjectContent> {
        self.contents.iter().map(ObjectEntry::to_content).collect()
    }

    #[must_use]
    pub fn common_prefixes_xml(&self) -> Vec<CommonPrefix> {
        self.common_prefixes
            .iter()
            .map(|prefix| CommonPrefix {
                prefix: prefix.clone(),
            })
            .collect()
    }

    /// Number of keys and prefixes in the page
    #[must_use]
    pub fn key_count(&self) -> u32 {
        u32::try_from(self.contents.len() + self.common_prefixes.len()).unwrap_or(u32::MAX)
    }
}

/// Accumulates namespace entries into S3 keys
#[derive(Debug)]
pub struct Collector<'a> {
    bucket_path: &'a str,
    prefix: &'a str,
    delimited: bool,
    marker: Option<&'a str>,
    max_keys: u32,
    entries: BTreeMap<String, Entry>,
}

impl<'a> Collector<'a> {
    /// `delimited` groups directories into common prefixes; otherwise only
    /// files are kept.
    #[must_use]
    pub const fn new(bucket_path: &'a str, prefix: &'a str, delimited: bool) -> Self {
        Self {
            bucket_path,
            prefix,
            delimited,
            marker: None,
            max_keys: u32::MAX,
            entries: BTreeMap::new(),
        }
    }

    /// Page to produce: entries strictly after `marker`, at most `max_keys`
    #[must_use]
    pub fn window(mut self, marker: Option<&'a str>, max_keys: u32) -> Self {
        self.marker = marker;
        self.max_keys = max_keys;
        self
    }

    fn insert(&mut self, key: String, entry: Entry) {
        if self.marker.is_some_and(|marker| key.as_str() <= marker) {
            return;
        }
        self.entries.insert(key, entry);
        // one entry past the page tells whether it is truncated
        let window =
            usize::try_from(self.max_keys).map_or(usize::MAX, |n| n.saturating_add(1));
        if self.entries.len() > window {
            self.entries.pop_last();
        }
    }

    pub fn push(&mut self, node: RemoteNode) {
        let Some(key) = relative_key(self.bucket_path, &node.path) else {
            return;
        };
        if is_hidden(key) {
            return;
        }

        if node.is_container() {
            if !self.delimited {
                return;
            }
            let prefix = format!("{key}/");
            if prefix.starts_with(self.prefix) {
                self.insert(prefix, Entry::Prefix);
            }
        } else if key.starts_with(self.prefix) {
            let key = key.to_string();
            self.insert(key.clone(), Entry::Object(Box::new(ObjectEntry { key, node })));
        }
    }

    /// The page selected by [`Collector::window`]
    #[must_use]
    pub fn finish(self) -> Page {
        let lower = self.marker.map_or(Bound::Unbounded, Bound::Excluded);
        let mut remaining = self
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .peekable();

        let mut page = Page::default();
        let mut last = None;
        for _ in 0..self.max_keys {
            let Some((key, entry)) = remaining.next() else {
                break;
            };
            match entry {
                Entry::Object(object) => page.contents.push(object.as_ref().clone()),
                Entry::Prefix => page.common_prefixes.push(key.clone()),
            }
            last = Some(key);
        }

        page.is_truncated = remaining.peek().is_some();
        if page.is_truncated {
            page.next_marker = last.cloned();
        }
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use eosgw_client::NodeKind;

    const BUCKET: &str = "/eos/user/a/bucket";

    fn node(kind: NodeKind, path: &str) -> RemoteNode {
        RemoteNode {
            kind,
            path: path.to_string(),
            size: 3,
            uid: 1000,
            gid: 100,
            mtime: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            etag: "\"e\"".to_string(),
            children: 0,
        }
    }

    fn file(rel: &str) -> RemoteNode {
        node(NodeKind::File, &format!("{BUCKET}/{rel}"))
    }

    fn dir(rel: &str) -> RemoteNode {
        node(NodeKind::Container, &format!("{BUCKET}/{rel}"))
    }

    fn keys(page: &Page) -> Vec<&str> {
        page.contents.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn test_split_prefix() {
        assert_eq!(split_prefix("obj"), ("", "obj"));
        assert_eq!(split_prefix("obj/"), ("obj/", ""));
        assert_eq!(split_prefix("nested/deep/obj"), ("nested/deep/", "obj"));
        assert_eq!(split_prefix(""), ("", ""));
    }

    #[test]
    fn test_listing_dir() {
        assert_eq!(listing_dir(BUCKET, ""), BUCKET);
        assert_eq!(listing_dir(BUCKET, "nested/deep/"), format!("{BUCKET}/nested/deep"));
        assert_eq!(listing_dir("/eos/b/", "x/"), "/eos/b/x");
    }

    #[test]
    fn test_relative_key() {
        assert_eq!(relative_key(BUCKET, &format!("{BUCKET}/a/x")), Some("a/x"));
        assert_eq!(relative_key(BUCKET, &format!("{BUCKET}/a/")), Some("a"));
        assert_eq!(relative_key(BUCKET, BUCKET), None);
        assert_eq!(relative_key(BUCKET, "/eos/user/a/bucket2/x"), None);
        assert_eq!(relative_key(BUCKET, "/eos/other"), None);
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(".sys.v#.report.pdf"));
        assert!(is_hidden("docs/.sys.v#.report.pdf/1700000000.abc"));
        assert!(is_hidden("docs/.sys.a#.upload.tmp"));
        assert!(!is_hidden("docs/report.pdf"));
        assert!(!is_hidden("docs/sys.v.report"));
    }

    #[test]
    fn test_delimited_grouping() {
        let mut collector = Collector::new(BUCKET, "", true);
        collector.push(dir("a"));
        collector.push(dir("a"));
        collector.push(file("b"));
        let page = collector.finish();

        assert_eq!(page.common_prefixes, vec!["a/"]);
        assert_eq!(keys(&page), vec!["b"]);
        assert!(!page.is_truncated);
        assert_eq!(page.key_count(), 2);
    }

    #[test]
    fn test_recursive_files_only() {
        let mut collector = Collector::new(BUCKET, "", false);
        collector.push(dir("a"));
        collector.push(file("a/y"));
        collector.push(file("b"));
        collector.push(file("a/x"));
        let page = collector.finish();

        assert!(page.common_prefixes.is_empty());
        assert_eq!(keys(&page), vec!["a/x", "a/y", "b"]);
    }

    #[test]
    fn test_hidden_entries_dropped() {
        for delimited in [true, false] {
            let mut collector = Collector::new(BUCKET, "", delimited);
            collector.push(dir(".sys.v#.b"));
            collector.push(file(".sys.v#.b/1700000000.1"));
            collector.push(file("a/.sys.a#.x"));
            collector.push(file("b"));
            let page = collector.finish();

            assert_eq!(keys(&page), vec!["b"]);
            assert!(page.common_prefixes.is_empty());
        }
    }

    #[test]
    fn test_prefix_recheck() {
        let mut collector = Collector::new(BUCKET, "a/ph", false);
        collector.push(file("a/photos/1.jpg"));
        collector.push(file("a/phone.txt"));
        collector.push(file("a/notes.txt"));
        let page = collector.finish();
        assert_eq!(keys(&page), vec!["a/phone.txt", "a/photos/1.jpg"]);

        let mut collector = Collector::new(BUCKET, "a/ph", true);
        collector.push(dir("a/photos"));
        collector.push(dir("a/music"));
        let page = collector.finish();
        assert_eq!(page.common_prefixes, vec!["a/photos/"]);
    }

    fn walk(marker: Option<&str>, max_keys: u32) -> Page {
        let mut collector = Collector::new(BUCKET, "", true).window(marker, max_keys);
        collector.push(file("c"));
        collector.push(dir("b"));
        collector.push(file("a"));
        collector.push(dir("d"));
        collector.finish()
    }

    #[test]
    fn test_pagination_interleaves_prefixes() {
        let first = walk(None, 2);
        assert_eq!(keys(&first), vec!["a"]);
        assert_eq!(first.common_prefixes, vec!["b/"]);
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("b/"));

        let second = walk(first.next_marker.as_deref(), 2);
        assert_eq!(keys(&second), vec!["c"]);
        assert_eq!(second.common_prefixes, vec!["d/"]);
        assert!(!second.is_truncated);
        assert_eq!(second.next_marker, None);
    }

    #[test]
    fn test_window_bounds_buffer() {
        let mut collector = Collector::new(BUCKET, "", false).window(Some("k010"), 3);
        for i in (0..100).rev() {
            collector.push(file(&format!("k{i:03}")));
            assert!(collector.entries.len() <= 4);
        }
        let page = collector.finish();
        assert_eq!(keys(&page), vec!["k011", "k012", "k013"]);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("k013"));
    }

    #[test]
    fn test_zero_max_keys() {
        let mut collector = Collector::new(BUCKET, "", false).window(None, 0);
        collector.push(file("a"));
        let page = collector.finish();
        assert!(page.contents.is_empty());
        assert!(page.is_truncated);
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn test_to_content() {
        let entry = ObjectEntry {
            key: "a/x".to_string(),
            node: file("a/x"),
        };
        let content = entry.to_content();
        assert_eq!(content.key, "a/x");
        assert_eq!(content.size, 3);
        assert_eq!(content.storage_class, "STANDARD");
        assert_eq!(content.owner.unwrap().id, "1000");
        assert_eq!(content.last_modified, "2023-11-14T22:13:20.000Z");
    }
}
