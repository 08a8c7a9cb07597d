//! Namespace nodes as seen by the protocol layer.
//!
//! A [`Resource`] is a snapshot taken while handling one request. It is never
//! cached or shared between requests; "changing" one means building a new
//! value with [`Resource::with_children`] or [`Resource::with_versions`].

use chrono::{DateTime, Utc};
use lyra_store::{EntryRef, FileRecord, FolderRecord, Space, SpaceKind, VersionInfo};

use crate::path::encode_path;

/// Content type reported for collections.
pub const COLLECTION_CONTENT_TYPE: &str = "httpd/unix-directory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A folder inside a space.
    Collection,
    /// A file.
    Leaf,
    /// A space, or a namespace listing spaces.
    SpaceRoot,
    /// The protocol root.
    SystemRoot,
}

/// Summary of a file's version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
    pub current: u32,
    pub count: usize,
    pub latest_comment: Option<String>,
    pub latest_at: Option<DateTime<Utc>>,
}

impl VersionSummary {
    pub fn from_history(current: u32, history: &[VersionInfo]) -> Self {
        let latest = history.iter().max_by_key(|v| v.number);
        Self {
            current,
            count: history.len(),
            latest_comment: latest.and_then(|v| v.comment.clone()),
            latest_at: latest.map(|v| v.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    /// Canonical decoded path.
    pub path: String,
    /// Percent-encoded canonical path, as exposed in responses.
    pub href: String,
    pub kind: ResourceKind,
    pub size: u64,
    pub content_type: Option<String>,
    /// Strong entity tag, quoted.
    pub etag: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub versions: Option<VersionSummary>,
    pub backing: EntryRef,
    children: Option<Vec<Resource>>,
}

impl Resource {
    fn base(name: &str, path: String, kind: ResourceKind, backing: EntryRef) -> Self {
        Self {
            name: name.to_string(),
            href: encode_path(&path),
            path,
            kind,
            size: 0,
            content_type: None,
            etag: None,
            created_at: None,
            modified_at: None,
            versions: None,
            backing,
            children: None,
        }
    }

    pub fn system_root(path: &str) -> Self {
        Self::base("", path.to_string(), ResourceKind::SystemRoot, EntryRef::System)
    }

    /// Placeholder for a namespace (`personal`, `enterprise`).
    pub fn scope_root(kind: SpaceKind, path: String) -> Self {
        Self::base(kind.segment(), path, ResourceKind::SpaceRoot, EntryRef::Scope(kind))
    }

    pub fn space_root(space: &Space, path: String) -> Self {
        Self {
            created_at: Some(space.created_at),
            modified_at: Some(space.updated_at),
            ..Self::base(&space.name, path, ResourceKind::SpaceRoot, EntryRef::Space(space.id))
        }
    }

    pub fn folder(record: &FolderRecord, path: String) -> Self {
        let backing = EntryRef::Folder {
            space: record.space,
            folder: record.id,
        };
        Self {
            created_at: Some(record.created_at),
            modified_at: Some(record.updated_at),
            ..Self::base(&record.name, path, ResourceKind::Collection, backing)
        }
    }

    pub fn file(record: &FileRecord, path: String) -> Self {
        let backing = EntryRef::File {
            space: record.space,
            file: record.id,
        };
        Self {
            size: record.size,
            content_type: Some(record.content_type.clone()),
            etag: Some(format!("\"{}-{}\"", record.checksum, record.current_version)),
            created_at: Some(record.created_at),
            modified_at: Some(record.updated_at),
            ..Self::base(&record.name, path, ResourceKind::Leaf, backing)
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind != ResourceKind::Leaf
    }

    /// Content type as reported by PROPFIND and GET.
    pub fn reported_content_type(&self) -> &str {
        if self.is_collection() {
            COLLECTION_CONTENT_TYPE
        } else {
            self.content_type.as_deref().unwrap_or("application/octet-stream")
        }
    }

    /// Children, if they were loaded.
    pub fn children(&self) -> Option<&[Resource]> {
        self.children.as_deref()
    }

    /// Same node with `children` attached. Leaves never carry children.
    #[must_use]
    pub fn with_children(self, children: Vec<Resource>) -> Self {
        if !self.is_collection() {
            return self;
        }
        Self {
            children: Some(children),
            ..self
        }
    }

    #[must_use]
    pub fn with_versions(self, summary: VersionSummary) -> Self {
        Self {
            versions: Some(summary),
            ..self
        }
    }

    /// Href for listings: collections get a trailing slash.
    pub fn listing_href(&self) -> String {
        if self.is_collection() && !self.href.ends_with('/') {
            format!("{}/", self.href)
        } else {
            self.href.clone()
        }
    }
}
