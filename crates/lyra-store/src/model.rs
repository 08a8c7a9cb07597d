//! Domain records exchanged between the catalog and the protocol layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::storage::StorageKey;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identifier of an authenticated user.
    UserId
);
id_type!(
    /// Identifier of a space.
    SpaceId
);
id_type!(
    /// Identifier of a folder.
    FolderId
);
id_type!(
    /// Identifier of a file.
    FileId
);

/// The authenticated identity performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    /// Administrators bypass space membership checks.
    pub admin: bool,
}

/// The two tenant namespaces exposed below the protocol root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceKind {
    Personal,
    Enterprise,
}

impl SpaceKind {
    pub const ALL: [SpaceKind; 2] = [SpaceKind::Personal, SpaceKind::Enterprise];

    /// URL segment used for this namespace.
    pub fn segment(self) -> &'static str {
        match self {
            SpaceKind::Personal => "personal",
            SpaceKind::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for SpaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(SpaceKind::Personal),
            "enterprise" => Ok(SpaceKind::Enterprise),
            other => Err(format!("unknown space kind '{other}'")),
        }
    }
}

/// What a member may do inside a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceRole {
    Owner,
    Editor,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceMember {
    pub user: UserId,
    pub role: SpaceRole,
}

/// A tenant space: the root of one independent folder tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    pub kind: SpaceKind,
    pub owner: UserId,
    pub members: Vec<SpaceMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Space {
    /// Role of `user` in this space, if any. The owner always has [`SpaceRole::Owner`].
    pub fn role_of(&self, user: UserId) -> Option<SpaceRole> {
        if self.owner == user {
            return Some(SpaceRole::Owner);
        }
        self.members.iter().find(|m| m.user == user).map(|m| m.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: FolderId,
    pub space: SpaceId,
    /// `None` for top-level folders.
    pub parent: Option<FolderId>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub space: SpaceId,
    /// `None` for files at the space root.
    pub folder: Option<FolderId>,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    /// Hex SHA-256 of the current content.
    pub checksum: String,
    /// Where the current content lives in the byte store.
    pub storage_key: StorageKey,
    pub current_version: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a file's version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub number: u32,
    pub size: u64,
    pub checksum: String,
    pub storage_key: StorageKey,
    pub comment: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Opaque handle to the entity behind a namespace node.
///
/// The protocol layer passes it back to the catalog, policy and byte store
/// without interpreting it beyond the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryRef {
    /// The protocol root that lists the namespaces.
    System,
    /// A namespace listing the principal's spaces of one kind.
    Scope(SpaceKind),
    Space(SpaceId),
    Folder { space: SpaceId, folder: FolderId },
    File { space: SpaceId, file: FileId },
}

impl EntryRef {
    /// Space that contains this entry, if it is inside one.
    pub fn space(&self) -> Option<SpaceId> {
        match *self {
            EntryRef::System | EntryRef::Scope(_) => None,
            EntryRef::Space(space)
            | EntryRef::Folder { space, .. }
            | EntryRef::File { space, .. } => Some(space),
        }
    }

    /// Folder that children of this entry would be placed in.
    ///
    /// Returns `None` both for a space root and for anything that cannot hold
    /// children; combine with [`EntryRef::is_container`] to tell them apart.
    pub fn folder(&self) -> Option<FolderId> {
        match *self {
            EntryRef::Folder { folder, .. } => Some(folder),
            _ => None,
        }
    }

    /// True for entries inside which files and folders can be created.
    pub fn is_container(&self) -> bool {
        matches!(self, EntryRef::Space(_) | EntryRef::Folder { .. })
    }
}
