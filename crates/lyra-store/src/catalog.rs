//! Space, folder and file metadata.

use futures::future::BoxFuture;

use crate::error::StoreResult;
use crate::model::{
    EntryRef, FileId, FileRecord, FolderId, FolderRecord, Principal, Space, SpaceId, SpaceKind,
    UserId, VersionInfo,
};
use crate::storage::StorageKey;

/// Metadata for a file being created.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub space: SpaceId,
    pub folder: Option<FolderId>,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
    pub storage_key: StorageKey,
    pub created_by: UserId,
}

/// Metadata for new content replacing a file's current version.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
    pub storage_key: StorageKey,
    pub comment: Option<String>,
    pub created_by: UserId,
}

/// Where an entry should end up after a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub space: SpaceId,
    /// `None` places the entry at the space root.
    pub folder: Option<FolderId>,
    pub name: String,
}

/// Persistent catalog of spaces, folders, files and versions.
///
/// Paths passed to the lookup methods are relative to the space root, use
/// `/` as separator and carry no leading or trailing slash. Files and folders
/// share one namespace per parent: implementations reject a create or move
/// whose name is already taken by either kind.
pub trait Catalog: Send + Sync {
    fn space(&self, id: SpaceId) -> BoxFuture<'_, StoreResult<Option<Space>>>;

    /// Spaces of `kind` visible to `principal`.
    fn list_spaces<'a>(
        &'a self,
        principal: &'a Principal,
        kind: SpaceKind,
    ) -> BoxFuture<'a, StoreResult<Vec<Space>>>;

    /// Visible space of `kind` called `name`.
    fn find_space<'a>(
        &'a self,
        principal: &'a Principal,
        kind: SpaceKind,
        name: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Space>>> {
        Box::pin(async move {
            Ok(self
                .list_spaces(principal, kind)
                .await?
                .into_iter()
                .find(|space| space.name == name))
        })
    }

    fn file_by_path<'a>(
        &'a self,
        space: SpaceId,
        path: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<FileRecord>>>;

    fn folder_by_path<'a>(
        &'a self,
        space: SpaceId,
        path: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<FolderRecord>>>;

    /// Folders directly below `parent` (`None` = space root), at most `limit`.
    fn list_folders(
        &self,
        space: SpaceId,
        parent: Option<FolderId>,
        limit: Option<usize>,
    ) -> BoxFuture<'_, StoreResult<Vec<FolderRecord>>>;

    /// Files directly below `folder` (`None` = space root), at most `limit`.
    fn list_files(
        &self,
        space: SpaceId,
        folder: Option<FolderId>,
        limit: Option<usize>,
    ) -> BoxFuture<'_, StoreResult<Vec<FileRecord>>>;

    /// Version history of a file, oldest first.
    fn versions(&self, file: FileId) -> BoxFuture<'_, StoreResult<Vec<VersionInfo>>>;

    fn create_folder<'a>(
        &'a self,
        space: SpaceId,
        parent: Option<FolderId>,
        name: &'a str,
        created_by: UserId,
    ) -> BoxFuture<'a, StoreResult<FolderRecord>>;

    fn create_file(&self, file: NewFile) -> BoxFuture<'_, StoreResult<FileRecord>>;

    /// Record new content as the file's current version.
    fn add_version(
        &self,
        file: FileId,
        version: NewVersion,
    ) -> BoxFuture<'_, StoreResult<FileRecord>>;

    /// Remove a file and return the storage keys of all its versions.
    fn delete_file(&self, file: FileId) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>>;

    /// Remove a folder with everything below it and return the storage keys
    /// of every removed file version.
    fn delete_folder(&self, folder: FolderId) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>>;

    fn move_file(&self, file: FileId, to: Placement) -> BoxFuture<'_, StoreResult<FileRecord>>;

    /// Move a folder with its whole subtree. Moving a folder below itself is
    /// rejected with [`StoreError::InvalidArgument`](crate::StoreError::InvalidArgument).
    fn move_folder(
        &self,
        folder: FolderId,
        to: Placement,
    ) -> BoxFuture<'_, StoreResult<FolderRecord>>;

    /// Move a file or folder to `to`, removing whatever currently holds that
    /// name in the same step. Nothing changes unless the whole move succeeds.
    /// Returns the storage keys of the removed entry.
    fn move_replacing(
        &self,
        entry: EntryRef,
        to: Placement,
    ) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>>;
}
