//! In-memory [`Catalog`] implementation.
//!
//! All state lives behind one `parking_lot::RwLock`. Entries are kept in
//! `BTreeMap`s keyed by id so that listing order is stable (creation order)
//! for a given catalog state.

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::catalog::{Catalog, NewFile, NewVersion, Placement};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    EntryRef, FileId, FileRecord, FolderId, FolderRecord, Principal, Space, SpaceId, SpaceKind,
    SpaceMember, UserId, VersionInfo,
};
use crate::storage::StorageKey;

struct FileEntry {
    record: FileRecord,
    versions: Vec<VersionInfo>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    spaces: BTreeMap<SpaceId, Space>,
    folders: BTreeMap<FolderId, FolderRecord>,
    files: BTreeMap<FileId, FileEntry>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn folder_child(
        &self,
        space: SpaceId,
        parent: Option<FolderId>,
        name: &str,
    ) -> Option<&FolderRecord> {
        self.folders
            .values()
            .find(|f| f.space == space && f.parent == parent && f.name == name)
    }

    fn file_child(
        &self,
        space: SpaceId,
        folder: Option<FolderId>,
        name: &str,
    ) -> Option<&FileEntry> {
        self.files
            .values()
            .find(|f| f.record.space == space && f.record.folder == folder && f.record.name == name)
    }

    /// Walk `path` through folders; returns the target parent and final name.
    fn walk<'p>(&self, space: SpaceId, path: &'p str) -> Option<(Option<FolderId>, &'p str)> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let name = segments.pop()?;
        let mut parent = None;
        for segment in segments {
            parent = Some(self.folder_child(space, parent, segment)?.id);
        }
        Some((parent, name))
    }

    fn ensure_free(&self, space: SpaceId, parent: Option<FolderId>, name: &str) -> StoreResult<()> {
        check_name(name)?;
        if self.folder_child(space, parent, name).is_some()
            || self.file_child(space, parent, name).is_some()
        {
            return Err(StoreError::already_exists(name));
        }
        Ok(())
    }

    fn ensure_parent(&self, space: SpaceId, parent: Option<FolderId>) -> StoreResult<()> {
        if !self.spaces.contains_key(&space) {
            return Err(StoreError::not_found(format!("space {space}")));
        }
        if let Some(parent) = parent {
            match self.folders.get(&parent) {
                Some(folder) if folder.space == space => {}
                _ => return Err(StoreError::not_found(format!("folder {parent}"))),
            }
        }
        Ok(())
    }

    /// Entry currently holding `name` below `parent`.
    fn occupant(&self, space: SpaceId, parent: Option<FolderId>, name: &str) -> Option<EntryRef> {
        if let Some(folder) = self.folder_child(space, parent, name) {
            return Some(EntryRef::Folder {
                space,
                folder: folder.id,
            });
        }
        self.file_child(space, parent, name).map(|entry| EntryRef::File {
            space,
            file: entry.record.id,
        })
    }

    fn remove_file(&mut self, file: FileId) -> StoreResult<Vec<StorageKey>> {
        let entry = self
            .files
            .remove(&file)
            .ok_or_else(|| StoreError::not_found(format!("file {file}")))?;
        Ok(entry.versions.into_iter().map(|v| v.storage_key).collect())
    }

    fn remove_folder(&mut self, folder: FolderId) -> StoreResult<Vec<StorageKey>> {
        if !self.folders.contains_key(&folder) {
            return Err(StoreError::not_found(format!("folder {folder}")));
        }
        let doomed = self.subtree(folder);
        let file_ids: Vec<FileId> = self
            .files
            .values()
            .filter(|f| f.record.folder.is_some_and(|id| doomed.contains(&id)))
            .map(|f| f.record.id)
            .collect();
        let mut keys = Vec::new();
        for id in file_ids {
            if let Some(entry) = self.files.remove(&id) {
                keys.extend(entry.versions.into_iter().map(|v| v.storage_key));
            }
        }
        self.folders.retain(|id, _| !doomed.contains(id));
        debug!(folder = %folder, folders = doomed.len(), blobs = keys.len(), "Deleted folder");
        Ok(keys)
    }

    /// Checks that `file` may be placed at `to`, ignoring whatever occupies the name.
    fn check_file_move(&self, file: FileId, to: &Placement) -> StoreResult<()> {
        if !self.files.contains_key(&file) {
            return Err(StoreError::not_found(format!("file {file}")));
        }
        self.ensure_parent(to.space, to.folder)?;
        check_name(&to.name)
    }

    /// Like [`State::check_file_move`]; returns the folder's subtree.
    fn check_folder_move(
        &self,
        folder: FolderId,
        to: &Placement,
    ) -> StoreResult<HashSet<FolderId>> {
        if !self.folders.contains_key(&folder) {
            return Err(StoreError::not_found(format!("folder {folder}")));
        }
        let subtree = self.subtree(folder);
        if to.folder.is_some_and(|target| subtree.contains(&target)) {
            return Err(StoreError::invalid("cannot move a folder below itself"));
        }
        self.ensure_parent(to.space, to.folder)?;
        check_name(&to.name)?;
        Ok(subtree)
    }

    fn relocate_file(&mut self, file: FileId, to: Placement) -> StoreResult<FileRecord> {
        self.ensure_free(to.space, to.folder, &to.name)?;
        let entry = self
            .files
            .get_mut(&file)
            .ok_or_else(|| StoreError::not_found(format!("file {file}")))?;
        entry.record.space = to.space;
        entry.record.folder = to.folder;
        entry.record.name = to.name;
        entry.record.updated_at = Utc::now();
        Ok(entry.record.clone())
    }

    fn relocate_folder(
        &mut self,
        folder: FolderId,
        subtree: &HashSet<FolderId>,
        to: Placement,
    ) -> StoreResult<FolderRecord> {
        self.ensure_free(to.space, to.folder, &to.name)?;

        // Cross-space moves carry the whole subtree along.
        for id in subtree {
            if let Some(f) = self.folders.get_mut(id) {
                f.space = to.space;
            }
        }
        for entry in self.files.values_mut() {
            if entry.record.folder.is_some_and(|id| subtree.contains(&id)) {
                entry.record.space = to.space;
            }
        }

        let record = self
            .folders
            .get_mut(&folder)
            .ok_or_else(|| StoreError::not_found(format!("folder {folder}")))?;
        record.parent = to.folder;
        record.name = to.name;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// The folder and every folder below it.
    fn subtree(&self, root: FolderId) -> HashSet<FolderId> {
        let mut found = HashSet::from([root]);
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            for folder in self.folders.values() {
                if folder.parent == Some(current) && found.insert(folder.id) {
                    stack.push(folder.id);
                }
            }
        }
        found
    }
}

fn check_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(StoreError::invalid(format!("entry name '{name}'")));
    }
    Ok(())
}

/// Catalog keeping every record in process memory.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a space. Names must be unique per kind and owner.
    pub fn create_space(
        &self,
        name: &str,
        kind: SpaceKind,
        owner: UserId,
        members: Vec<SpaceMember>,
    ) -> StoreResult<Space> {
        let mut state = self.state.write();
        if state
            .spaces
            .values()
            .any(|s| s.kind == kind && s.owner == owner && s.name == name)
        {
            return Err(StoreError::already_exists(format!("space {name}")));
        }
        let now = Utc::now();
        let space = Space {
            id: SpaceId(state.next_id()),
            name: name.to_string(),
            kind,
            owner,
            members,
            created_at: now,
            updated_at: now,
        };
        debug!(space = %space.id, name = %space.name, kind = %kind, "Created space");
        state.spaces.insert(space.id, space.clone());
        Ok(space)
    }

    /// Total number of files across all spaces.
    pub fn file_count(&self) -> usize {
        self.state.read().files.len()
    }

    /// Total number of folders across all spaces.
    pub fn folder_count(&self) -> usize {
        self.state.read().folders.len()
    }
}

fn take_limit<T>(iter: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

impl Catalog for MemoryCatalog {
    fn space(&self, id: SpaceId) -> BoxFuture<'_, StoreResult<Option<Space>>> {
        Box::pin(async move { Ok(self.state.read().spaces.get(&id).cloned()) })
    }

    fn list_spaces<'a>(
        &'a self,
        principal: &'a Principal,
        kind: SpaceKind,
    ) -> BoxFuture<'a, StoreResult<Vec<Space>>> {
        Box::pin(async move {
            let state = self.state.read();
            Ok(state
                .spaces
                .values()
                .filter(|s| s.kind == kind)
                .filter(|s| principal.admin || s.role_of(principal.id).is_some())
                .cloned()
                .collect())
        })
    }

    fn file_by_path<'a>(
        &'a self,
        space: SpaceId,
        path: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<FileRecord>>> {
        Box::pin(async move {
            let state = self.state.read();
            Ok(state
                .walk(space, path)
                .and_then(|(parent, name)| state.file_child(space, parent, name))
                .map(|entry| entry.record.clone()))
        })
    }

    fn folder_by_path<'a>(
        &'a self,
        space: SpaceId,
        path: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<FolderRecord>>> {
        Box::pin(async move {
            let state = self.state.read();
            Ok(state
                .walk(space, path)
                .and_then(|(parent, name)| state.folder_child(space, parent, name))
                .cloned())
        })
    }

    fn list_folders(
        &self,
        space: SpaceId,
        parent: Option<FolderId>,
        limit: Option<usize>,
    ) -> BoxFuture<'_, StoreResult<Vec<FolderRecord>>> {
        Box::pin(async move {
            let state = self.state.read();
            let iter = state
                .folders
                .values()
                .filter(|f| f.space == space && f.parent == parent)
                .cloned();
            Ok(take_limit(iter, limit))
        })
    }

    fn list_files(
        &self,
        space: SpaceId,
        folder: Option<FolderId>,
        limit: Option<usize>,
    ) -> BoxFuture<'_, StoreResult<Vec<FileRecord>>> {
        Box::pin(async move {
            let state = self.state.read();
            let iter = state
                .files
                .values()
                .filter(|f| f.record.space == space && f.record.folder == folder)
                .map(|f| f.record.clone());
            Ok(take_limit(iter, limit))
        })
    }

    fn versions(&self, file: FileId) -> BoxFuture<'_, StoreResult<Vec<VersionInfo>>> {
        Box::pin(async move {
            let state = self.state.read();
            state
                .files
                .get(&file)
                .map(|entry| entry.versions.clone())
                .ok_or_else(|| StoreError::not_found(format!("file {file}")))
        })
    }

    fn create_folder<'a>(
        &'a self,
        space: SpaceId,
        parent: Option<FolderId>,
        name: &'a str,
        _created_by: UserId,
    ) -> BoxFuture<'a, StoreResult<FolderRecord>> {
        Box::pin(async move {
            let mut state = self.state.write();
            state.ensure_parent(space, parent)?;
            state.ensure_free(space, parent, name)?;
            let now = Utc::now();
            let folder = FolderRecord {
                id: FolderId(state.next_id()),
                space,
                parent,
                name: name.to_string(),
                created_at: now,
                updated_at: now,
            };
            state.folders.insert(folder.id, folder.clone());
            Ok(folder)
        })
    }

    fn create_file(&self, file: NewFile) -> BoxFuture<'_, StoreResult<FileRecord>> {
        Box::pin(async move {
            let mut state = self.state.write();
            state.ensure_parent(file.space, file.folder)?;
            state.ensure_free(file.space, file.folder, &file.name)?;
            let now = Utc::now();
            let record = FileRecord {
                id: FileId(state.next_id()),
                space: file.space,
                folder: file.folder,
                name: file.name,
                size: file.size,
                content_type: file.content_type,
                checksum: file.checksum.clone(),
                storage_key: file.storage_key.clone(),
                current_version: 1,
                created_by: file.created_by,
                created_at: now,
                updated_at: now,
            };
            let first = VersionInfo {
                number: 1,
                size: file.size,
                checksum: file.checksum,
                storage_key: file.storage_key,
                comment: None,
                created_by: file.created_by,
                created_at: now,
            };
            state.files.insert(
                record.id,
                FileEntry {
                    record: record.clone(),
                    versions: vec![first],
                },
            );
            Ok(record)
        })
    }

    fn add_version(
        &self,
        file: FileId,
        version: NewVersion,
    ) -> BoxFuture<'_, StoreResult<FileRecord>> {
        Box::pin(async move {
            let mut state = self.state.write();
            let entry = state
                .files
                .get_mut(&file)
                .ok_or_else(|| StoreError::not_found(format!("file {file}")))?;
            let now = Utc::now();
            let number = entry.record.current_version + 1;
            entry.versions.push(VersionInfo {
                number,
                size: version.size,
                checksum: version.checksum.clone(),
                storage_key: version.storage_key.clone(),
                comment: version.comment,
                created_by: version.created_by,
                created_at: now,
            });
            let record = &mut entry.record;
            record.size = version.size;
            record.content_type = version.content_type;
            record.checksum = version.checksum;
            record.storage_key = version.storage_key;
            record.current_version = number;
            record.updated_at = now;
            Ok(record.clone())
        })
    }

    fn delete_file(&self, file: FileId) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>> {
        Box::pin(async move { self.state.write().remove_file(file) })
    }

    fn delete_folder(&self, folder: FolderId) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>> {
        Box::pin(async move { self.state.write().remove_folder(folder) })
    }

    fn move_file(&self, file: FileId, to: Placement) -> BoxFuture<'_, StoreResult<FileRecord>> {
        Box::pin(async move {
            let mut state = self.state.write();
            state.check_file_move(file, &to)?;
            state.relocate_file(file, to)
        })
    }

    fn move_folder(
        &self,
        folder: FolderId,
        to: Placement,
    ) -> BoxFuture<'_, StoreResult<FolderRecord>> {
        Box::pin(async move {
            let mut state = self.state.write();
            let subtree = state.check_folder_move(folder, &to)?;
            state.relocate_folder(folder, &subtree, to)
        })
    }

    fn move_replacing(
        &self,
        entry: EntryRef,
        to: Placement,
    ) -> BoxFuture<'_, StoreResult<Vec<StorageKey>>> {
        Box::pin(async move {
            let mut state = self.state.write();
            let (source_folder, subtree) = match entry {
                EntryRef::File { file, .. } => {
                    state.check_file_move(file, &to)?;
                    let parent = state.files.get(&file).and_then(|f| f.record.folder);
                    (parent, None)
                }
                EntryRef::Folder { folder, .. } => {
                    let subtree = state.check_folder_move(folder, &to)?;
                    (Some(folder), Some(subtree))
                }
                other => return Err(StoreError::invalid(format!("cannot move {other:?}"))),
            };

            let keys = match state.occupant(to.space, to.folder, &to.name) {
                None => Vec::new(),
                Some(occupant) if occupant == entry => {
                    return Err(StoreError::invalid("source and destination are the same"));
                }
                Some(EntryRef::File { file, .. }) => state.remove_file(file)?,
                Some(EntryRef::Folder { folder, .. }) => {
                    if source_folder.is_some_and(|id| state.subtree(folder).contains(&id)) {
                        return Err(StoreError::invalid(
                            "cannot replace a folder containing the source",
                        ));
                    }
                    state.remove_folder(folder)?
                }
                Some(other) => return Err(StoreError::invalid(format!("cannot replace {other:?}"))),
            };

            match (entry, subtree) {
                (EntryRef::Folder { folder, .. }, Some(subtree)) => {
                    state.relocate_folder(folder, &subtree, to)?;
                }
                (EntryRef::File { file, .. }, _) => {
                    state.relocate_file(file, to)?;
                }
                _ => {}
            }
            debug!(replaced_blobs = keys.len(), "Moved entry over existing destination");
            Ok(keys)
        })
    }
}
