//! COPY and MOVE.
//!
//! Both resolve the `Destination` header, check locks on both sides, and
//! honour `Overwrite`. A collection COPY runs in phases so that a failure
//! never leaves a half-populated destination behind:
//!
//! 1. enumerate the source subtree,
//! 2. copy every file's bytes to a fresh storage key,
//! 3. remove whatever `Overwrite` replaces,
//! 4. create the catalog records.
//!
//! Bytes copied in phase 2 are purged if a later phase fails.

use bytes::Bytes;
use hyper::{StatusCode, Uri};
use lyra_store::{
    Action, FileRecord, FolderId, FolderRecord, NewFile, Placement, SpaceId, StorageKey,
};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{DavResponse, RequestContext, response};
use crate::error::{DavError, DavResult};
use crate::path::{Location, Scope};
use crate::tree::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Copy,
    Move,
}

impl Mode {
    fn action(self) -> Action {
        match self {
            Mode::Copy => Action::Copy,
            Mode::Move => Action::Move,
        }
    }
}

pub(super) async fn transfer(ctx: &RequestContext<'_>, mode: Mode) -> DavResult<DavResponse> {
    let src = &ctx.loc;
    let dest = destination(ctx)?;
    let overwrite = overwrite(ctx)?;
    let deep = depth(ctx, mode)?;

    if dest.path == src.path {
        return Err(DavError::forbidden("source and destination are the same"));
    }
    if !src.is_in_space() {
        if src.scope == Scope::Unknown {
            return Err(DavError::not_found(&src.path));
        }
        return Err(DavError::forbidden("spaces and namespace roots cannot be copied or moved"));
    }
    if !dest.is_in_space() {
        return Err(DavError::forbidden("destination must be inside a space"));
    }
    if dest.is_within(src) {
        return Err(DavError::conflict("destination is inside the source"));
    }
    if src.is_within(&dest) {
        return Err(DavError::forbidden("destination contains the source"));
    }

    if mode == Mode::Move {
        ctx.ensure_subtree_unlocked(&src.path)?;
    }
    ctx.ensure_subtree_unlocked(&dest.path)?;

    let source = ctx
        .target()
        .await?
        .ok_or_else(|| DavError::not_found(&src.path))?;
    ctx.authorize(&source.entry(), mode.action()).await?;

    let tree = &ctx.dav.tree;
    let parent = tree
        .parent(&dest, &ctx.principal)
        .await?
        .ok_or_else(|| DavError::conflict("destination parent does not exist"))?;
    ctx.authorize(&parent.entry(), Action::Create).await?;

    let existing = tree.target(&dest, &ctx.principal).await?;
    if let Some(existing) = &existing {
        if !overwrite {
            return Err(DavError::PreconditionFailed(format!("{} exists", dest.path)));
        }
        ctx.authorize(&existing.entry(), Action::Delete).await?;
    }
    let replaced = existing.is_some();

    let placement = Placement {
        space: parent.space.id,
        folder: parent.folder,
        name: dest.name().to_string(),
    };

    match (mode, source) {
        (Mode::Copy, Target::File(_, file)) => copy_file(ctx, &file, placement, existing).await?,
        (Mode::Copy, Target::Folder(space, folder)) => {
            copy_folder(ctx, space.id, &folder, placement, existing, deep).await?;
        }
        (Mode::Move, source @ (Target::File(..) | Target::Folder(..))) => {
            move_entry(ctx, &source, placement, existing.as_ref()).await?;
        }
        (_, Target::SpaceRoot(_)) => {
            return Err(DavError::forbidden("spaces cannot be copied or moved"));
        }
    }

    if mode == Mode::Move {
        let released = ctx.release_own_locks(&src.path);
        info!(from = %src.path, to = %dest.path, released, "Moved");
    } else {
        info!(from = %src.path, to = %dest.path, deep, "Copied");
    }

    let status = if replaced {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CREATED
    };
    Ok(response(status, Bytes::new()))
}

fn destination(ctx: &RequestContext<'_>) -> DavResult<Location> {
    let raw = ctx
        .header("destination")
        .ok_or_else(|| DavError::bad_request("missing Destination header"))?;
    if raw.starts_with('/') {
        return Ok(ctx.dav.resolver.resolve(raw));
    }
    let uri: Uri = raw
        .parse()
        .map_err(|_| DavError::bad_request("invalid Destination header"))?;
    if uri.scheme().is_none() {
        return Err(DavError::bad_request("Destination must be an absolute URI or path"));
    }
    Ok(ctx.dav.resolver.resolve(uri.path()))
}

fn overwrite(ctx: &RequestContext<'_>) -> DavResult<bool> {
    match ctx.header("overwrite") {
        None => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("t") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("f") => Ok(false),
        Some(v) => Err(DavError::bad_request(format!("invalid Overwrite header: {v}"))),
    }
}

/// True for a recursive transfer. MOVE is always recursive.
fn depth(ctx: &RequestContext<'_>, mode: Mode) -> DavResult<bool> {
    match (ctx.header("depth"), mode) {
        (None, _) => Ok(true),
        (Some(v), _) if v.eq_ignore_ascii_case("infinity") => Ok(true),
        (Some("0"), Mode::Copy) => Ok(false),
        (Some(v), _) => Err(DavError::bad_request(format!(
            "invalid Depth for {}: {v}",
            ctx.method
        ))),
    }
}

/// Move `source` to `placement`. A replaced destination is removed by the
/// catalog in the same step, and its content purged only afterwards.
async fn move_entry(
    ctx: &RequestContext<'_>,
    source: &Target,
    placement: Placement,
    existing: Option<&Target>,
) -> DavResult<()> {
    let catalog = &ctx.dav.catalog;
    match (source, existing) {
        (_, Some(Target::SpaceRoot(_))) => Err(DavError::forbidden("spaces cannot be replaced")),
        (_, Some(_)) => {
            let keys = catalog.move_replacing(source.entry(), placement).await?;
            ctx.purge(&keys).await;
            Ok(())
        }
        (Target::File(_, file), None) => {
            catalog.move_file(file.id, placement).await?;
            Ok(())
        }
        (Target::Folder(_, folder), None) => {
            catalog.move_folder(folder.id, placement).await?;
            Ok(())
        }
        (Target::SpaceRoot(_), None) => Err(DavError::forbidden("spaces cannot be moved")),
    }
}

/// Remove an entry being replaced and purge its content.
async fn remove(ctx: &RequestContext<'_>, existing: Option<Target>) -> DavResult<()> {
    let keys = match existing {
        None => return Ok(()),
        Some(Target::File(_, file)) => ctx.dav.catalog.delete_file(file.id).await?,
        Some(Target::Folder(_, folder)) => ctx.dav.catalog.delete_folder(folder.id).await?,
        Some(Target::SpaceRoot(_)) => return Err(DavError::forbidden("spaces cannot be replaced")),
    };
    ctx.purge(&keys).await;
    Ok(())
}

/// Copy one blob to a fresh key.
async fn copy_bytes(ctx: &RequestContext<'_>, from: &StorageKey) -> DavResult<StorageKey> {
    let data = ctx.dav.bytes.read(from).await?;
    let len = data.len() as u64;
    let key = StorageKey::generate();
    ctx.dav.bytes.write(&key, data).await?;
    ctx.dav.stats.record_write(len);
    Ok(key)
}

fn copied_file(
    ctx: &RequestContext<'_>,
    file: &FileRecord,
    placement: Placement,
    key: StorageKey,
) -> NewFile {
    NewFile {
        space: placement.space,
        folder: placement.folder,
        name: placement.name,
        size: file.size,
        content_type: file.content_type.clone(),
        checksum: file.checksum.clone(),
        storage_key: key,
        created_by: ctx.principal.id,
    }
}

async fn copy_file(
    ctx: &RequestContext<'_>,
    file: &FileRecord,
    placement: Placement,
    existing: Option<Target>,
) -> DavResult<()> {
    let key = copy_bytes(ctx, &file.storage_key).await?;
    if let Err(e) = remove(ctx, existing).await {
        ctx.purge(&[key]).await;
        return Err(e);
    }
    let new_file = copied_file(ctx, file, placement, key.clone());
    if let Err(e) = ctx.dav.catalog.create_file(new_file).await {
        ctx.purge(&[key]).await;
        return Err(e.into());
    }
    Ok(())
}

/// Source subtree, relative to the folder being copied.
#[derive(Default)]
struct Snapshot {
    /// Relative paths of sub-folders, parents before children.
    folders: Vec<String>,
    /// Files with the relative path of their folder (`""` for the root).
    files: Vec<(String, FileRecord)>,
}

async fn snapshot(ctx: &RequestContext<'_>, space: SpaceId, root: FolderId) -> DavResult<Snapshot> {
    let catalog = &ctx.dav.catalog;
    let mut snapshot = Snapshot::default();
    let mut pending = vec![(root, String::new())];

    while let Some((folder, rel)) = pending.pop() {
        for file in catalog.list_files(space, Some(folder), None).await? {
            snapshot.files.push((rel.clone(), file));
        }
        for sub in catalog.list_folders(space, Some(folder), None).await? {
            let sub_rel = if rel.is_empty() {
                sub.name.clone()
            } else {
                format!("{rel}/{}", sub.name)
            };
            snapshot.folders.push(sub_rel.clone());
            pending.push((sub.id, sub_rel));
        }
    }
    Ok(snapshot)
}

async fn copy_folder(
    ctx: &RequestContext<'_>,
    space: SpaceId,
    folder: &FolderRecord,
    placement: Placement,
    existing: Option<Target>,
    deep: bool,
) -> DavResult<()> {
    let snapshot = if deep {
        snapshot(ctx, space, folder.id).await?
    } else {
        Snapshot::default()
    };
    debug!(
        folders = snapshot.folders.len(),
        files = snapshot.files.len(),
        "Copying collection"
    );

    let mut copied: Vec<(String, FileRecord, StorageKey)> =
        Vec::with_capacity(snapshot.files.len());
    for (rel, file) in snapshot.files {
        match copy_bytes(ctx, &file.storage_key).await {
            Ok(key) => copied.push((rel, file, key)),
            Err(e) => {
                purge_copies(ctx, &copied).await;
                return Err(e);
            }
        }
    }

    if let Err(e) = remove(ctx, existing).await {
        purge_copies(ctx, &copied).await;
        return Err(e);
    }

    let catalog = &ctx.dav.catalog;
    let root = match catalog
        .create_folder(placement.space, placement.folder, &placement.name, ctx.principal.id)
        .await
    {
        Ok(root) => root,
        Err(e) => {
            purge_copies(ctx, &copied).await;
            return Err(e.into());
        }
    };

    if let Err(e) = populate(ctx, placement.space, root.id, &snapshot.folders, &copied).await {
        if let Ok(keys) = catalog.delete_folder(root.id).await {
            ctx.purge(&keys).await;
        }
        purge_copies(ctx, &copied).await;
        return Err(e);
    }
    Ok(())
}

async fn populate(
    ctx: &RequestContext<'_>,
    space: SpaceId,
    root: FolderId,
    folders: &[String],
    files: &[(String, FileRecord, StorageKey)],
) -> DavResult<()> {
    let catalog = &ctx.dav.catalog;
    let mut ids: HashMap<&str, FolderId> = HashMap::from([("", root)]);

    for rel in folders {
        let (parent_rel, name) = rel.rsplit_once('/').unwrap_or(("", rel.as_str()));
        let parent = ids
            .get(parent_rel)
            .copied()
            .ok_or_else(|| DavError::conflict(format!("missing parent for {rel}")))?;
        let created = catalog
            .create_folder(space, Some(parent), name, ctx.principal.id)
            .await?;
        ids.insert(rel.as_str(), created.id);
    }

    for (rel, file, key) in files {
        let folder = ids
            .get(rel.as_str())
            .copied()
            .ok_or_else(|| DavError::conflict(format!("missing parent for {}", file.name)))?;
        let placement = Placement {
            space,
            folder: Some(folder),
            name: file.name.clone(),
        };
        let new_file = copied_file(ctx, file, placement, key.clone());
        catalog.create_file(new_file).await?;
    }
    Ok(())
}

async fn purge_copies(ctx: &RequestContext<'_>, copied: &[(String, FileRecord, StorageKey)]) {
    let keys: Vec<StorageKey> = copied.iter().map(|(_, _, key)| key.clone()).collect();
    ctx.purge(&keys).await;
}
