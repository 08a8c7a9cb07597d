//! Resource tree construction.
//!
//! [`ResourceTree::build`] turns a [`Location`] into a [`Resource`] by asking
//! the catalog, for a given principal. It only reads. Children are loaded one
//! level deep and only when the caller asks for them, and every listing is
//! capped at the configured page size.

use lyra_store::{
    Catalog, EntryRef, FileRecord, FolderId, FolderRecord, Principal, Space, SpaceKind,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::DavResult;
use crate::path::{Location, PathResolver, join};
use crate::resource::{Resource, VersionSummary};

/// Whether to load a collection's immediate children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expand {
    None,
    Children,
}

/// The container a new entry at some location would be created in.
#[derive(Debug, Clone)]
pub struct Parent {
    pub space: Space,
    /// `None` for the space root.
    pub folder: Option<FolderId>,
    /// Canonical path of the container.
    pub path: String,
}

impl Parent {
    pub fn entry(&self) -> EntryRef {
        match self.folder {
            Some(folder) => EntryRef::Folder {
                space: self.space.id,
                folder,
            },
            None => EntryRef::Space(self.space.id),
        }
    }
}

/// Catalog records behind a location inside a space.
#[derive(Debug, Clone)]
pub enum Target {
    SpaceRoot(Space),
    Folder(Space, FolderRecord),
    File(Space, FileRecord),
}

impl Target {
    pub fn space(&self) -> &Space {
        match self {
            Target::SpaceRoot(space) | Target::Folder(space, _) | Target::File(space, _) => space,
        }
    }

    pub fn entry(&self) -> EntryRef {
        match self {
            Target::SpaceRoot(space) => EntryRef::Space(space.id),
            Target::Folder(space, folder) => EntryRef::Folder {
                space: space.id,
                folder: folder.id,
            },
            Target::File(space, file) => EntryRef::File {
                space: space.id,
                file: file.id,
            },
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self, Target::File(..))
    }
}

/// Builds [`Resource`] snapshots from the catalog.
pub struct ResourceTree {
    catalog: Arc<dyn Catalog>,
    resolver: PathResolver,
    page_size: usize,
}

impl ResourceTree {
    pub fn new(catalog: Arc<dyn Catalog>, resolver: PathResolver, page_size: usize) -> Self {
        Self {
            catalog,
            resolver,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Build the resource at `loc`, or `None` if nothing lives there.
    #[instrument(level = "debug", skip(self, loc, principal), fields(path = %loc.path))]
    pub async fn build(
        &self,
        loc: &Location,
        principal: &Principal,
        expand: Expand,
    ) -> DavResult<Option<Resource>> {
        if loc.is_root() {
            let children = SpaceKind::ALL
                .into_iter()
                .map(|kind| Resource::scope_root(kind, self.resolver.scope_path(kind)))
                .collect();
            return Ok(Some(
                Resource::system_root(&loc.path).with_children(children),
            ));
        }

        let Some(kind) = loc.scope.kind() else {
            debug!("Unknown namespace");
            return Ok(None);
        };

        if loc.space_name.is_none() {
            let scope = Resource::scope_root(kind, loc.path.clone());
            if expand == Expand::None {
                return Ok(Some(scope));
            }
            let spaces = self.catalog.list_spaces(principal, kind).await?;
            let children = spaces
                .iter()
                .take(self.page_size)
                .map(|space| {
                    Resource::space_root(space, self.resolver.space_path(kind, &space.name))
                })
                .collect();
            return Ok(Some(scope.with_children(children)));
        }

        match self.target(loc, principal).await? {
            Some(target) => Ok(Some(self.resource(target, loc.path.clone(), expand).await?)),
            None => Ok(None),
        }
    }

    /// Look up the catalog records behind a location inside a space.
    ///
    /// `None` for the root, namespace listings, and anything that does not exist.
    pub async fn target(&self, loc: &Location, principal: &Principal) -> DavResult<Option<Target>> {
        let (Some(kind), Some(space_name)) = (loc.scope.kind(), loc.space_name.as_deref()) else {
            return Ok(None);
        };
        let Some(space) = self.catalog.find_space(principal, kind, space_name).await? else {
            debug!(space = space_name, "Space not found");
            return Ok(None);
        };

        if loc.relative_path.is_empty() {
            return Ok(Some(Target::SpaceRoot(space)));
        }

        // Files and folders share one namespace, files are checked first.
        if let Some(file) = self.catalog.file_by_path(space.id, &loc.relative_path).await? {
            return Ok(Some(Target::File(space, file)));
        }
        if let Some(folder) = self.catalog.folder_by_path(space.id, &loc.relative_path).await? {
            return Ok(Some(Target::Folder(space, folder)));
        }
        Ok(None)
    }

    /// Build the resource for an already located target.
    pub async fn resource(
        &self,
        target: Target,
        path: String,
        expand: Expand,
    ) -> DavResult<Resource> {
        match target {
            Target::SpaceRoot(space) => {
                let node = Resource::space_root(&space, path);
                self.expand(node, &space, None, expand).await
            }
            Target::Folder(space, folder) => {
                let node = Resource::folder(&folder, path);
                self.expand(node, &space, Some(folder.id), expand).await
            }
            Target::File(_, file) => {
                let history = self.catalog.versions(file.id).await?;
                let summary = VersionSummary::from_history(file.current_version, &history);
                Ok(Resource::file(&file, path).with_versions(summary))
            }
        }
    }

    /// Locate the container for a new entry at `loc`.
    ///
    /// Returns `None` when the location is not inside a space, or the space
    /// or parent folder does not exist.
    pub async fn parent(&self, loc: &Location, principal: &Principal) -> DavResult<Option<Parent>> {
        let (Some(kind), Some(space_name)) = (loc.scope.kind(), loc.space_name.as_deref()) else {
            return Ok(None);
        };
        let Some((parent_rel, _)) = loc.split_relative() else {
            return Ok(None);
        };
        let Some(space) = self.catalog.find_space(principal, kind, space_name).await? else {
            return Ok(None);
        };
        let space_path = self.resolver.space_path(kind, &space.name);

        if parent_rel.is_empty() {
            return Ok(Some(Parent {
                space,
                folder: None,
                path: space_path,
            }));
        }

        let folder = self.catalog.folder_by_path(space.id, parent_rel).await?;
        Ok(folder.map(|folder| Parent {
            space,
            folder: Some(folder.id),
            path: join(&space_path, parent_rel),
        }))
    }

    /// Attach one level of children: sub-folders first, then files.
    async fn expand(
        &self,
        node: Resource,
        space: &Space,
        folder: Option<FolderId>,
        expand: Expand,
    ) -> DavResult<Resource> {
        if expand == Expand::None {
            return Ok(node);
        }
        let folders = self
            .catalog
            .list_folders(space.id, folder, Some(self.page_size))
            .await?;
        let remaining = self.page_size.saturating_sub(folders.len());
        let files = if remaining > 0 {
            self.catalog.list_files(space.id, folder, Some(remaining)).await?
        } else {
            Vec::new()
        };

        let mut children = Vec::with_capacity(folders.len() + files.len());
        children.extend(
            folders
                .iter()
                .map(|f| Resource::folder(f, join(&node.path, &f.name))),
        );
        children.extend(
            files
                .iter()
                .map(|f| Resource::file(f, join(&node.path, &f.name))),
        );
        Ok(node.with_children(children))
    }
}
