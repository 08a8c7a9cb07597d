//! Collaborators consumed by the Lyra WebDAV core.
//!
//! The protocol layer never touches persistence directly. Instead it talks to
//! a handful of narrow traits defined here:
//!
//! - [`Authenticator`] validates `Authorization` credentials.
//! - [`AccessPolicy`] decides whether a principal may perform an [`Action`].
//! - [`Catalog`] owns spaces, folders, files and their version history.
//! - [`ByteStore`] stores file content under opaque [`StorageKey`]s.
//!
//! Each trait ships with an implementation that is good enough to run a
//! server stand-alone: [`MemoryDirectory`], [`MembershipPolicy`],
//! [`MemoryCatalog`], [`MemoryByteStore`] and [`FsByteStore`].
//!
//! All trait methods return [`BoxFuture`](futures::future::BoxFuture) so that
//! callers can hold collaborators as `Arc<dyn Trait>`.

pub mod access;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod model;
pub mod storage;

pub use access::{AccessPolicy, Action, MembershipPolicy};
pub use auth::{
    Authenticator, Credentials, MemoryDirectory, TokenClaims, hash_password, verify_password,
};
pub use catalog::{Catalog, NewFile, NewVersion, Placement};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryCatalog;
pub use model::{
    EntryRef, FileId, FileRecord, FolderId, FolderRecord, Principal, Space, SpaceId, SpaceKind,
    SpaceMember, SpaceRole, UserId, VersionInfo,
};
pub use storage::{ByteStore, FsByteStore, MemoryByteStore, StorageKey, content_checksum};
