//! WebDAV protocol core for Lyra.
//!
//! Exposes the multi-tenant Lyra document store over WebDAV (classes 1 and
//! 2). Requests are authenticated, resolved against the `personal` /
//! `enterprise` namespaces, authorized, and then handled per verb.
//!
//! # Layout
//!
//! - [`path`]: turns request paths into [`Location`]s. Never fails.
//! - [`tree`]: builds [`Resource`] snapshots from the catalog, read-only.
//! - [`lock`]: the in-memory lock table behind a single readers-writer lock.
//! - [`handler`]: the dispatcher and one module per verb group.
//! - [`server`]: the hyper accept loop.
//!
//! Persistence, identity and permissions live behind the collaborator traits
//! of [`lyra_store`].
//!
//! # Example
//!
//! ```ignore
//! use lyra_store::{MemoryByteStore, MemoryCatalog, MemoryDirectory, MembershipPolicy};
//! use lyra_webdav::{DavHandler, DavServer, ServerConfig};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! let handler = DavHandler::builder(
//!     catalog.clone(),
//!     Arc::new(MemoryByteStore::new()),
//!     Arc::new(MemoryDirectory::new()),
//!     Arc::new(MembershipPolicy::new(catalog)),
//! )
//! .build_handler();
//!
//! let server = DavServer::start(handler, ServerConfig::default()).await?;
//! println!("Serving at {}/webdav", server.url());
//! ```
//!
//! # Locks
//!
//! The lock table is not persisted. Restarting the process drops every lock.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod lock;
pub mod method;
pub mod path;
pub mod resource;
pub mod server;
pub mod stats;
pub mod tree;
pub mod xml;

pub use config::DavConfig;
pub use error::{DavError, DavResult};
pub use handler::{DavHandler, DavHandlerBuilder, DavResponse};
pub use lock::{
    Clock, Lock, LockDepth, LockError, LockManager, LockPolicy, LockRequest, LockStatistics,
    LockType, ManualClock, SystemClock,
};
pub use method::DavMethod;
pub use path::{Location, PathResolver, Scope};
pub use resource::{Resource, ResourceKind, VersionSummary};
pub use server::{DavServer, ServerConfig};
pub use stats::{DavStats, DavStatsSnapshot};
pub use tree::{Expand, Parent, ResourceTree, Target};
