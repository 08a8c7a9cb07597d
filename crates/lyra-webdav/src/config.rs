//! Protocol configuration.

use serde::{Deserialize, Serialize};

use crate::lock::{DEFAULT_TIMEOUT_SECS, LockPolicy, MAX_TIMEOUT_SECS};

/// Tunables of the WebDAV dispatcher.
///
/// Every field has a default, so a partial `[dav]` table deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DavConfig {
    /// URL prefix the protocol is mounted at.
    pub prefix: String,
    /// Realm named in authentication challenges.
    pub realm: String,
    /// Maximum children returned for one collection.
    pub listing_limit: usize,
    pub lock_default_timeout_secs: u64,
    pub lock_max_timeout_secs: u64,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for DavConfig {
    fn default() -> Self {
        Self {
            prefix: "/webdav".to_string(),
            realm: "Lyra WebDAV".to_string(),
            listing_limit: 100,
            lock_default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            lock_max_timeout_secs: MAX_TIMEOUT_SECS,
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

impl DavConfig {
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            default_timeout_secs: self.lock_default_timeout_secs,
            max_timeout_secs: self.lock_max_timeout_secs.max(self.lock_default_timeout_secs),
        }
    }
}
