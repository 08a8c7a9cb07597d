//! WebDAV lock table.
//!
//! Locks are kept purely in memory in a single map from opaque token to
//! [`Lock`], guarded by one `parking_lot::RwLock`. Mutating operations
//! (`acquire`, `refresh`, `release`, `force_release`, `sweep`) take the write
//! half; queries take the read half. Acquisition never waits: a conflicting
//! request fails immediately with [`LockError::Conflict`].
//!
//! Expired entries are removed lazily, by a sweep at the start of every
//! `acquire` (or an explicit [`LockManager::sweep`]). Queries skip expired
//! entries; [`LockManager::statistics`] counts them until they are swept.
//!
//! The table is not persisted. A restart drops every lock.

use chrono::{DateTime, TimeDelta, Utc};
use lyra_store::{Principal, UserId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Default lock lifetime when the client asks for none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
/// Upper bound on any lock lifetime.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

const TOKEN_SCHEME: &str = "opaquelocktoken:";

/// Whether other principals may hold overlapping locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    Exclusive,
    Shared,
}

impl LockType {
    /// Element name used in `lockscope`.
    pub fn as_str(self) -> &'static str {
        match self {
            LockType::Exclusive => "exclusive",
            LockType::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDepth {
    Zero,
    Infinity,
}

impl fmt::Display for LockDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockDepth::Zero => f.write_str("0"),
            LockDepth::Infinity => f.write_str("infinity"),
        }
    }
}

/// One granted lock. Never mutated once in the table; a refresh replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub token: String,
    pub resource_path: String,
    pub lock_type: LockType,
    /// Kind of access being locked, rendered as `locktype` (normally `write`).
    pub scope: String,
    pub depth: LockDepth,
    pub timeout_secs: u64,
    pub expires_at: DateTime<Utc>,
    pub owner: String,
    pub holder: UserId,
    pub created_at: DateTime<Utc>,
}

impl Lock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// True when this lock covers `path`: same path, or an ancestor with infinite depth.
    pub fn applies_to(&self, path: &str) -> bool {
        self.resource_path == path
            || (self.depth == LockDepth::Infinity && is_descendant(path, &self.resource_path))
    }

    fn overlaps(&self, path: &str, depth: LockDepth) -> bool {
        self.resource_path == path
            || (self.depth == LockDepth::Infinity && is_descendant(path, &self.resource_path))
            || (depth == LockDepth::Infinity && is_descendant(&self.resource_path, path))
    }

    fn conflicts_with(
        &self,
        path: &str,
        lock_type: LockType,
        depth: LockDepth,
        holder: UserId,
    ) -> bool {
        self.holder != holder
            && (self.lock_type == LockType::Exclusive || lock_type == LockType::Exclusive)
            && self.overlaps(path, depth)
    }
}

/// Parameters of a lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub path: String,
    pub lock_type: LockType,
    pub scope: String,
    pub depth: LockDepth,
    /// Requested lifetime; `0` selects the default.
    pub timeout_secs: u64,
    pub owner: String,
}

/// Expected, recoverable lock outcomes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// An overlapping lock held by someone else prevents the request.
    #[error("Conflicts with lock on {}", .0.resource_path)]
    Conflict(Box<Lock>),

    /// No live lock has this token.
    #[error("Lock token not found")]
    NotFound,

    /// The lock belongs to another principal.
    #[error("Lock is held by another principal")]
    Forbidden,
}

/// Point-in-time lock counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStatistics {
    pub total: usize,
    pub exclusive: usize,
    pub shared: usize,
}

/// Timeout bounds applied to every acquire and refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_timeout_secs: MAX_TIMEOUT_SECS,
        }
    }
}

impl LockPolicy {
    /// Non-positive requests get the default; everything is capped at the maximum.
    pub fn effective_timeout(&self, requested: u64) -> u64 {
        let timeout = if requested == 0 {
            self.default_timeout_secs
        } else {
            requested
        };
        timeout.min(self.max_timeout_secs)
    }
}

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: u64) {
        let mut now = self.now.lock();
        *now = add_secs(*now, secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

fn add_secs(at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    let delta = TimeDelta::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX))
        .unwrap_or(TimeDelta::MAX);
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Normalize a lock path: trimmed, leading slash, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// True when `child` lies strictly below `parent`.
fn is_descendant(child: &str, parent: &str) -> bool {
    if parent == "/" {
        return child.len() > 1 && child.starts_with('/');
    }
    child.len() > parent.len()
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

/// The process-wide lock table.
pub struct LockManager {
    locks: RwLock<HashMap<String, Lock>>,
    policy: LockPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockPolicy::default())
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("policy", &self.policy)
            .field("locks", &self.locks.read().len())
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(policy: LockPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: LockPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Grant a lock unless it conflicts with a live lock of another principal.
    #[instrument(
        level = "debug",
        skip(self, request, principal),
        fields(path = %request.path, user = %principal.id)
    )]
    pub fn acquire(&self, request: LockRequest, principal: &Principal) -> Result<Lock, LockError> {
        let path = normalize_path(&request.path);
        let now = self.clock.now();

        let mut locks = self.locks.write();
        let swept = sweep_expired(&mut locks, now);
        if swept > 0 {
            debug!(swept, "Swept expired locks");
        }

        if let Some(existing) = locks
            .values()
            .find(|l| l.conflicts_with(&path, request.lock_type, request.depth, principal.id))
        {
            debug!(
                holder = %existing.holder,
                locked_path = %existing.resource_path,
                "Lock conflict"
            );
            return Err(LockError::Conflict(Box::new(existing.clone())));
        }

        let timeout_secs = self.policy.effective_timeout(request.timeout_secs);
        let lock = Lock {
            token: format!("{TOKEN_SCHEME}{}", Uuid::new_v4()),
            resource_path: path,
            lock_type: request.lock_type,
            scope: request.scope,
            depth: request.depth,
            timeout_secs,
            expires_at: add_secs(now, timeout_secs),
            owner: request.owner,
            holder: principal.id,
            created_at: now,
        };
        info!(
            token = %lock.token,
            path = %lock.resource_path,
            lock_type = lock.lock_type.as_str(),
            depth = %lock.depth,
            timeout_secs,
            "Lock acquired"
        );
        locks.insert(lock.token.clone(), lock.clone());
        Ok(lock)
    }

    /// Extend a lock's lifetime. Only its holder may refresh it.
    #[instrument(level = "debug", skip(self, principal), fields(user = %principal.id))]
    pub fn refresh(
        &self,
        token: &str,
        timeout_secs: u64,
        principal: &Principal,
    ) -> Result<Lock, LockError> {
        let now = self.clock.now();
        let mut locks = self.locks.write();

        let Some(current) = locks.get(token) else {
            return Err(LockError::NotFound);
        };
        if current.is_expired(now) {
            locks.remove(token);
            return Err(LockError::NotFound);
        }
        if current.holder != principal.id {
            return Err(LockError::Forbidden);
        }

        let timeout_secs = self.policy.effective_timeout(timeout_secs);
        let refreshed = Lock {
            timeout_secs,
            expires_at: add_secs(now, timeout_secs),
            ..current.clone()
        };
        debug!(timeout_secs, "Lock refreshed");
        locks.insert(token.to_string(), refreshed.clone());
        Ok(refreshed)
    }

    /// Remove a lock held by `principal`. Returns false if absent or not theirs.
    #[instrument(level = "debug", skip(self, principal), fields(user = %principal.id))]
    pub fn release(&self, token: &str, principal: &Principal) -> bool {
        let mut locks = self.locks.write();
        match locks.get(token) {
            Some(lock) if lock.holder == principal.id => {
                debug!(path = %lock.resource_path, "Lock released");
                locks.remove(token);
                true
            }
            _ => false,
        }
    }

    /// Remove a lock regardless of who holds it.
    pub fn force_release(&self, token: &str) -> bool {
        let removed = self.locks.write().remove(token);
        if let Some(lock) = &removed {
            info!(token, path = %lock.resource_path, holder = %lock.holder, "Lock force-released");
        }
        removed.is_some()
    }

    /// Live lock with this token.
    pub fn get(&self, token: &str) -> Option<Lock> {
        let now = self.clock.now();
        self.locks
            .read()
            .get(token)
            .filter(|l| !l.is_expired(now))
            .cloned()
    }

    /// Live locks that apply to `path`: on it, or on an ancestor with infinite depth.
    pub fn locks_for(&self, path: &str) -> Vec<Lock> {
        let path = normalize_path(path);
        let now = self.clock.now();
        self.locks
            .read()
            .values()
            .filter(|l| !l.is_expired(now) && l.applies_to(&path))
            .cloned()
            .collect()
    }

    /// Live locks on `path` or anywhere below it.
    pub fn locks_within(&self, path: &str) -> Vec<Lock> {
        let path = normalize_path(path);
        let now = self.clock.now();
        self.locks
            .read()
            .values()
            .filter(|l| {
                !l.is_expired(now)
                    && (l.resource_path == path || is_descendant(&l.resource_path, &path))
            })
            .cloned()
            .collect()
    }

    /// True when an exclusive lock held by someone else applies to `path`.
    pub fn is_locked_for_others(&self, path: &str, principal: &Principal) -> bool {
        let path = normalize_path(path);
        let now = self.clock.now();
        self.locks.read().values().any(|l| {
            !l.is_expired(now)
                && l.lock_type == LockType::Exclusive
                && l.holder != principal.id
                && l.applies_to(&path)
        })
    }

    /// Counts over the whole table, including expired entries not yet swept.
    pub fn statistics(&self) -> LockStatistics {
        let locks = self.locks.read();
        let exclusive = locks
            .values()
            .filter(|l| l.lock_type == LockType::Exclusive)
            .count();
        LockStatistics {
            total: locks.len(),
            exclusive,
            shared: locks.len() - exclusive,
        }
    }

    /// Drop every expired lock; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        sweep_expired(&mut self.locks.write(), now)
    }
}

fn sweep_expired(locks: &mut HashMap<String, Lock>, now: DateTime<Utc>) -> usize {
    let before = locks.len();
    locks.retain(|_, lock| !lock.is_expired(now));
    before - locks.len()
}
