//! Permission evaluation.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::StoreResult;
use crate::model::{EntryRef, Principal, SpaceRole};

/// Operations a principal can be authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    Create,
    Delete,
    Copy,
    Move,
    Lock,
}

impl Action {
    /// Actions that leave the target unchanged.
    pub fn is_read_only(self) -> bool {
        matches!(self, Action::Read | Action::Copy | Action::Lock)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Lock => "lock",
        };
        f.write_str(name)
    }
}

/// Decides whether `principal` may perform `action` on `target`.
pub trait AccessPolicy: Send + Sync {
    fn check<'a>(
        &'a self,
        principal: &'a Principal,
        target: &'a EntryRef,
        action: Action,
    ) -> BoxFuture<'a, StoreResult<bool>>;
}

/// Policy derived from space membership.
///
/// - Administrators may do anything.
/// - The protocol root and namespace listings are read-only.
/// - Owners and editors may do anything inside their space.
/// - Viewers may read, copy out of, and lock entries.
pub struct MembershipPolicy {
    catalog: Arc<dyn Catalog>,
}

impl MembershipPolicy {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

impl AccessPolicy for MembershipPolicy {
    fn check<'a>(
        &'a self,
        principal: &'a Principal,
        target: &'a EntryRef,
        action: Action,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            if principal.admin {
                return Ok(true);
            }
            let Some(space_id) = target.space() else {
                return Ok(matches!(action, Action::Read));
            };
            let Some(space) = self.catalog.space(space_id).await? else {
                return Ok(false);
            };
            Ok(match space.role_of(principal.id) {
                Some(SpaceRole::Owner | SpaceRole::Editor) => true,
                Some(SpaceRole::Viewer) => action.is_read_only(),
                None => false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::model::{SpaceKind, SpaceMember, UserId};

    fn principal(id: u64, admin: bool) -> Principal {
        Principal {
            id: UserId(id),
            username: format!("u{id}"),
            admin,
        }
    }

    #[tokio::test]
    async fn test_membership_roles() {
        let catalog = Arc::new(MemoryCatalog::new());
        let space = catalog
            .create_space(
                "team",
                SpaceKind::Enterprise,
                UserId(1),
                vec![
                    SpaceMember { user: UserId(2), role: SpaceRole::Editor },
                    SpaceMember { user: UserId(3), role: SpaceRole::Viewer },
                ],
            )
            .unwrap();
        let policy = MembershipPolicy::new(catalog);
        let target = EntryRef::Space(space.id);

        assert!(policy.check(&principal(1, false), &target, Action::Delete).await.unwrap());
        assert!(policy.check(&principal(2, false), &target, Action::Write).await.unwrap());
        assert!(policy.check(&principal(3, false), &target, Action::Read).await.unwrap());
        assert!(policy.check(&principal(3, false), &target, Action::Lock).await.unwrap());
        assert!(!policy.check(&principal(3, false), &target, Action::Write).await.unwrap());
        assert!(!policy.check(&principal(4, false), &target, Action::Read).await.unwrap());
        assert!(policy.check(&principal(4, true), &target, Action::Delete).await.unwrap());
    }

    #[tokio::test]
    async fn test_roots_are_read_only() {
        let policy = MembershipPolicy::new(Arc::new(MemoryCatalog::new()));
        let user = principal(1, false);
        assert!(policy.check(&user, &EntryRef::System, Action::Read).await.unwrap());
        let scope = EntryRef::Scope(SpaceKind::Personal);
        assert!(!policy.check(&user, &scope, Action::Create).await.unwrap());
    }
}
