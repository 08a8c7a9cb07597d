//! LOCK and UNLOCK.
//!
//! A LOCK with a `lockinfo` body acquires a new lock; an empty body with an
//! `If: (<token>)` header refreshes an existing one. Locking an unmapped path
//! inside a space creates an empty leaf there.

use bytes::Bytes;
use hyper::StatusCode;
use lyra_store::{Action, EntryRef, NewFile, StorageKey, content_checksum};
use tracing::{debug, info};

use super::put::guess_content_type;
use super::{DavResponse, LOCK_TOKEN, RequestContext, response, set_header, xml_response};
use crate::error::{DavError, DavResult};
use crate::lock::{LockDepth, LockError, LockRequest, LockType};
use crate::tree::{Expand, Parent};
use crate::xml;

/// Where the lock will live.
enum Anchor {
    Existing(EntryRef),
    /// Nothing is mapped yet; an empty leaf is created once the lock is granted.
    Unmapped(Parent),
}

pub(super) async fn lock(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let timeout_secs = parse_timeout(ctx.header("timeout"));
    let Some(info) = xml::parse_lock_info(&ctx.body)? else {
        return refresh(ctx, timeout_secs);
    };
    let depth = parse_depth(ctx.header("depth"))?;

    let anchor = match ctx.target().await? {
        Some(target) => Anchor::Existing(target.entry()),
        None if ctx.loc.is_in_space() => {
            let parent = ctx
                .dav
                .tree
                .parent(&ctx.loc, &ctx.principal)
                .await?
                .ok_or_else(|| DavError::conflict("parent collection does not exist"))?;
            Anchor::Unmapped(parent)
        }
        None => Anchor::Existing(ctx.build(Expand::None).await?.backing),
    };
    match &anchor {
        Anchor::Existing(entry) => ctx.authorize(entry, Action::Lock).await?,
        Anchor::Unmapped(parent) => ctx.authorize(&parent.entry(), Action::Create).await?,
    }

    let request = LockRequest {
        path: ctx.loc.path.clone(),
        lock_type: info.lock_type.unwrap_or(LockType::Exclusive),
        scope: info.scope.unwrap_or_else(|| "write".to_string()),
        depth,
        timeout_secs,
        owner: info.owner.unwrap_or_else(|| ctx.principal.username.clone()),
    };
    let lock = match ctx.dav.locks.acquire(request, &ctx.principal) {
        Ok(lock) => lock,
        Err(LockError::Conflict(existing)) => {
            ctx.dav.stats.record_lock_conflict();
            info!(
                path = %ctx.loc.path,
                holder = %existing.holder,
                locked_path = %existing.resource_path,
                "Lock refused"
            );
            return Ok(xml_response(StatusCode::LOCKED, xml::error_body("no-conflicting-lock")?));
        }
        Err(other) => return Err(other.into()),
    };

    let status = match anchor {
        Anchor::Existing(_) => StatusCode::OK,
        Anchor::Unmapped(parent) => {
            if let Err(e) = create_empty(ctx, &parent).await {
                ctx.dav.locks.force_release(&lock.token);
                return Err(e);
            }
            StatusCode::CREATED
        }
    };

    let mut response = xml_response(status, xml::lock_discovery(&lock)?);
    set_header(&mut response, LOCK_TOKEN, &format!("<{}>", lock.token))?;
    Ok(response)
}

fn refresh(ctx: &RequestContext<'_>, timeout_secs: u64) -> DavResult<DavResponse> {
    let token = ctx
        .header("if")
        .and_then(if_token)
        .ok_or_else(|| DavError::bad_request("LOCK without a body needs an If header"))?;
    let locks = &ctx.dav.locks;
    let current = locks.get(&token).ok_or(LockError::NotFound)?;
    if !current.applies_to(&ctx.loc.path) {
        return Err(DavError::PreconditionFailed("lock does not cover this resource".into()));
    }
    let lock = locks.refresh(&token, timeout_secs, &ctx.principal)?;
    debug!(token = %lock.token, timeout_secs = lock.timeout_secs, "Refreshed lock");
    Ok(xml_response(StatusCode::OK, xml::lock_discovery(&lock)?))
}

pub(super) fn unlock(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let token = ctx
        .header("lock-token")
        .map(|v| v.trim_start_matches('<').trim_end_matches('>').trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DavError::conflict("missing Lock-Token header"))?;

    let locks = &ctx.dav.locks;
    let Some(lock) = locks.get(&token) else {
        return Err(DavError::conflict("no such lock"));
    };
    if !lock.applies_to(&ctx.loc.path) {
        return Err(DavError::conflict("lock does not cover this resource"));
    }

    let released = locks.release(&token, &ctx.principal)
        || (ctx.principal.admin && locks.force_release(&token));
    if !released {
        return Err(DavError::conflict("lock is held by another principal"));
    }
    info!(token = %token, path = %lock.resource_path, "Unlocked");
    Ok(response(StatusCode::NO_CONTENT, Bytes::new()))
}

async fn create_empty(ctx: &RequestContext<'_>, parent: &Parent) -> DavResult<()> {
    let Some((_, name)) = ctx.loc.split_relative() else {
        return Err(DavError::conflict("no parent collection"));
    };
    let key = StorageKey::generate();
    ctx.dav.bytes.write(&key, Bytes::new()).await?;
    let new_file = NewFile {
        space: parent.space.id,
        folder: parent.folder,
        name: name.to_string(),
        size: 0,
        content_type: guess_content_type(name).to_string(),
        checksum: content_checksum(&[]),
        storage_key: key.clone(),
        created_by: ctx.principal.id,
    };
    if let Err(e) = ctx.dav.catalog.create_file(new_file).await {
        ctx.purge(&[key]).await;
        return Err(e.into());
    }
    info!(path = %ctx.loc.path, "Created empty resource for lock");
    Ok(())
}

/// `Depth` for LOCK: `0` (default) or `infinity`.
fn parse_depth(value: Option<&str>) -> DavResult<LockDepth> {
    match value {
        None | Some("0") => Ok(LockDepth::Zero),
        Some(v) if v.eq_ignore_ascii_case("infinity") => Ok(LockDepth::Infinity),
        Some(v) => Err(DavError::bad_request(format!("invalid Depth for LOCK: {v}"))),
    }
}

/// First understood entry of a `Timeout` list; `0` when there is none.
fn parse_timeout(value: Option<&str>) -> u64 {
    let Some(value) = value else {
        return 0;
    };
    for entry in value.split(',').map(str::trim) {
        if entry.eq_ignore_ascii_case("infinite") {
            return u64::MAX;
        }
        let Some((scheme, secs)) = entry.split_once('-') else {
            continue;
        };
        if scheme.eq_ignore_ascii_case("second")
            && let Ok(secs) = secs.parse::<u64>()
        {
            return secs;
        }
    }
    0
}

/// Token of the first list in an `If` header: `(<opaquelocktoken:...>)`.
fn if_token(value: &str) -> Option<String> {
    let list = &value[value.find('(')?..];
    let start = list.find('<')? + 1;
    let end = start + list[start..].find('>')?;
    Some(list[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(None), 0);
        assert_eq!(parse_timeout(Some("Second-60")), 60);
        assert_eq!(parse_timeout(Some("second-60")), 60);
        assert_eq!(parse_timeout(Some("Infinite, Second-4100000000")), u64::MAX);
        assert_eq!(parse_timeout(Some("Bogus, Second-30")), 30);
        assert_eq!(parse_timeout(Some("Second-abc")), 0);
    }

    #[test]
    fn test_parse_depth() {
        assert_eq!(parse_depth(None).unwrap(), LockDepth::Zero);
        assert_eq!(parse_depth(Some("Infinity")).unwrap(), LockDepth::Infinity);
        assert!(parse_depth(Some("1")).is_err());
    }

    #[test]
    fn test_if_token() {
        assert_eq!(
            if_token("(<opaquelocktoken:abc>)").as_deref(),
            Some("opaquelocktoken:abc")
        );
        assert_eq!(
            if_token("<http://host/webdav/x> (<opaquelocktoken:abc>)").as_deref(),
            Some("opaquelocktoken:abc")
        );
        assert_eq!(if_token("no list"), None);
    }
}
