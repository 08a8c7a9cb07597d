//! Protocol dispatcher.
//!
//! One request runs through a fixed pipeline: authenticate, resolve the path,
//! then hand a [`RequestContext`] to the handler for its verb. Handlers look
//! up and authorize what they touch themselves and return a [`DavResult`];
//! errors are rendered into responses in one place.
//!
//! `OPTIONS` is answered before authentication so that clients can discover
//! the server's capabilities.

mod copy_move;
mod delete;
mod get;
mod lock;
mod mkcol;
mod options;
mod propfind;
mod put;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{
    ALLOW, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, WWW_AUTHENTICATE,
};
use hyper::{Request, Response, StatusCode};
use lyra_store::{
    AccessPolicy, Action, Authenticator, ByteStore, Catalog, EntryRef, Principal, StorageKey,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{challenges, parse_authorization};
use crate::config::DavConfig;
use crate::error::{DavError, DavResult};
use crate::lock::LockManager;
use crate::method::DavMethod;
use crate::path::{Location, PathResolver};
use crate::resource::Resource;
use crate::stats::DavStats;
use crate::tree::{Expand, ResourceTree, Target};
use crate::xml;

/// Response type produced by the dispatcher.
pub type DavResponse = Response<Full<Bytes>>;

pub(crate) const DAV_HEADER: HeaderName = HeaderName::from_static("dav");
pub(crate) const LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");

struct Inner {
    catalog: Arc<dyn Catalog>,
    bytes: Arc<dyn ByteStore>,
    authenticator: Arc<dyn Authenticator>,
    policy: Arc<dyn AccessPolicy>,
    locks: Arc<LockManager>,
    tree: ResourceTree,
    resolver: PathResolver,
    config: DavConfig,
    stats: Arc<DavStats>,
}

/// Builder for [`DavHandler`].
pub struct DavHandlerBuilder {
    catalog: Arc<dyn Catalog>,
    bytes: Arc<dyn ByteStore>,
    authenticator: Arc<dyn Authenticator>,
    policy: Arc<dyn AccessPolicy>,
    config: DavConfig,
    locks: Option<Arc<LockManager>>,
    stats: Option<Arc<DavStats>>,
}

impl DavHandlerBuilder {
    #[must_use]
    pub fn config(mut self, config: DavConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing lock table instead of creating one from the config.
    #[must_use]
    pub fn lock_manager(mut self, locks: Arc<LockManager>) -> Self {
        self.locks = Some(locks);
        self
    }

    #[must_use]
    pub fn stats(mut self, stats: Arc<DavStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build_handler(self) -> DavHandler {
        let resolver = PathResolver::new(&self.config.prefix);
        let locks = self
            .locks
            .unwrap_or_else(|| Arc::new(LockManager::new(self.config.lock_policy())));
        let tree = ResourceTree::new(
            self.catalog.clone(),
            resolver.clone(),
            self.config.listing_limit,
        );
        DavHandler {
            inner: Arc::new(Inner {
                catalog: self.catalog,
                bytes: self.bytes,
                authenticator: self.authenticator,
                policy: self.policy,
                locks,
                tree,
                resolver,
                config: self.config,
                stats: self.stats.unwrap_or_default(),
            }),
        }
    }
}

/// Request handler for the WebDAV protocol. Cheap to clone.
#[derive(Clone)]
pub struct DavHandler {
    inner: Arc<Inner>,
}

impl DavHandler {
    pub fn builder(
        catalog: Arc<dyn Catalog>,
        bytes: Arc<dyn ByteStore>,
        authenticator: Arc<dyn Authenticator>,
        policy: Arc<dyn AccessPolicy>,
    ) -> DavHandlerBuilder {
        DavHandlerBuilder {
            catalog,
            bytes,
            authenticator,
            policy,
            config: DavConfig::default(),
            locks: None,
            stats: None,
        }
    }

    pub fn config(&self) -> &DavConfig {
        &self.inner.config
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.inner.locks
    }

    pub fn stats(&self) -> &Arc<DavStats> {
        &self.inner.stats
    }

    /// Handle one request whose body has already been read.
    pub async fn handle(&self, req: Request<Bytes>) -> DavResponse {
        self.inner.stats.record_request();
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_string();

        let Some(method) = DavMethod::from_method(&parts.method) else {
            debug!(method = %parts.method, path = %path, "Unsupported method");
            let err = DavError::MethodNotAllowed(parts.method.to_string());
            return self.render_error(parts.method.as_str(), &path, err);
        };
        debug!(method = %method, path = %path, "Request");

        match self.dispatch(method, &path, &parts.headers, body).await {
            Ok(response) => response,
            Err(err) => self.render_error(method.as_str(), &path, err),
        }
    }

    async fn dispatch(
        &self,
        method: DavMethod,
        path: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> DavResult<DavResponse> {
        if method == DavMethod::Options {
            return Ok(options::options());
        }
        let principal = self.authenticate(headers).await?;
        let ctx = RequestContext {
            dav: &self.inner,
            method,
            principal,
            loc: self.inner.resolver.resolve(path),
            request_path: path,
            headers,
            body,
        };
        route(&ctx).await
    }

    async fn authenticate(&self, headers: &HeaderMap) -> DavResult<Principal> {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            debug!("No credentials supplied");
            return Err(DavError::Unauthenticated);
        };
        let Some(credentials) = parse_authorization(value) else {
            debug!("Malformed Authorization header");
            return Err(DavError::Unauthenticated);
        };
        match self.inner.authenticator.authenticate(&credentials).await? {
            Some(principal) => Ok(principal),
            None => {
                info!(credentials = ?credentials, "Authentication failed");
                Err(DavError::Unauthenticated)
            }
        }
    }

    /// Turn an error into a response. Backend failures are logged here.
    pub(crate) fn render_error(&self, method: &str, path: &str, err: DavError) -> DavResponse {
        let stats = &self.inner.stats;
        stats.record_error();
        let status = err.status();

        if err.is_internal() {
            error!(method, path, error = %err, "Request failed");
        } else {
            debug!(method, path, status = status.as_u16(), error = %err, "Request rejected");
        }

        let mut response = match &err {
            DavError::Locked(_) => {
                stats.record_lock_conflict();
                xml::error_body("lock-token-submitted").map_or_else(
                    |_| plain(status, status.as_str()),
                    |body| xml_response(status, body),
                )
            }
            _ if err.is_internal() => plain(status, "Internal Server Error"),
            _ => plain(status, &err.to_string()),
        };

        match err {
            DavError::Unauthenticated => {
                for challenge in challenges(&self.inner.config.realm) {
                    if let Ok(value) = HeaderValue::try_from(challenge) {
                        response.headers_mut().append(WWW_AUTHENTICATE, value);
                    }
                }
            }
            DavError::MethodNotAllowed(_) => {
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(DavMethod::ALLOW));
            }
            _ => {}
        }
        response
    }
}

/// Verb routing. Exhaustive over [`DavMethod`].
async fn route(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    match ctx.method {
        DavMethod::Get => get::get(ctx, false).await,
        DavMethod::Head => get::get(ctx, true).await,
        DavMethod::Put => put::put(ctx).await,
        DavMethod::Delete => delete::delete(ctx).await,
        DavMethod::Mkcol => mkcol::mkcol(ctx).await,
        DavMethod::Copy => copy_move::transfer(ctx, copy_move::Mode::Copy).await,
        DavMethod::Move => copy_move::transfer(ctx, copy_move::Mode::Move).await,
        DavMethod::Lock => lock::lock(ctx).await,
        DavMethod::Unlock => lock::unlock(ctx),
        DavMethod::Propfind => propfind::propfind(ctx).await,
        DavMethod::Proppatch => Err(DavError::forbidden("property updates are not supported")),
        DavMethod::Options => Ok(options::options()),
    }
}

/// Everything a verb handler needs about the current request.
struct RequestContext<'a> {
    dav: &'a Inner,
    method: DavMethod,
    principal: Principal,
    loc: Location,
    /// Request path as sent by the client, without the query.
    request_path: &'a str,
    headers: &'a HeaderMap,
    body: Bytes,
}

impl RequestContext<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
    }

    async fn target(&self) -> DavResult<Option<Target>> {
        self.dav.tree.target(&self.loc, &self.principal).await
    }

    /// The resource at the request path, or 404.
    async fn build(&self, expand: Expand) -> DavResult<Resource> {
        self.dav
            .tree
            .build(&self.loc, &self.principal, expand)
            .await?
            .ok_or_else(|| DavError::not_found(&self.loc.path))
    }

    async fn authorize(&self, entry: &EntryRef, action: Action) -> DavResult<()> {
        if self.dav.policy.check(&self.principal, entry, action).await? {
            Ok(())
        } else {
            debug!(user = %self.principal.id, action = %action, "Permission denied");
            Err(DavError::forbidden(format!("{action} not permitted")))
        }
    }

    /// 423 when an exclusive lock of another principal applies to `path`.
    fn ensure_unlocked(&self, path: &str) -> DavResult<()> {
        if self.dav.locks.is_locked_for_others(path, &self.principal) {
            return Err(DavError::locked(path));
        }
        Ok(())
    }

    /// 423 when `path` is locked for others or any lock of another principal
    /// lies below it.
    fn ensure_subtree_unlocked(&self, path: &str) -> DavResult<()> {
        self.ensure_unlocked(path)?;
        match self
            .dav
            .locks
            .locks_within(path)
            .into_iter()
            .find(|l| l.holder != self.principal.id)
        {
            Some(lock) => Err(DavError::locked(lock.resource_path)),
            None => Ok(()),
        }
    }

    /// Release every lock the principal holds at or below `path`.
    fn release_own_locks(&self, path: &str) -> usize {
        let locks = &self.dav.locks;
        locks
            .locks_within(path)
            .iter()
            .filter(|l| l.holder == self.principal.id)
            .filter(|l| locks.release(&l.token, &self.principal))
            .count()
    }

    /// Delete content whose catalog records are already gone.
    async fn purge(&self, keys: &[StorageKey]) {
        for key in keys {
            if let Err(e) = self.dav.bytes.delete(key).await {
                warn!(key = %key, error = %e, "Failed to purge content");
            }
        }
    }
}

fn response(status: StatusCode, body: Bytes) -> DavResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}

fn plain(status: StatusCode, text: &str) -> DavResponse {
    let mut response = response(status, Bytes::from(format!("{text}\n")));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn xml_response(status: StatusCode, body: Bytes) -> DavResponse {
    let mut response = response(status, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(xml::XML_CONTENT_TYPE));
    response
}

fn set_header(response: &mut DavResponse, name: HeaderName, value: &str) -> DavResult<()> {
    let value = HeaderValue::try_from(value)
        .map_err(|e| DavError::Xml(format!("invalid {name} header value: {e}")))?;
    response.headers_mut().insert(name, value);
    Ok(())
}
