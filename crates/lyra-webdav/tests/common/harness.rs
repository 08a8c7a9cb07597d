//! Test harness for WebDAV integration tests.
//!
//! Starts a [`DavServer`] over in-memory collaborators seeded with a small
//! fixed population:
//!
//! - `alice` owns the personal space `s1`; `bob` is an editor there and
//!   `carol` a viewer.
//! - `admin` owns the enterprise space `team`, where `alice` is an editor.
//! - `dave` belongs to no space.

use bytes::Bytes;
use chrono::Utc;
use lyra_store::{
    Catalog, MemoryByteStore, MemoryCatalog, MemoryDirectory, MembershipPolicy, SpaceKind,
    SpaceMember, SpaceRole, UserId,
};
use lyra_webdav::{DavConfig, DavHandler, DavServer, LockManager, ManualClock, ServerConfig};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const PASSWORD: &str = "secret";
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const CAROL: &str = "carol";
pub const DAVE: &str = "dave";
pub const ADMIN: &str = "admin";

/// Root of alice's personal space.
pub const S1: &str = "/webdav/personal/s1";
/// Root of the enterprise space.
pub const TEAM: &str = "/webdav/enterprise/team";

pub const TOKEN_SECRET: &[u8] = b"integration-test-secret";

/// A running server over seeded in-memory stores.
pub struct TestServer {
    server: DavServer,
    client: Client,
    pub base_url: String,
    pub handler: DavHandler,
    pub catalog: Arc<MemoryCatalog>,
    pub bytes: Arc<MemoryByteStore>,
    pub directory: Arc<MemoryDirectory>,
    /// Drives lock expiry.
    pub clock: Arc<ManualClock>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(DavConfig::default()).await
    }

    pub async fn with_config(config: DavConfig) -> Self {
        Self::with_catalog(config, |memory| -> Arc<dyn Catalog> { memory }).await
    }

    /// Serve through `wrap`, which sees the seeded catalog and returns the one
    /// the handler uses.
    pub async fn with_catalog(
        config: DavConfig,
        wrap: impl FnOnce(Arc<MemoryCatalog>) -> Arc<dyn Catalog>,
    ) -> Self {
        init_tracing();

        let directory = Arc::new(MemoryDirectory::new().with_token_secret(TOKEN_SECRET));
        let alice = directory.add_user(UserId(1), ALICE, PASSWORD, false).unwrap();
        let bob = directory.add_user(UserId(2), BOB, PASSWORD, false).unwrap();
        let carol = directory.add_user(UserId(3), CAROL, PASSWORD, false).unwrap();
        directory.add_user(UserId(4), DAVE, PASSWORD, false).unwrap();
        let admin = directory.add_user(UserId(5), ADMIN, PASSWORD, true).unwrap();

        let catalog = Arc::new(MemoryCatalog::new());
        catalog
            .create_space(
                "s1",
                SpaceKind::Personal,
                alice.id,
                vec![
                    SpaceMember {
                        user: bob.id,
                        role: SpaceRole::Editor,
                    },
                    SpaceMember {
                        user: carol.id,
                        role: SpaceRole::Viewer,
                    },
                ],
            )
            .expect("Failed to create personal space");
        catalog
            .create_space(
                "team",
                SpaceKind::Enterprise,
                admin.id,
                vec![SpaceMember {
                    user: alice.id,
                    role: SpaceRole::Editor,
                }],
            )
            .expect("Failed to create enterprise space");

        let bytes = Arc::new(MemoryByteStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let locks = Arc::new(LockManager::with_clock(config.lock_policy(), clock.clone()));

        let served = wrap(catalog.clone());
        let handler = DavHandler::builder(
            served.clone(),
            bytes.clone(),
            directory.clone(),
            Arc::new(MembershipPolicy::new(served)),
        )
        .config(config)
        .lock_manager(locks)
        .build_handler();

        let server = DavServer::start(handler.clone(), ServerConfig::default())
            .await
            .expect("Failed to start WebDAV server");
        let base_url = server.url();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let test_server = Self {
            server,
            client,
            base_url,
            handler,
            catalog,
            bytes,
            directory,
            clock,
        };
        test_server.wait_ready().await;
        test_server
    }

    async fn wait_ready(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self.anonymous(Method::OPTIONS, "/webdav").send().await
                && resp.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready in time");
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn as_user<'a>(&'a self, user: &'a str) -> Session<'a> {
        Session { server: self, user }
    }

    pub fn alice(&self) -> Session<'_> {
        self.as_user(ALICE)
    }

    pub fn bob(&self) -> Session<'_> {
        self.as_user(BOB)
    }

    /// A request with no credentials at all.
    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub async fn stop(self) {
        self.server.stop().await;
    }
}

/// Requests issued as one seeded user with Basic credentials.
pub struct Session<'a> {
    server: &'a TestServer,
    user: &'a str,
}

impl Session<'_> {
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.server
            .anonymous(method, path)
            .basic_auth(self.user, Some(PASSWORD))
    }

    // ========== HTTP Convenience Methods ==========

    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path)
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Bytes, (StatusCode, String)> {
        let resp = self.get(path).await;
        let status = resp.status();
        if status.is_success() {
            Ok(resp.bytes().await.expect("Failed to read body"))
        } else {
            Err((status, resp.text().await.unwrap_or_default()))
        }
    }

    pub async fn put(&self, path: &str, content: impl Into<Bytes>) -> Response {
        self.request(Method::PUT, path)
            .body(content.into())
            .send()
            .await
            .expect("PUT request failed")
    }

    /// PUT and assert success.
    pub async fn put_ok(&self, path: &str, content: impl Into<Bytes>) {
        let resp = self.put(path, content).await;
        let status = resp.status();
        assert!(
            status.is_success(),
            "PUT {} failed with status {}: {}",
            path,
            status,
            resp.text().await.unwrap_or_default()
        );
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.request(Method::DELETE, path)
            .send()
            .await
            .expect("DELETE request failed")
    }

    pub async fn delete_ok(&self, path: &str) {
        let resp = self.delete(path).await;
        let status = resp.status();
        assert!(
            status.is_success(),
            "DELETE {} failed with status {}",
            path,
            status
        );
    }

    pub async fn mkcol(&self, path: &str) -> Response {
        self.request(Method::from_bytes(b"MKCOL").unwrap(), path)
            .send()
            .await
            .expect("MKCOL request failed")
    }

    pub async fn mkcol_ok(&self, path: &str) {
        let resp = self.mkcol(path).await;
        let status = resp.status();
        assert!(
            status == StatusCode::CREATED,
            "MKCOL {} failed with status {}",
            path,
            status
        );
    }

    pub async fn propfind(&self, path: &str, depth: &str) -> Response {
        self.request(Method::from_bytes(b"PROPFIND").unwrap(), path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND request failed")
    }

    pub async fn propfind_body(&self, path: &str, depth: &str) -> (StatusCode, String) {
        let resp = self.propfind(path, depth).await;
        let status = resp.status();
        (status, resp.text().await.unwrap_or_default())
    }

    pub async fn copy(&self, from: &str, to: &str, overwrite: bool) -> Response {
        self.transfer(b"COPY", from, to, overwrite).await
    }

    pub async fn move_(&self, from: &str, to: &str, overwrite: bool) -> Response {
        self.transfer(b"MOVE", from, to, overwrite).await
    }

    async fn transfer(&self, method: &[u8], from: &str, to: &str, overwrite: bool) -> Response {
        self.request(Method::from_bytes(method).unwrap(), from)
            .header("Destination", self.server.url(to))
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await
            .expect("COPY/MOVE request failed")
    }

    /// LOCK with a `lockinfo` body for `scope` (`exclusive` or `shared`).
    pub async fn lock(&self, path: &str, scope: &str, timeout: &str) -> Response {
        self.request(Method::from_bytes(b"LOCK").unwrap(), path)
            .header("Timeout", timeout)
            .header("Content-Type", "application/xml")
            .body(lockinfo(scope, self.user))
            .send()
            .await
            .expect("LOCK request failed")
    }

    /// Take an exclusive lock and return its token.
    pub async fn lock_ok(&self, path: &str) -> String {
        let resp = self.lock(path, "exclusive", "Second-60").await;
        let status = resp.status();
        assert!(
            status.is_success(),
            "LOCK {} failed with status {}",
            path,
            status
        );
        super::lock_token(&resp)
    }

    /// Refresh through an empty LOCK body and an `If` header.
    pub async fn refresh(&self, path: &str, token: &str, timeout: &str) -> Response {
        self.request(Method::from_bytes(b"LOCK").unwrap(), path)
            .header("Timeout", timeout)
            .header("If", format!("(<{token}>)"))
            .send()
            .await
            .expect("LOCK refresh request failed")
    }

    pub async fn unlock(&self, path: &str, token: &str) -> Response {
        self.request(Method::from_bytes(b"UNLOCK").unwrap(), path)
            .header("Lock-Token", format!("<{token}>"))
            .send()
            .await
            .expect("UNLOCK request failed")
    }
}

/// Honour `RUST_LOG` in tests; output is captured per test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn lockinfo(scope: &str, owner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<D:lockinfo xmlns:D="DAV:">
  <D:lockscope><D:{scope}/></D:lockscope>
  <D:locktype><D:write/></D:locktype>
  <D:owner>{owner}</D:owner>
</D:lockinfo>"#
    )
}
