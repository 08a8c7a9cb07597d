//! GET, HEAD, PUT, DELETE and MKCOL against the seeded spaces.

mod common;

use common::{
    ADMIN, ALICE, CAROL, DAVE, S1, TEAM, TestServer, assert_file_content,
    assert_not_found, assert_status,
};
use lyra_webdav::DavConfig;
use reqwest::{Method, StatusCode};
use std::time::Duration;

// ==================== Authentication ====================

#[tokio::test]
async fn test_missing_credentials_challenge() {
    let server = TestServer::start().await;

    let resp = server.anonymous(Method::GET, S1).send().await.unwrap();
    assert_status(resp.status(), StatusCode::UNAUTHORIZED, "anonymous GET");

    let challenges: Vec<&str> = resp
        .headers()
        .get_all("www-authenticate")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert_eq!(challenges.len(), 2);
    assert!(challenges.iter().any(|c| c.starts_with("Basic ")));
    assert!(challenges.iter().any(|c| c.starts_with("Bearer ")));
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let server = TestServer::start().await;

    let resp = server
        .anonymous(Method::GET, S1)
        .basic_auth(ALICE, Some("not-the-password"))
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::UNAUTHORIZED, "bad password");
}

#[tokio::test]
async fn test_bearer_token_accepted() {
    let server = TestServer::start().await;
    server.alice().put_ok(&format!("{S1}/token.txt"), "via token").await;

    let token = server
        .directory
        .issue_token(ALICE, Duration::from_secs(300))
        .unwrap();
    let resp = server
        .anonymous(Method::GET, &format!("{S1}/token.txt"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::OK, "bearer GET");
    assert_eq!(resp.text().await.unwrap(), "via token");

    let resp = server
        .anonymous(Method::GET, S1)
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::UNAUTHORIZED, "garbage bearer");
}

#[tokio::test]
async fn test_options_without_credentials() {
    let server = TestServer::start().await;

    let resp = server.anonymous(Method::OPTIONS, S1).send().await.unwrap();
    assert_status(resp.status(), StatusCode::OK, "OPTIONS");
    assert_eq!(resp.headers()["dav"], "1, 2");
    let allow = resp.headers()["allow"].to_str().unwrap();
    assert!(allow.contains("PROPFIND"));
    assert!(allow.contains("LOCK"));
}

#[tokio::test]
async fn test_unknown_method_not_allowed() {
    let server = TestServer::start().await;

    let resp = server.alice().request(Method::PATCH, S1).send().await.unwrap();
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "PATCH");
    assert!(resp.headers().contains_key("allow"));
}

#[tokio::test]
async fn test_proppatch_forbidden() {
    let server = TestServer::start().await;

    let resp = server
        .alice()
        .request(Method::from_bytes(b"PROPPATCH").unwrap(), S1)
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::FORBIDDEN, "PROPPATCH");
}

// ==================== PUT / GET ====================

#[tokio::test]
async fn test_put_creates_then_versions() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{S1}/notes.txt");

    let resp = alice.put(&path, "first").await;
    assert_status(resp.status(), StatusCode::CREATED, "initial PUT");
    let first_etag = resp.headers()["etag"].to_str().unwrap().to_string();

    let resp = alice.put(&path, "second").await;
    assert_status(resp.status(), StatusCode::NO_CONTENT, "overwriting PUT");
    let second_etag = resp.headers()["etag"].to_str().unwrap().to_string();
    assert_ne!(first_etag, second_etag);

    assert_file_content(&alice, &path, b"second").await;

    let (status, body) = alice.propfind_body(&path, "0").await;
    assert_status(status, StatusCode::MULTI_STATUS, "PROPFIND file");
    assert!(body.contains("<L:version-number>2</L:version-number>"));
    assert!(body.contains("<L:version-count>2</L:version-count>"));
}

#[tokio::test]
async fn test_get_headers() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{S1}/page.html");
    alice.put_ok(&path, "<p>hi</p>").await;

    let resp = alice.get(&path).await;
    assert_status(resp.status(), StatusCode::OK, "GET");
    let headers = resp.headers();
    assert_eq!(headers["content-type"], "text/html");
    assert_eq!(headers["content-length"], "9");
    assert!(headers.contains_key("etag"));
    assert!(headers["last-modified"].to_str().unwrap().ends_with("GMT"));
}

#[tokio::test]
async fn test_declared_content_type_kept() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{S1}/data.bin");

    let resp = alice
        .request(Method::PUT, &path)
        .header("Content-Type", "application/x-custom")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::CREATED, "PUT with type");

    let resp = alice.get(&path).await;
    assert_eq!(resp.headers()["content-type"], "application/x-custom");
}

#[tokio::test]
async fn test_head_has_no_body() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{S1}/head.txt");
    alice.put_ok(&path, "twelve bytes").await;

    let resp = alice.request(Method::HEAD, &path).send().await.unwrap();
    assert_status(resp.status(), StatusCode::OK, "HEAD");
    assert_eq!(resp.headers()["content-length"], "12");
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_collection_lists_children() {
    let server = TestServer::start().await;
    let alice = server.alice();
    alice.mkcol_ok(&format!("{S1}/docs")).await;
    alice.put_ok(&format!("{S1}/readme.md"), "# hi").await;

    let resp = alice.get(S1).await;
    assert_status(resp.status(), StatusCode::OK, "GET collection");
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    let html = resp.text().await.unwrap();
    assert!(html.contains("/webdav/personal/s1/docs/"));
    assert!(html.contains("/webdav/personal/s1/readme.md"));
}

#[tokio::test]
async fn test_put_into_missing_parent_conflicts() {
    let server = TestServer::start().await;

    let resp = server.alice().put(&format!("{S1}/nope/file.txt"), "x").await;
    assert_status(resp.status(), StatusCode::CONFLICT, "PUT without parent");
}

#[tokio::test]
async fn test_put_outside_space_not_allowed() {
    let server = TestServer::start().await;
    let alice = server.alice();

    let resp = alice.put("/webdav/personal", "x").await;
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "PUT on scope");

    let resp = alice.put(S1, "x").await;
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "PUT on space root");
}

#[tokio::test]
async fn test_put_too_large() {
    let config = DavConfig {
        max_upload_bytes: 16,
        ..DavConfig::default()
    };
    let server = TestServer::with_config(config).await;

    let resp = server.alice().put(&format!("{S1}/big.bin"), vec![0u8; 64]).await;
    assert_status(resp.status(), StatusCode::PAYLOAD_TOO_LARGE, "oversized PUT");
    assert_not_found(&server.alice(), &format!("{S1}/big.bin")).await;
}

// ==================== Permissions ====================

#[tokio::test]
async fn test_viewer_reads_but_cannot_write() {
    let server = TestServer::start().await;
    let path = format!("{S1}/shared.txt");
    server.alice().put_ok(&path, "shared").await;

    let carol = server.as_user(CAROL);
    assert_file_content(&carol, &path, b"shared").await;

    let resp = carol.put(&path, "changed").await;
    assert_status(resp.status(), StatusCode::FORBIDDEN, "viewer PUT");
    let resp = carol.delete(&path).await;
    assert_status(resp.status(), StatusCode::FORBIDDEN, "viewer DELETE");
    let resp = carol.mkcol(&format!("{S1}/mine")).await;
    assert_status(resp.status(), StatusCode::FORBIDDEN, "viewer MKCOL");
}

#[tokio::test]
async fn test_non_member_sees_nothing() {
    let server = TestServer::start().await;
    server.alice().put_ok(&format!("{S1}/private.txt"), "secret").await;

    let dave = server.as_user(DAVE);
    assert_not_found(&dave, &format!("{S1}/private.txt")).await;
    assert_not_found(&dave, S1).await;
}

#[tokio::test]
async fn test_enterprise_space_editor() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{TEAM}/plan.txt");

    alice.put_ok(&path, "q3").await;
    assert_file_content(&server.as_user(ADMIN), &path, b"q3").await;
    assert_not_found(&server.bob(), &path).await;
}

// ==================== MKCOL ====================

#[tokio::test]
async fn test_mkcol() {
    let server = TestServer::start().await;
    let alice = server.alice();

    alice.mkcol_ok(&format!("{S1}/a")).await;
    alice.mkcol_ok(&format!("{S1}/a/b")).await;

    let resp = alice.mkcol(&format!("{S1}/a")).await;
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "MKCOL existing");

    let resp = alice.mkcol(&format!("{S1}/x/y")).await;
    assert_status(resp.status(), StatusCode::CONFLICT, "MKCOL without parent");

    let resp = alice.mkcol(S1).await;
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "MKCOL space root");

    let resp = alice.mkcol("/elsewhere/dir").await;
    assert_status(resp.status(), StatusCode::CONFLICT, "MKCOL outside prefix");
}

#[tokio::test]
async fn test_mkcol_with_body_rejected() {
    let server = TestServer::start().await;

    let resp = server
        .alice()
        .request(Method::from_bytes(b"MKCOL").unwrap(), &format!("{S1}/withbody"))
        .body("<x/>")
        .send()
        .await
        .unwrap();
    assert_status(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE, "MKCOL body");
}

#[tokio::test]
async fn test_mkcol_over_file_not_allowed() {
    let server = TestServer::start().await;
    let alice = server.alice();
    alice.put_ok(&format!("{S1}/taken"), "file").await;

    let resp = alice.mkcol(&format!("{S1}/taken")).await;
    assert_status(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "MKCOL over file");
}

// ==================== DELETE ====================

#[tokio::test]
async fn test_delete_file_purges_content() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let path = format!("{S1}/gone.txt");
    alice.put_ok(&path, "v1").await;
    alice.put_ok(&path, "v2").await;
    assert_eq!(server.bytes.len(), 2);

    alice.delete_ok(&path).await;
    assert_not_found(&alice, &path).await;
    assert!(server.bytes.is_empty());
}

#[tokio::test]
async fn test_delete_collection_recursive() {
    let server = TestServer::start().await;
    let alice = server.alice();
    alice.mkcol_ok(&format!("{S1}/tree")).await;
    alice.mkcol_ok(&format!("{S1}/tree/branch")).await;
    alice.put_ok(&format!("{S1}/tree/branch/leaf.txt"), "leaf").await;

    alice.delete_ok(&format!("{S1}/tree")).await;
    assert_not_found(&alice, &format!("{S1}/tree/branch/leaf.txt")).await;
    assert_eq!(server.catalog.folder_count(), 0);
    assert_eq!(server.catalog.file_count(), 0);
}

#[tokio::test]
async fn test_delete_missing_and_roots() {
    let server = TestServer::start().await;
    let alice = server.alice();

    let resp = alice.delete(&format!("{S1}/missing")).await;
    assert_status(resp.status(), StatusCode::NOT_FOUND, "DELETE missing");

    let resp = alice.delete(S1).await;
    assert_status(resp.status(), StatusCode::FORBIDDEN, "DELETE space root");

    let resp = alice.delete("/webdav/personal").await;
    assert_status(resp.status(), StatusCode::FORBIDDEN, "DELETE scope");

    let resp = alice.delete("/webdav/archive/x").await;
    assert_status(resp.status(), StatusCode::NOT_FOUND, "DELETE unknown scope");
}

// ==================== Paths ====================

#[tokio::test]
async fn test_encoded_names_round_trip() {
    let server = TestServer::start().await;
    let alice = server.alice();

    alice
        .put_ok(&format!("{S1}/with%20space%20%C3%A9.txt"), "encoded")
        .await;
    assert_file_content(&alice, &format!("{S1}/with%20space%20%C3%A9.txt"), b"encoded").await;

    let (_, body) = alice.propfind_body(S1, "1").await;
    assert!(body.contains("with%20space%20%C3%A9.txt"), "{body}");
}

#[tokio::test]
async fn test_dot_segments_normalized() {
    let server = TestServer::start().await;
    let alice = server.alice();
    alice.put_ok(&format!("{S1}/dots.txt"), "dots").await;

    assert_file_content(&alice, &format!("{S1}/sub/../dots.txt"), b"dots").await;
    assert_file_content(&alice, &format!("{S1}/./dots.txt"), b"dots").await;
}
