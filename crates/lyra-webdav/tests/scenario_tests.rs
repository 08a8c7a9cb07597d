//! End-to-end flows mixing several verbs and users.

mod common;

use common::{S1, TestServer, assert_file_content, assert_hrefs, assert_status, lock_token};
use reqwest::StatusCode;

/// Create, read, describe, lock out a second writer, unlock, let them in.
#[tokio::test]
async fn test_document_lifecycle() {
    let server = TestServer::start().await;
    let alice = server.alice();
    let bob = server.bob();
    let path = "/webdav/personal/s1/doc.txt";

    let resp = alice.put(path, "hello").await;
    assert_status(resp.status(), StatusCode::CREATED, "PUT new document");

    let resp = alice.get(path).await;
    assert_status(resp.status(), StatusCode::OK, "GET document");
    assert_eq!(resp.headers()["content-length"], "5");
    assert_eq!(resp.text().await.unwrap(), "hello");

    let (status, body) = alice.propfind_body(path, "0").await;
    assert_status(status, StatusCode::MULTI_STATUS, "PROPFIND document");
    assert_hrefs(&body, &[path]);
    assert!(body.contains("<D:getcontentlength>5</D:getcontentlength>"));

    let resp = alice.lock(path, "exclusive", "Second-60").await;
    assert_status(resp.status(), StatusCode::OK, "LOCK document");
    let token = lock_token(&resp);
    let body = resp.text().await.unwrap();
    assert!(body.contains(&format!("<D:href>{token}</D:href>")));

    let resp = bob.put(path, "bob was here").await;
    assert_status(resp.status(), StatusCode::LOCKED, "PUT by second user while locked");

    let resp = alice.unlock(path, &token).await;
    assert_status(resp.status(), StatusCode::NO_CONTENT, "UNLOCK by holder");

    let resp = bob.put(path, "bob was here").await;
    assert_status(resp.status(), StatusCode::NO_CONTENT, "PUT by second user after unlock");
    assert_file_content(&alice, path, b"bob was here").await;

    server.stop().await;
}

/// A small project tree is built, reorganised and cleaned up.
#[tokio::test]
async fn test_project_reorganisation() {
    let server = TestServer::start().await;
    let alice = server.alice();

    alice.mkcol_ok(&format!("{S1}/drafts")).await;
    alice.mkcol_ok(&format!("{S1}/final")).await;
    for name in ["one.md", "two.md", "three.md"] {
        alice.put_ok(&format!("{S1}/drafts/{name}"), format!("# {name}")).await;
    }

    // Promote one draft
    let resp = alice
        .move_(&format!("{S1}/drafts/two.md"), &format!("{S1}/final/two.md"), false)
        .await;
    assert_status(resp.status(), StatusCode::CREATED, "MOVE draft");

    // Snapshot the remaining drafts
    let resp = alice.copy(&format!("{S1}/drafts"), &format!("{S1}/backup"), false).await;
    assert_status(resp.status(), StatusCode::CREATED, "COPY drafts");

    alice.delete_ok(&format!("{S1}/drafts")).await;

    let (_, body) = alice.propfind_body(S1, "1").await;
    assert_hrefs(
        &body,
        &["/webdav/personal/s1", "/webdav/personal/s1/final/", "/webdav/personal/s1/backup/"],
    );
    let (_, body) = alice.propfind_body(&format!("{S1}/backup"), "1").await;
    assert_hrefs(
        &body,
        &[
            "/webdav/personal/s1/backup",
            "/webdav/personal/s1/backup/one.md",
            "/webdav/personal/s1/backup/three.md",
        ],
    );
    assert_file_content(&alice, &format!("{S1}/final/two.md"), b"# two.md").await;

    let stats = server.handler.stats().snapshot();
    assert!(stats.requests >= 10);
    assert!(stats.bytes_written > 0);
}
