//! Assertion helpers for WebDAV tests.

use reqwest::{Response, StatusCode};

use super::Session;

/// Assert that a file exists with the expected content.
pub async fn assert_file_content(session: &Session<'_>, path: &str, expected: &[u8]) {
    match session.get_bytes(path).await {
        Ok(actual) => {
            assert_eq!(
                actual.as_ref(),
                expected,
                "File content mismatch at {}: expected {} bytes, got {} bytes",
                path,
                expected.len(),
                actual.len()
            );
        }
        Err((status, body)) => {
            panic!(
                "Failed to read file {}: status={}, body={}",
                path, status, body
            );
        }
    }
}

/// Assert that a path returns 404.
pub async fn assert_not_found(session: &Session<'_>, path: &str) {
    let resp = session.get(path).await;
    assert_eq!(
        resp.status(),
        StatusCode::NOT_FOUND,
        "Expected 404 for {}, got {}",
        path,
        resp.status()
    );
}

/// Assert a specific status code.
pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "{}: expected status {}, got {}",
        context, expected, actual
    );
}

/// Token from a `Lock-Token: <...>` response header.
pub fn lock_token(resp: &Response) -> String {
    let value = resp
        .headers()
        .get("lock-token")
        .expect("Response has no Lock-Token header")
        .to_str()
        .expect("Lock-Token is not ASCII");
    value.trim_start_matches('<').trim_end_matches('>').to_string()
}

/// The `<D:href>` of every `<D:response>` in a multistatus body, in order.
pub fn hrefs(body: &str) -> Vec<String> {
    body.split("<D:response>")
        .skip(1)
        .filter_map(|response| response.split_once("<D:href>"))
        .filter_map(|(_, rest)| rest.split_once("</D:href>"))
        .map(|(href, _)| href.to_string())
        .collect()
}

/// Assert that a multistatus body lists exactly `expected` hrefs.
pub fn assert_hrefs(body: &str, expected: &[&str]) {
    assert_eq!(hrefs(body), expected, "Unexpected hrefs in multistatus: {}", body);
}
