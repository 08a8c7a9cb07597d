use bytes::Bytes;
use hyper::StatusCode;
use hyper::header::{ALLOW, HeaderName, HeaderValue};

use super::{DAV_HEADER, DavResponse, response};
use crate::method::DavMethod;

const MS_AUTHOR_VIA: HeaderName = HeaderName::from_static("ms-author-via");

/// Capability discovery. Needs no credentials.
pub(super) fn options() -> DavResponse {
    let mut response = response(StatusCode::OK, Bytes::new());
    let headers = response.headers_mut();
    headers.insert(ALLOW, HeaderValue::from_static(DavMethod::ALLOW));
    headers.insert(DAV_HEADER, HeaderValue::from_static("1, 2"));
    headers.insert(MS_AUTHOR_VIA, HeaderValue::from_static("DAV"));
    response
}
