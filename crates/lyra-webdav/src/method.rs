//! The supported verb set.

use hyper::Method;
use std::fmt;

/// Every verb the dispatcher routes. Anything else is answered with 405.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    Get,
    Head,
    Put,
    Delete,
    Mkcol,
    Copy,
    Move,
    Lock,
    Unlock,
    Propfind,
    Proppatch,
    Options,
}

impl DavMethod {
    pub const ALL: [DavMethod; 12] = [
        DavMethod::Get,
        DavMethod::Head,
        DavMethod::Put,
        DavMethod::Delete,
        DavMethod::Mkcol,
        DavMethod::Copy,
        DavMethod::Move,
        DavMethod::Lock,
        DavMethod::Unlock,
        DavMethod::Propfind,
        DavMethod::Proppatch,
        DavMethod::Options,
    ];

    /// Value of the `Allow` header.
    pub const ALLOW: &'static str =
        "GET, HEAD, PUT, DELETE, MKCOL, COPY, MOVE, LOCK, UNLOCK, PROPFIND, PROPPATCH, OPTIONS";

    pub fn from_method(method: &Method) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == method.as_str())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DavMethod::Get => "GET",
            DavMethod::Head => "HEAD",
            DavMethod::Put => "PUT",
            DavMethod::Delete => "DELETE",
            DavMethod::Mkcol => "MKCOL",
            DavMethod::Copy => "COPY",
            DavMethod::Move => "MOVE",
            DavMethod::Lock => "LOCK",
            DavMethod::Unlock => "UNLOCK",
            DavMethod::Propfind => "PROPFIND",
            DavMethod::Proppatch => "PROPPATCH",
            DavMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for DavMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
