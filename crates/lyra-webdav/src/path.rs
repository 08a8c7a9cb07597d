//! Request path resolution.
//!
//! Every request URI is translated once into a [`Location`]: which namespace
//! it addresses, which space inside that namespace, and the path relative to
//! the space root. Resolution is total. Paths that do not name anything come
//! back as [`Scope::Unknown`] and are answered with "not found" downstream.
//!
//! ```text
//! /webdav                              -> Root
//! /webdav/personal                     -> Personal,   space = None
//! /webdav/enterprise/team              -> Enterprise, space = "team",  relative = ""
//! /webdav/personal/s1/docs/a.txt       -> Personal,   space = "s1",    relative = "docs/a.txt"
//! /webdav/elsewhere/x                  -> Unknown
//! ```

use lyra_store::SpaceKind;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters left unescaped in hrefs (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Namespace selected by the first segment after the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Root,
    Personal,
    Enterprise,
    Unknown,
}

impl Scope {
    pub fn kind(self) -> Option<SpaceKind> {
        match self {
            Scope::Personal => Some(SpaceKind::Personal),
            Scope::Enterprise => Some(SpaceKind::Enterprise),
            Scope::Root | Scope::Unknown => None,
        }
    }
}

impl From<SpaceKind> for Scope {
    fn from(kind: SpaceKind) -> Self {
        match kind {
            SpaceKind::Personal => Scope::Personal,
            SpaceKind::Enterprise => Scope::Enterprise,
        }
    }
}

/// Immutable descriptor of what a request path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub scope: Scope,
    /// Second segment, when present.
    pub space_name: Option<String>,
    /// Remaining segments joined with `/`; empty when none.
    pub relative_path: String,
    /// Path as received, before decoding.
    pub raw_path: String,
    /// Canonical decoded path: prefix plus normalized segments, no trailing slash.
    pub path: String,
}

impl Location {
    pub fn is_root(&self) -> bool {
        self.scope == Scope::Root
    }

    /// True when the location names a space root (`/webdav/personal/s1`).
    pub fn is_space_root(&self) -> bool {
        self.scope.kind().is_some() && self.space_name.is_some() && self.relative_path.is_empty()
    }

    /// True when the location names an entry inside a space.
    pub fn is_in_space(&self) -> bool {
        self.scope.kind().is_some() && self.space_name.is_some() && !self.relative_path.is_empty()
    }

    /// Last segment of the canonical path (empty for the root).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// For entries inside a space, the parent's relative path and the entry name.
    pub fn split_relative(&self) -> Option<(&str, &str)> {
        if self.relative_path.is_empty() {
            return None;
        }
        Some(match self.relative_path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", self.relative_path.as_str()),
        })
    }

    /// True when `self` is `other` or lies below it.
    pub fn is_within(&self, other: &Location) -> bool {
        self.path == other.path || self.path.starts_with(&format!("{}/", other.path))
    }
}

/// Resolves request paths below a fixed prefix.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Normalized prefix: leading slash, no trailing slash, empty for "/".
    prefix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("/webdav")
    }
}

impl PathResolver {
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonical path of the protocol root.
    pub fn root_path(&self) -> &str {
        if self.prefix.is_empty() { "/" } else { &self.prefix }
    }

    /// Resolve a raw request path. Never fails.
    pub fn resolve(&self, raw: &str) -> Location {
        let path_only = raw.split(['?', '#']).next().unwrap_or_default();

        let mut segments: Vec<String> = Vec::new();
        for segment in path_only.split('/') {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            match decoded.as_ref() {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }

        let prefix_len = self.prefix_segments();
        let under_prefix = segments.len() >= prefix_len
            && self
                .prefix
                .split('/')
                .filter(|s| !s.is_empty())
                .zip(&segments)
                .all(|(expected, actual)| expected == actual);

        if !under_prefix {
            return Location {
                scope: Scope::Unknown,
                space_name: None,
                relative_path: String::new(),
                raw_path: raw.to_string(),
                path: format!("/{}", segments.join("/")),
            };
        }

        let rest = &segments[prefix_len..];
        let scope = match rest.first().map(String::as_str) {
            None => Scope::Root,
            Some("personal") => Scope::Personal,
            Some("enterprise") => Scope::Enterprise,
            Some(_) => Scope::Unknown,
        };
        let space_name = rest.get(1).cloned();
        let relative_path = rest.get(2..).map(|tail| tail.join("/")).unwrap_or_default();

        let path = if rest.is_empty() {
            self.root_path().to_string()
        } else {
            format!("{}/{}", self.prefix, rest.join("/"))
        };

        Location {
            scope,
            space_name,
            relative_path,
            raw_path: raw.to_string(),
            path,
        }
    }

    /// Canonical path of a space root.
    pub fn space_path(&self, kind: SpaceKind, space: &str) -> String {
        format!("{}/{}/{}", self.prefix, kind.segment(), space)
    }

    /// Canonical path of a namespace listing.
    pub fn scope_path(&self, kind: SpaceKind) -> String {
        format!("{}/{}", self.prefix, kind.segment())
    }

    fn prefix_segments(&self) -> usize {
        self.prefix.split('/').filter(|s| !s.is_empty()).count()
    }
}

/// Join a canonical parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Percent-encode each segment of a decoded path.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(raw: &str) -> Location {
        PathResolver::default().resolve(raw)
    }

    #[test]
    fn test_prefix_only_is_root() {
        for raw in ["/webdav", "/webdav/", "/webdav//", "webdav"] {
            let loc = resolve(raw);
            assert_eq!(loc.scope, Scope::Root, "{raw}");
            assert_eq!(loc.space_name, None);
            assert_eq!(loc.path, "/webdav");
        }
    }

    #[test]
    fn test_full_path() {
        let loc = resolve("/webdav/personal/space1/docs/a.txt");
        assert_eq!(loc.scope, Scope::Personal);
        assert_eq!(loc.space_name.as_deref(), Some("space1"));
        assert_eq!(loc.relative_path, "docs/a.txt");
        assert_eq!(loc.path, "/webdav/personal/space1/docs/a.txt");
        assert_eq!(loc.name(), "a.txt");
        assert_eq!(loc.split_relative(), Some(("docs", "a.txt")));
        assert!(loc.is_in_space());
    }

    #[test]
    fn test_scope_and_space_roots() {
        let scope = resolve("/webdav/enterprise/");
        assert_eq!(scope.scope, Scope::Enterprise);
        assert_eq!(scope.space_name, None);
        assert_eq!(scope.relative_path, "");

        let space = resolve("/webdav/enterprise/team");
        assert!(space.is_space_root());
        assert_eq!(space.split_relative(), None);
    }

    #[test]
    fn test_unknown_scope() {
        assert_eq!(resolve("/webdav/shared/x").scope, Scope::Unknown);
        assert_eq!(resolve("/other/personal/x").scope, Scope::Unknown);
        assert_eq!(resolve("/webdavx/personal").scope, Scope::Unknown);
        assert_eq!(resolve("").scope, Scope::Unknown);
    }

    #[test]
    fn test_percent_decoding_and_dot_segments() {
        let loc = resolve("/webdav/personal/s1/My%20Docs/../report%C3%A9.txt?x=1");
        assert_eq!(loc.relative_path, "report\u{e9}.txt");
        assert_eq!(loc.raw_path, "/webdav/personal/s1/My%20Docs/../report%C3%A9.txt?x=1");
        assert_eq!(encode_path(&loc.path), "/webdav/personal/s1/report%C3%A9.txt");

        // Dot segments never climb above the prefix
        assert_eq!(resolve("/webdav/../../etc").scope, Scope::Unknown);
    }

    #[test]
    fn test_root_mounted_resolver() {
        let resolver = PathResolver::new("/");
        assert_eq!(resolver.resolve("/").scope, Scope::Root);
        assert_eq!(resolver.resolve("/").path, "/");
        let loc = resolver.resolve("/personal/s1/a");
        assert_eq!(loc.scope, Scope::Personal);
        assert_eq!(loc.path, "/personal/s1/a");
    }

    #[test]
    fn test_is_within() {
        let parent = resolve("/webdav/personal/s1/docs");
        assert!(resolve("/webdav/personal/s1/docs/a").is_within(&parent));
        assert!(resolve("/webdav/personal/s1/docs").is_within(&parent));
        assert!(!resolve("/webdav/personal/s1/docs2").is_within(&parent));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/webdav", "personal"), "/webdav/personal");
        assert_eq!(join("/", "personal"), "/personal");
    }
}
