//! WebDAV XML bodies.
//!
//! Rendering covers `multistatus` (PROPFIND), `prop/lockdiscovery` (LOCK) and
//! `error` documents. Parsing covers the `lockinfo` body of a LOCK request.
//! Everything uses the `D:` prefix for the `DAV:` namespace and `L:` for
//! Lyra's own properties.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{DavError, DavResult};
use crate::lock::{Lock, LockType};
use crate::resource::Resource;

pub const DAV_NS: &str = "DAV:";
pub const LYRA_NS: &str = "urn:lyra:webdav";

/// Content type of every XML response.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// RFC 1123 date as used by `getlastmodified` and `Last-Modified`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> DavResult<Self> {
        let mut writer = Writer::new(Vec::with_capacity(1024));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(Self { writer })
    }

    fn open(&mut self, name: &str) -> DavResult<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(())
    }

    fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> DavResult<()> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> DavResult<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str) -> DavResult<()> {
        self.writer.write_event(Event::Empty(BytesStart::new(name)))?;
        Ok(())
    }

    fn text(&mut self, name: &str, text: &str) -> DavResult<()> {
        self.open(name)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// `<outer><inner/></outer>`
    fn wrapped_empty(&mut self, outer: &str, inner: &str) -> DavResult<()> {
        self.open(outer)?;
        self.empty(inner)?;
        self.close(outer)
    }

    fn finish(self) -> Bytes {
        Bytes::from(self.writer.into_inner())
    }
}

/// One `response` element of a multistatus document.
#[derive(Debug)]
pub struct PropEntry<'a> {
    pub resource: &'a Resource,
    pub href: String,
    /// Active locks that apply to the resource.
    pub locks: Vec<Lock>,
}

/// Render a PROPFIND multistatus document.
pub fn multistatus(entries: &[PropEntry<'_>]) -> DavResult<Bytes> {
    let mut out = XmlOut::new()?;
    out.open_with("D:multistatus", &[("xmlns:D", DAV_NS), ("xmlns:L", LYRA_NS)])?;
    for entry in entries {
        write_response(&mut out, entry)?;
    }
    out.close("D:multistatus")?;
    Ok(out.finish())
}

fn write_response(out: &mut XmlOut, entry: &PropEntry<'_>) -> DavResult<()> {
    let res = entry.resource;
    out.open("D:response")?;
    out.text("D:href", &entry.href)?;
    out.open("D:propstat")?;
    out.open("D:prop")?;

    out.text("D:displayname", &res.name)?;
    if res.is_collection() {
        out.wrapped_empty("D:resourcetype", "D:collection")?;
    } else {
        out.empty("D:resourcetype")?;
    }
    out.text("D:getcontenttype", res.reported_content_type())?;
    if !res.is_collection() {
        out.text("D:getcontentlength", &res.size.to_string())?;
    }
    if let Some(modified) = res.modified_at {
        out.text("D:getlastmodified", &http_date(modified))?;
    }
    if let Some(created) = res.created_at {
        out.text("D:creationdate", &created.to_rfc3339_opts(SecondsFormat::Secs, true))?;
    }
    if let Some(etag) = &res.etag {
        out.text("D:getetag", etag)?;
    }

    out.open("D:supportedlock")?;
    for scope in [LockType::Exclusive, LockType::Shared] {
        out.open("D:lockentry")?;
        out.wrapped_empty("D:lockscope", &format!("D:{}", scope.as_str()))?;
        out.wrapped_empty("D:locktype", "D:write")?;
        out.close("D:lockentry")?;
    }
    out.close("D:supportedlock")?;

    if entry.locks.is_empty() {
        out.empty("D:lockdiscovery")?;
    } else {
        out.open("D:lockdiscovery")?;
        for lock in &entry.locks {
            write_active_lock(out, lock)?;
        }
        out.close("D:lockdiscovery")?;
    }

    if let Some(versions) = &res.versions {
        out.text("L:version-number", &versions.current.to_string())?;
        out.text("L:version-count", &versions.count.to_string())?;
        if let Some(comment) = &versions.latest_comment {
            out.text("L:version-comment", comment)?;
        }
        if let Some(at) = versions.latest_at {
            out.text("L:version-date", &http_date(at))?;
        }
    }

    out.close("D:prop")?;
    out.text("D:status", "HTTP/1.1 200 OK")?;
    out.close("D:propstat")?;
    out.close("D:response")
}

fn write_active_lock(out: &mut XmlOut, lock: &Lock) -> DavResult<()> {
    out.open("D:activelock")?;
    out.wrapped_empty("D:locktype", &format!("D:{}", element_name(&lock.scope)))?;
    out.wrapped_empty("D:lockscope", &format!("D:{}", lock.lock_type.as_str()))?;
    out.text("D:depth", &lock.depth.to_string())?;
    out.text("D:owner", &lock.owner)?;
    out.text("D:timeout", &format!("Second-{}", lock.timeout_secs))?;
    out.open("D:locktoken")?;
    out.text("D:href", &lock.token)?;
    out.close("D:locktoken")?;
    out.open("D:lockroot")?;
    out.text("D:href", &crate::path::encode_path(&lock.resource_path))?;
    out.close("D:lockroot")?;
    out.close("D:activelock")
}

/// Lock scopes come from client XML; anything that is not a plain name renders as `write`.
fn element_name(scope: &str) -> &str {
    let valid = !scope.is_empty()
        && scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && scope.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if valid { scope } else { "write" }
}

/// Render the body of a successful LOCK.
pub fn lock_discovery(lock: &Lock) -> DavResult<Bytes> {
    let mut out = XmlOut::new()?;
    out.open_with("D:prop", &[("xmlns:D", DAV_NS)])?;
    out.open("D:lockdiscovery")?;
    write_active_lock(&mut out, lock)?;
    out.close("D:lockdiscovery")?;
    out.close("D:prop")?;
    Ok(out.finish())
}

/// Render a `D:error` body naming one precondition element.
pub fn error_body(condition: &str) -> DavResult<Bytes> {
    let mut out = XmlOut::new()?;
    out.open_with("D:error", &[("xmlns:D", DAV_NS)])?;
    out.empty(&format!("D:{condition}"))?;
    out.close("D:error")?;
    Ok(out.finish())
}

/// Fields of a LOCK request's `lockinfo` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockInfo {
    pub lock_type: Option<LockType>,
    /// Local name of the `locktype` child, e.g. `write`.
    pub scope: Option<String>,
    pub owner: Option<String>,
}

/// Parse a `lockinfo` body. An empty body yields `None` (a refresh request).
pub fn parse_lock_info(body: &[u8]) -> DavResult<Option<LockInfo>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let text =
        std::str::from_utf8(body).map_err(|_| DavError::bad_request("lockinfo is not UTF-8"))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut info = LockInfo::default();
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut owner_text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DavError::bad_request(format!("malformed lockinfo: {e}")))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    seen_root = name == "lockinfo";
                }
                note_element(&mut info, &stack, &name);
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    seen_root = name == "lockinfo";
                }
                note_element(&mut info, &stack, &name);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("owner") && !stack.iter().any(|s| s == "owner") {
                    let owner = owner_text.trim();
                    if !owner.is_empty() {
                        info.owner = Some(owner.to_string());
                    }
                }
            }
            Event::Text(t) => {
                if stack.iter().any(|s| s == "owner") {
                    owner_text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => {
                if !stack.is_empty() {
                    return Err(DavError::bad_request("malformed lockinfo: unclosed elements"));
                }
                break;
            }
            _ => {}
        }
    }

    if !seen_root {
        return Err(DavError::bad_request("expected a lockinfo element"));
    }
    Ok(Some(info))
}

fn note_element(info: &mut LockInfo, stack: &[String], name: &str) {
    match stack.last().map(String::as_str) {
        Some("lockscope") => match name {
            "exclusive" => info.lock_type = Some(LockType::Exclusive),
            "shared" => info.lock_type = Some(LockType::Shared),
            _ => {}
        },
        Some("locktype") => info.scope = Some(name.to_string()),
        _ => {}
    }
}
