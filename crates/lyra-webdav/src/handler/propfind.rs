use hyper::StatusCode;
use lyra_store::Action;

use super::{DavResponse, RequestContext, xml_response};
use crate::error::{DavError, DavResult};
use crate::tree::Expand;
use crate::xml::{self, PropEntry};

/// PROPFIND with allprop semantics. `Depth: infinity` is served as `1`.
pub(super) async fn propfind(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let expand = match ctx.header("depth") {
        Some("0") => Expand::None,
        None | Some("1") => Expand::Children,
        Some(v) if v.eq_ignore_ascii_case("infinity") => Expand::Children,
        Some(v) => return Err(DavError::bad_request(format!("invalid Depth: {v}"))),
    };

    let resource = ctx.build(expand).await?;
    ctx.authorize(&resource.backing, Action::Read).await?;

    let locks = &ctx.dav.locks;
    let mut entries = vec![PropEntry {
        resource: &resource,
        href: ctx.request_path.to_string(),
        locks: locks.locks_for(&resource.path),
    }];
    let children = resource
        .children()
        .filter(|_| expand == Expand::Children)
        .unwrap_or_default();
    for child in children {
        entries.push(PropEntry {
            resource: child,
            href: child.listing_href(),
            locks: locks.locks_for(&child.path),
        });
    }

    Ok(xml_response(StatusCode::MULTI_STATUS, xml::multistatus(&entries)?))
}
