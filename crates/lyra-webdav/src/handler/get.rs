//! GET and HEAD.
//!
//! Leaves are served as raw bytes. Collections get a small HTML index with a
//! parent link followed by one link per child.

use bytes::Bytes;
use hyper::StatusCode;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderValue, LAST_MODIFIED};
use lyra_store::{Action, EntryRef, FileRecord};
use quick_xml::escape::escape;
use std::fmt::Write as _;

use super::{DavResponse, RequestContext, response, set_header};
use crate::error::DavResult;
use crate::path::encode_path;
use crate::resource::Resource;
use crate::tree::{Expand, Target};
use crate::xml::http_date;

pub(super) async fn get(ctx: &RequestContext<'_>, head: bool) -> DavResult<DavResponse> {
    let expand = if head { Expand::None } else { Expand::Children };
    let resource = match ctx.target().await? {
        Some(Target::File(space, file)) => {
            let entry = EntryRef::File {
                space: space.id,
                file: file.id,
            };
            ctx.authorize(&entry, Action::Read).await?;
            return leaf(ctx, &file, head).await;
        }
        Some(target) => {
            ctx.dav
                .tree
                .resource(target, ctx.loc.path.clone(), expand)
                .await?
        }
        None => ctx.build(expand).await?,
    };
    ctx.authorize(&resource.backing, Action::Read).await?;

    let body = if head {
        Bytes::new()
    } else {
        Bytes::from(listing(&resource))
    };
    let mut response = response(StatusCode::OK, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    Ok(response)
}

async fn leaf(ctx: &RequestContext<'_>, file: &FileRecord, head: bool) -> DavResult<DavResponse> {
    let resource = Resource::file(file, ctx.loc.path.clone());
    let body = if head {
        Bytes::new()
    } else {
        let data = ctx.dav.bytes.read(&file.storage_key).await?;
        ctx.dav.stats.record_read(data.len() as u64);
        data
    };

    let mut response = response(StatusCode::OK, body);
    set_header(&mut response, CONTENT_TYPE, resource.reported_content_type())?;
    set_header(&mut response, CONTENT_LENGTH, &file.size.to_string())?;
    if let Some(etag) = &resource.etag {
        set_header(&mut response, ETAG, etag)?;
    }
    if let Some(modified) = resource.modified_at {
        set_header(&mut response, LAST_MODIFIED, &http_date(modified))?;
    }
    Ok(response)
}

fn listing(resource: &Resource) -> String {
    let title = escape(resource.path.as_str());
    let mut html = format!(
        "<!DOCTYPE html>\n\
         <html><head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n\
         <body><h1>Index of {title}</h1>\n<ul>\n"
    );
    if let Some((parent, _)) = resource.path.rsplit_once('/')
        && !parent.is_empty()
    {
        let href = format!("{}/", encode_path(parent));
        let _ = writeln!(html, "<li><a href=\"{}\">..</a></li>", escape(href.as_str()));
    }
    for child in resource.children().unwrap_or_default() {
        let suffix = if child.is_collection() { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}{suffix}</a></li>",
            escape(child.listing_href().as_str()),
            escape(child.name.as_str()),
        );
    }
    html.push_str("</ul></body></html>\n");
    html
}
