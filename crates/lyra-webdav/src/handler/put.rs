//! PUT: create a leaf or record a new version of it.

use bytes::Bytes;
use hyper::StatusCode;
use hyper::header::ETAG;
use lyra_store::{Action, EntryRef, NewFile, NewVersion, StorageKey, content_checksum};
use tracing::{debug, info};

use super::{DavResponse, RequestContext, response, set_header};
use crate::error::{DavError, DavResult};
use crate::resource::Resource;
use crate::tree::Target;

pub(super) async fn put(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let path = &ctx.loc.path;
    if ctx.body.len() > ctx.dav.config.max_upload_bytes {
        return Err(DavError::PayloadTooLarge);
    }
    ctx.ensure_unlocked(path)?;

    let data = ctx.body.clone();
    let checksum = content_checksum(&data);
    let size = data.len() as u64;

    match ctx.target().await? {
        Some(Target::File(space, file)) => {
            let entry = EntryRef::File {
                space: space.id,
                file: file.id,
            };
            ctx.authorize(&entry, Action::Write).await?;

            let key = store(ctx, data).await?;
            let version = NewVersion {
                size,
                content_type: content_type(ctx, &file.name),
                checksum,
                storage_key: key.clone(),
                comment: None,
                created_by: ctx.principal.id,
            };
            let updated = match ctx.dav.catalog.add_version(file.id, version).await {
                Ok(updated) => updated,
                Err(e) => {
                    ctx.purge(&[key]).await;
                    return Err(e.into());
                }
            };
            info!(path = %path, version = updated.current_version, size, "Stored new version");
            with_etag(StatusCode::NO_CONTENT, &Resource::file(&updated, path.clone()))
        }
        Some(_) => Err(DavError::MethodNotAllowed("PUT on a collection".into())),
        None => {
            let Some((_, name)) = ctx.loc.split_relative() else {
                return Err(DavError::MethodNotAllowed("PUT outside a space".into()));
            };
            let parent = ctx
                .dav
                .tree
                .parent(&ctx.loc, &ctx.principal)
                .await?
                .ok_or_else(|| DavError::conflict("parent collection does not exist"))?;
            ctx.authorize(&parent.entry(), Action::Create).await?;

            let key = store(ctx, data).await?;
            let new_file = NewFile {
                space: parent.space.id,
                folder: parent.folder,
                name: name.to_string(),
                size,
                content_type: content_type(ctx, name),
                checksum,
                storage_key: key.clone(),
                created_by: ctx.principal.id,
            };
            let created = match ctx.dav.catalog.create_file(new_file).await {
                Ok(created) => created,
                Err(e) => {
                    ctx.purge(&[key]).await;
                    return Err(e.into());
                }
            };
            info!(path = %path, size, "Created file");
            with_etag(StatusCode::CREATED, &Resource::file(&created, path.clone()))
        }
    }
}

async fn store(ctx: &RequestContext<'_>, data: Bytes) -> DavResult<StorageKey> {
    let key = StorageKey::generate();
    let len = data.len() as u64;
    ctx.dav.bytes.write(&key, data).await?;
    ctx.dav.stats.record_write(len);
    debug!(key = %key, len, "Stored content");
    Ok(key)
}

fn with_etag(status: StatusCode, resource: &Resource) -> DavResult<DavResponse> {
    let mut response = response(status, Bytes::new());
    if let Some(etag) = &resource.etag {
        set_header(&mut response, ETAG, etag)?;
    }
    Ok(response)
}

/// Declared content type, or a guess from the file extension.
fn content_type(ctx: &RequestContext<'_>, name: &str) -> String {
    match ctx.header("content-type") {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => guess_content_type(name).to_string(),
    }
}

pub(crate) fn guess_content_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
