use bytes::Bytes;
use hyper::StatusCode;
use lyra_store::Action;
use tracing::info;

use super::{DavResponse, RequestContext, response};
use crate::error::{DavError, DavResult};
use crate::path::Scope;

/// MKCOL: create a folder below an existing collection.
pub(super) async fn mkcol(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let loc = &ctx.loc;
    if !ctx.body.is_empty() {
        return Err(DavError::UnsupportedMediaType);
    }
    let Some((_, name)) = loc.split_relative() else {
        if loc.scope == Scope::Unknown {
            return Err(DavError::conflict("no parent collection"));
        }
        return Err(DavError::MethodNotAllowed(
            "collections can only be created inside a space".into(),
        ));
    };
    ctx.ensure_unlocked(&loc.path)?;

    if ctx.target().await?.is_some() {
        return Err(DavError::MethodNotAllowed(format!("{} already exists", loc.path)));
    }
    let parent = ctx
        .dav
        .tree
        .parent(loc, &ctx.principal)
        .await?
        .ok_or_else(|| DavError::conflict("parent collection does not exist"))?;
    ctx.authorize(&parent.entry(), Action::Create).await?;

    let folder = ctx
        .dav
        .catalog
        .create_folder(parent.space.id, parent.folder, name, ctx.principal.id)
        .await?;
    info!(path = %loc.path, folder = %folder.id, "Created collection");

    Ok(response(StatusCode::CREATED, Bytes::new()))
}
