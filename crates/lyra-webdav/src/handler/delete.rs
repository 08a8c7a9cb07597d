use bytes::Bytes;
use hyper::StatusCode;
use lyra_store::Action;
use tracing::info;

use super::{DavResponse, RequestContext, response};
use crate::error::{DavError, DavResult};
use crate::path::Scope;
use crate::tree::Target;

/// DELETE a leaf, or a collection with everything below it.
pub(super) async fn delete(ctx: &RequestContext<'_>) -> DavResult<DavResponse> {
    let loc = &ctx.loc;
    if !loc.is_in_space() {
        if loc.scope == Scope::Unknown {
            return Err(DavError::not_found(&loc.path));
        }
        return Err(DavError::forbidden("spaces and namespace roots cannot be deleted"));
    }
    ctx.ensure_subtree_unlocked(&loc.path)?;

    let target = ctx
        .target()
        .await?
        .ok_or_else(|| DavError::not_found(&loc.path))?;
    ctx.authorize(&target.entry(), Action::Delete).await?;

    let keys = match &target {
        Target::File(_, file) => ctx.dav.catalog.delete_file(file.id).await?,
        Target::Folder(_, folder) => ctx.dav.catalog.delete_folder(folder.id).await?,
        Target::SpaceRoot(_) => {
            return Err(DavError::forbidden("spaces cannot be deleted"));
        }
    };
    ctx.purge(&keys).await;
    let released = ctx.release_own_locks(&loc.path);
    info!(path = %loc.path, versions = keys.len(), released, "Deleted");

    Ok(response(StatusCode::NO_CONTENT, Bytes::new()))
}
