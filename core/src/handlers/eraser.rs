//! Account eraser.
//!
//! Removes everything the caller owns, then the caller's auth identity.
//! Order: profiles, saved quotes, conversations, storage objects, identity.
//! The identity goes last so that a failed step leaves it resolvable and the
//! client can retry.

use solace_protocol::{DeleteAccountResponse, ErrorCode};

use super::HandlerContext;
use crate::HandlerError;
use crate::backend::{Identity, Table};
use crate::identity::{candidate_ids, storage_prefix};

pub async fn handle(
    ctx: HandlerContext<'_>,
    caller: &Identity,
) -> Result<DeleteAccountResponse, HandlerError> {
    let rows = ctx.services.rows.as_ref();
    let owners = candidate_ids(&caller.id);

    for (table, code) in [
        (Table::Profiles, ErrorCode::DeleteProfileFailed),
        (Table::SavedQuotes, ErrorCode::DeleteQuotesFailed),
        (Table::Conversations, ErrorCode::DeleteConversationsFailed),
    ] {
        rows.delete_owned(table, &owners)
            .await
            .map_err(HandlerError::step(code))?;
        tracing::debug!("deleted {} rows", table.as_str());
    }

    delete_objects(ctx, &storage_prefix(&caller.id)).await?;

    ctx.services
        .identity
        .delete_user(&caller.id)
        .await
        .map_err(HandlerError::step(ErrorCode::DeleteUserFailed))?;

    tracing::info!("account deleted");
    Ok(DeleteAccountResponse { success: true })
}

/// Removes up to one listing page of objects under `prefix`.
async fn delete_objects(ctx: HandlerContext<'_>, prefix: &str) -> Result<(), HandlerError> {
    let objects = ctx.services.objects.as_ref();
    let names = objects
        .list(prefix, ctx.config.storage_list_limit)
        .await
        .map_err(HandlerError::step(ErrorCode::DeleteStorageFailed))?;
    if names.is_empty() {
        return Ok(());
    }

    let paths: Vec<String> = names.iter().map(|name| format!("{prefix}/{name}")).collect();
    objects
        .remove(&paths)
        .await
        .map_err(HandlerError::step(ErrorCode::DeleteStorageFailed))?;
    tracing::debug!("removed {} stored objects", paths.len());
    Ok(())
}
