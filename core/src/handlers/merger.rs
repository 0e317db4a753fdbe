//! Account merger.
//!
//! Re-homes the rows and files of an anonymous identity onto the caller's
//! newly created permanent identity. The merge only runs when it cannot
//! overwrite anything: the old identity must be anonymous and the new one
//! must own no rows yet.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use solace_protocol::{ErrorCode, MigrateAccountRequest, MigrateAccountResponse, SkipReason};

use super::HandlerContext;
use crate::HandlerError;
use crate::backend::{Identity, Table};
use crate::identity::{candidate_ids, canonical_id, same_identity, storage_prefix};

pub async fn handle(
    ctx: HandlerContext<'_>,
    caller: &Identity,
    body: &Bytes,
) -> Result<MigrateAccountResponse, HandlerError> {
    let request: MigrateAccountRequest = serde_json::from_slice(body)
        .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
    let old_id = request.old_user_id.trim();
    if old_id.is_empty() {
        return Err(HandlerError::InvalidRequest("oldUserId is empty".to_string()));
    }

    if same_identity(old_id, &caller.id) {
        tracing::info!("merge requested into the same identity, skipping");
        return Ok(MigrateAccountResponse::skipped(SkipReason::SameUser));
    }

    let old_user = match ctx.services.identity.user_by_id(old_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(HandlerError::OldUserNotFound),
        Err(err) => {
            tracing::warn!("admin lookup of old user failed: {err}");
            return Err(HandlerError::OldUserNotFound);
        }
    };
    if !old_user.is_anonymous {
        return Err(HandlerError::OldUserNotAnonymous);
    }

    let new_id = canonical_id(&caller.id);
    if !target_is_empty(ctx, &new_id).await? {
        tracing::info!("target identity already owns data, skipping merge");
        return Ok(MigrateAccountResponse::skipped(SkipReason::TargetNotEmpty));
    }

    let now = Utc::now();
    let old_owners = candidate_ids(old_id);
    let rows = ctx.services.rows.as_ref();
    rows.reassign_owner(Table::Profiles, &old_owners, &new_id, Some(now))
        .await
        .map_err(HandlerError::step(ErrorCode::MigrateProfileFailed))?;
    rows.reassign_owner(Table::Conversations, &old_owners, &new_id, None)
        .await
        .map_err(HandlerError::step(ErrorCode::MigrateConversationsFailed))?;
    rows.reassign_owner(Table::SavedQuotes, &old_owners, &new_id, None)
        .await
        .map_err(HandlerError::step(ErrorCode::MigrateQuotesFailed))?;

    let new_prefix = storage_prefix(&new_id);
    let files_failed = move_objects(ctx, &storage_prefix(old_id), &new_prefix).await;
    refresh_profile_image(ctx, &new_id, &new_prefix, now).await;

    tracing::info!("account merged ({files_failed} files not moved)");
    Ok(MigrateAccountResponse::migrated(files_failed))
}

/// True when `owner` has no profile, conversation or saved-quote rows.
async fn target_is_empty(ctx: HandlerContext<'_>, owner: &str) -> Result<bool, HandlerError> {
    for (table, code) in [
        (Table::Profiles, ErrorCode::CheckProfileFailed),
        (Table::Conversations, ErrorCode::CheckConversationsFailed),
        (Table::SavedQuotes, ErrorCode::CheckQuotesFailed),
    ] {
        let count = ctx
            .services
            .rows
            .count_owned(table, owner)
            .await
            .map_err(HandlerError::step(code))?;
        if count > 0 {
            tracing::debug!("target owns {count} {} rows", table.as_str());
            return Ok(false);
        }
    }
    Ok(true)
}

/// Moves every object under `from` to the same name under `to`, one at a
/// time. Failures are logged and counted, never fatal.
async fn move_objects(ctx: HandlerContext<'_>, from: &str, to: &str) -> u32 {
    let objects = ctx.services.objects.as_ref();
    let names = match objects.list(from, ctx.config.storage_list_limit).await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!("listing old storage prefix failed, no files moved: {err}");
            return 0;
        }
    };

    let mut failed = 0;
    for name in names {
        let source = format!("{from}/{name}");
        let destination = format!("{to}/{name}");
        if let Err(err) = objects.move_object(&source, &destination).await {
            tracing::warn!("failed to move {source}: {err}");
            failed += 1;
        }
    }
    failed
}

/// Points the profile row at the profile picture under the new prefix, if
/// there is one. The timestamp query parameter busts client image caches.
async fn refresh_profile_image(
    ctx: HandlerContext<'_>,
    owner: &str,
    prefix: &str,
    now: DateTime<Utc>,
) {
    let objects = ctx.services.objects.as_ref();
    let file = &ctx.config.profile_image_file;
    let names = match objects.list(prefix, ctx.config.storage_list_limit).await {
        Ok(names) => names,
        Err(err) => {
            tracing::warn!("listing new storage prefix failed: {err}");
            return;
        }
    };
    if !names.iter().any(|name| name == file) {
        return;
    }

    let url = format!(
        "{}?t={}",
        objects.public_url(&format!("{prefix}/{file}")),
        now.timestamp_millis()
    );
    if let Err(err) = ctx.services.rows.set_profile_image_url(owner, &url).await {
        tracing::warn!("failed to update profile image url: {err}");
    }
}
