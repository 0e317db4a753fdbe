//! Auth, row and object storage collaborators.
//!
//! Three narrow traits cover what the handlers need from the backend:
//!
//! - [`IdentityProvider`]: token resolution and admin user operations
//! - [`RowStore`]: owner-filtered deletes, re-keys and counts per table
//! - [`ObjectStore`]: list/remove/move under a path prefix
//!
//! [`BackendClient`] implements all three over the backend's REST API.

mod client;

pub use client::BackendClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Column holding the owning identity in every user table.
pub const OWNER_COLUMN: &str = "user_id";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// A principal known to the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub is_anonymous: bool,
}

/// User-owned tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Conversations,
    SavedQuotes,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Conversations => "conversations",
            Table::SavedQuotes => "saved_quotes",
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a caller's session token. `Ok(None)` means the token was
    /// rejected.
    async fn user_for_token(&self, token: &str) -> Result<Option<Identity>, BackendError>;

    /// Admin lookup by id. `Ok(None)` means no such user.
    async fn user_by_id(&self, id: &str) -> Result<Option<Identity>, BackendError>;

    async fn delete_user(&self, id: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Deletes every row of `table` owned by any of `owners`.
    async fn delete_owned(&self, table: Table, owners: &[String]) -> Result<(), BackendError>;

    /// Re-keys every row of `table` owned by any of `owners` to `new_owner`,
    /// also setting `updated_at` when given.
    async fn reassign_owner(
        &self,
        table: Table,
        owners: &[String],
        new_owner: &str,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<(), BackendError>;

    /// Number of rows of `table` owned by exactly `owner`.
    async fn count_owned(&self, table: Table, owner: &str) -> Result<u64, BackendError>;

    async fn set_profile_image_url(&self, owner: &str, url: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of at most `limit` objects directly under `prefix`.
    async fn list(&self, prefix: &str, limit: u32) -> Result<Vec<String>, BackendError>;

    /// Removes the given full object paths in one call.
    async fn remove(&self, paths: &[String]) -> Result<(), BackendError>;

    async fn move_object(&self, from: &str, to: &str) -> Result<(), BackendError>;

    /// Public URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;
}
