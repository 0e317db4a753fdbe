//! REST client for the backend's auth, row and storage APIs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{BackendError, Identity, IdentityProvider, OWNER_COLUMN, ObjectStore, RowStore, Table};

/// User object returned by the auth API.
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    is_anonymous: bool,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        Identity {
            id: user.id,
            is_anonymous: user.is_anonymous,
        }
    }
}

/// Entry of a storage folder listing.
#[derive(Debug, Deserialize)]
struct StorageEntry {
    name: String,
}

/// Client for one backend project, authenticated with its service key.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl BackendClient {
    pub fn new(client: reqwest::Client, base_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn rest_url(&self, table: Table) -> String {
        self.url(&format!("/rest/v1/{}", table.as_str()))
    }

    /// Adds the service key as both `apikey` and bearer credential.
    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
    }

    async fn expect_success(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn patch_rows(
        &self,
        table: Table,
        filter: String,
        payload: Map<String, Value>,
    ) -> Result<(), BackendError> {
        let response = self
            .admin(self.client.patch(self.rest_url(table)))
            .query(&[(OWNER_COLUMN, filter)])
            .header("Prefer", "return=minimal")
            .json(&payload)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

/// PostgREST `in.(...)` filter with every value double-quoted.
fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

/// Total from a `Content-Range` header such as `0-4/5` or `*/0`.
fn parse_content_range_total(headers: &HeaderMap) -> Result<u64, BackendError> {
    let raw = headers
        .get(CONTENT_RANGE)
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .ok_or_else(|| BackendError::InvalidResponse("missing Content-Range".to_string()))?;
    raw.rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| BackendError::InvalidResponse(format!("unusable Content-Range '{raw}'")))
}

#[async_trait]
impl IdentityProvider for BackendClient {
    async fn user_for_token(&self, token: &str) -> Result<Option<Identity>, BackendError> {
        let response = self
            .client
            .get(self.url("/auth/v1/user"))
            .header("apikey", &self.service_key)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let response = Self::expect_success(response).await?;
                let user: AuthUser = response
                    .json()
                    .await
                    .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
                Ok(Some(user.into()))
            }
        }
    }

    async fn user_by_id(&self, id: &str) -> Result<Option<Identity>, BackendError> {
        let url = self.url(&format!("/auth/v1/admin/users/{}", urlencoding::encode(id)));
        let response = self.admin(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response).await?;
        let user: AuthUser = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(Some(user.into()))
    }

    async fn delete_user(&self, id: &str) -> Result<(), BackendError> {
        let url = self.url(&format!("/auth/v1/admin/users/{}", urlencoding::encode(id)));
        let response = self.admin(self.client.delete(url)).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RowStore for BackendClient {
    async fn delete_owned(&self, table: Table, owners: &[String]) -> Result<(), BackendError> {
        let response = self
            .admin(self.client.delete(self.rest_url(table)))
            .query(&[(OWNER_COLUMN, in_filter(owners))])
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn reassign_owner(
        &self,
        table: Table,
        owners: &[String],
        new_owner: &str,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<(), BackendError> {
        let mut payload = Map::new();
        payload.insert(OWNER_COLUMN.to_string(), json!(new_owner));
        if let Some(at) = updated_at {
            payload.insert(
                "updated_at".to_string(),
                json!(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        self.patch_rows(table, in_filter(owners), payload).await
    }

    async fn count_owned(&self, table: Table, owner: &str) -> Result<u64, BackendError> {
        let response = self
            .admin(self.client.head(self.rest_url(table)))
            .query(&[("select", OWNER_COLUMN.to_string())])
            .query(&[(OWNER_COLUMN, eq_filter(owner))])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::expect_success(response).await?;
        parse_content_range_total(response.headers())
    }

    async fn set_profile_image_url(&self, owner: &str, url: &str) -> Result<(), BackendError> {
        let mut payload = Map::new();
        payload.insert("profile_image_url".to_string(), json!(url));
        self.patch_rows(Table::Profiles, eq_filter(owner), payload)
            .await
    }
}

#[async_trait]
impl ObjectStore for BackendClient {
    async fn list(&self, prefix: &str, limit: u32) -> Result<Vec<String>, BackendError> {
        let url = self.url(&format!("/storage/v1/object/list/{}", self.bucket));
        let response = self
            .admin(self.client.post(url))
            .json(&json!({
                "prefix": prefix,
                "limit": limit,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            }))
            .send()
            .await?;
        let response = Self::expect_success(response).await?;
        let entries: Vec<StorageEntry> = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), BackendError> {
        let url = self.url(&format!("/storage/v1/object/{}", self.bucket));
        let response = self
            .admin(self.client.delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn move_object(&self, from: &str, to: &str) -> Result<(), BackendError> {
        let response = self
            .admin(self.client.post(self.url("/storage/v1/object/move")))
            .json(&json!({
                "bucketId": self.bucket,
                "sourceKey": from,
                "destinationKey": to,
            }))
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{}/{path}", self.bucket))
    }
}
