//! GitHub implementation of the record source.
//!
//! - Quota: `GET /rate_limit` (`resources.core.remaining`). This endpoint does
//!   not count against the quota itself.
//! - Listing: `GET /users?since=<id>&per_page=100`, ascending by id.
//! - Detail: `GET /user/<id>`, addressed by the immutable numeric id so a
//!   renamed account is still found.
//!
//! Responses are decoded into small local payload types rather than
//! octocrab's models so only the fields the scan uses have to be present.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::client::OctocrabClient;
use super::error::GitHubApiError;
use super::retry::retry_with_backoff;
use crate::source::SourceClient;
use crate::types::{Record, RecordId};

/// Page size requested from the users listing (GitHub's maximum).
pub const USERS_PAGE_SIZE: u8 = 100;

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitBucket,
}

#[derive(Debug, Deserialize)]
struct RateLimitBucket {
    remaining: u32,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: u64,
    login: String,
}

impl From<UserPayload> for Record {
    fn from(user: UserPayload) -> Self {
        Record::listed(user.id, user.login)
    }
}

#[derive(Debug, Serialize)]
struct ListUsersParams {
    since: u64,
    per_page: u8,
}

impl SourceClient for OctocrabClient {
    type Error = GitHubApiError;

    async fn quota_remaining(&self) -> Result<u32, GitHubApiError> {
        let client = self.inner();
        let response: RateLimitResponse = retry_with_backoff(self.retry(), move || async move {
            client
                .get("/rate_limit", None::<&()>)
                .await
                .map_err(GitHubApiError::from_octocrab)
        })
        .await?;
        Ok(response.resources.core.remaining)
    }

    async fn list_records_since(&self, since: RecordId) -> Result<Vec<Record>, GitHubApiError> {
        let params = ListUsersParams {
            since: since.get(),
            per_page: USERS_PAGE_SIZE,
        };
        let client = self.inner();
        let params = &params;
        let users: Vec<UserPayload> = retry_with_backoff(self.retry(), move || async move {
            client
                .get("/users", Some(params))
                .await
                .map_err(GitHubApiError::from_octocrab)
        })
        .await?;

        let mut records: Vec<Record> = users.into_iter().map(Record::from).collect();
        // The API already returns ascending ids; sorting keeps the contract
        // even if a proxy or cache reorders the array.
        records.sort_by_key(|r| r.id);
        trace!(since = %since, count = records.len(), "Listed users");
        Ok(records)
    }

    async fn refresh_detail(&self, id: RecordId) -> Result<Record, GitHubApiError> {
        let client = self.inner();
        let route = format!("/user/{}", id);
        let route = route.as_str();
        let user: UserPayload = retry_with_backoff(self.retry(), move || async move {
            client
                .get(route, None::<&()>)
                .await
                .map_err(GitHubApiError::from_octocrab)
        })
        .await?;

        if user.id != id.get() {
            return Err(GitHubApiError::permanent_without_source(format!(
                "requested user {} but GitHub returned user {}",
                id, user.id
            )));
        }
        Ok(user.into())
    }
}
