//! Shared test utilities: arbitrary generators for property-based testing and
//! an in-memory record source.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::github::GitHubApiError;
use crate::source::{SourceClient, SourceConnector};
use crate::types::{Record, RecordId};

pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
    (1u64..500).prop_map(RecordId)
}

pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
}

pub fn arb_record() -> impl Strategy<Value = Record> {
    (
        arb_record_id(),
        "[a-z][a-z0-9-]{0,15}",
        prop::option::of(arb_timestamp()),
    )
        .prop_map(|(id, identifier, updated_at)| Record {
            id,
            identifier,
            updated_at,
        })
}

/// A listing page as a store sees it: arbitrary order, possible duplicates.
pub fn arb_page() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(arb_record(), 0..20)
}

/// Number of calls made against a [`MockSource`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockCalls {
    pub connect: usize,
    pub quota: usize,
    pub list: usize,
    pub refresh: usize,
}

#[derive(Debug)]
struct MockState {
    quota: u32,
    quota_cost: u32,
    page_size: usize,
    records: BTreeMap<RecordId, String>,
    calls: MockCalls,
    listed_since: Vec<RecordId>,
    refreshed: Vec<RecordId>,
    ignore_since: bool,
    shuffle_pages: bool,
    fail_connect: bool,
    fail_quota: bool,
    fail_refresh: Option<RecordId>,
    cancel_on_refresh: Option<(RecordId, CancellationToken)>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            quota: 5000,
            quota_cost: 0,
            page_size: 100,
            records: BTreeMap::new(),
            calls: MockCalls::default(),
            listed_since: Vec::new(),
            refreshed: Vec::new(),
            ignore_since: false,
            shuffle_pages: false,
            fail_connect: false,
            fail_quota: false,
            fail_refresh: None,
            cancel_on_refresh: None,
        }
    }
}

/// In-memory source with call recording and failure injection.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// driver owns another as its connector.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_quota(self, quota: u32) -> Self {
        self.set_quota(quota);
        self
    }

    /// Every list or refresh call reduces the quota by `cost`.
    pub fn with_quota_cost(self, cost: u32) -> Self {
        self.state().quota_cost = cost;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state().page_size = page_size;
        self
    }

    pub fn with_records<'a>(self, records: impl IntoIterator<Item = (u64, &'a str)>) -> Self {
        self.add_records(records);
        self
    }

    /// Ids `from..=to`, each with identifier `user<id>`.
    pub fn with_id_range(self, from: u64, to: u64) -> Self {
        {
            let mut state = self.state();
            for id in from..=to {
                state.records.insert(RecordId(id), format!("user{}", id));
            }
        }
        self
    }

    /// Always lists from the lowest id, as a misbehaving source would.
    pub fn ignoring_since(self) -> Self {
        self.state().ignore_since = true;
        self
    }

    /// Serves every page in descending id order with its highest id listed
    /// twice, as a source without an ordering guarantee might.
    pub fn with_unordered_pages(self) -> Self {
        self.state().shuffle_pages = true;
        self
    }

    pub fn failing_connect(self) -> Self {
        self.state().fail_connect = true;
        self
    }

    pub fn failing_quota(self) -> Self {
        self.state().fail_quota = true;
        self
    }

    pub fn failing_refresh_of(self, id: u64) -> Self {
        self.state().fail_refresh = Some(RecordId(id));
        self
    }

    /// Cancels `token` while refreshing `id`, simulating a shutdown request
    /// that arrives mid-page.
    pub fn cancel_on_refresh_of(self, id: u64, token: CancellationToken) -> Self {
        self.state().cancel_on_refresh = Some((RecordId(id), token));
        self
    }

    pub fn set_quota(&self, quota: u32) {
        self.state().quota = quota;
    }

    pub fn add_records<'a>(&self, records: impl IntoIterator<Item = (u64, &'a str)>) {
        let mut state = self.state();
        for (id, identifier) in records {
            state.records.insert(RecordId(id), identifier.to_string());
        }
    }

    pub fn calls(&self) -> MockCalls {
        self.state().calls
    }

    /// The `since` argument of every listing call, in order.
    pub fn listed_since(&self) -> Vec<RecordId> {
        self.state().listed_since.clone()
    }

    /// Ids passed to `refresh_detail`, in order.
    pub fn refreshed(&self) -> Vec<RecordId> {
        self.state().refreshed.clone()
    }
}

impl MockState {
    fn spend(&mut self) {
        self.quota = self.quota.saturating_sub(self.quota_cost);
    }
}

impl SourceClient for MockSource {
    type Error = GitHubApiError;

    async fn quota_remaining(&self) -> Result<u32, GitHubApiError> {
        let mut state = self.state();
        state.calls.quota += 1;
        if state.fail_quota {
            return Err(GitHubApiError::transient_without_source("rate_limit unavailable"));
        }
        Ok(state.quota)
    }

    async fn list_records_since(&self, since: RecordId) -> Result<Vec<Record>, GitHubApiError> {
        let mut state = self.state();
        state.calls.list += 1;
        state.listed_since.push(since);
        state.spend();
        let from = if state.ignore_since {
            RecordId::MIN
        } else {
            RecordId(since.get().saturating_add(1))
        };
        let mut page: Vec<Record> = state
            .records
            .range(from..)
            .take(state.page_size)
            .map(|(id, identifier)| Record::listed(*id, identifier.clone()))
            .collect();
        if state.shuffle_pages {
            page.reverse();
            if let Some(first) = page.first().cloned() {
                page.push(first);
            }
        }
        Ok(page)
    }

    async fn refresh_detail(&self, id: RecordId) -> Result<Record, GitHubApiError> {
        let mut state = self.state();
        state.calls.refresh += 1;
        state.refreshed.push(id);
        state.spend();
        if let Some((target, token)) = &state.cancel_on_refresh
            && *target == id
        {
            token.cancel();
        }
        if state.fail_refresh == Some(id) {
            return Err(GitHubApiError::transient_without_source(format!(
                "detail for {} timed out",
                id
            )));
        }
        match state.records.get(&id) {
            Some(identifier) => Ok(Record::listed(id, identifier.clone())),
            None => Err(GitHubApiError::permanent_without_source(format!(
                "user {} not found",
                id
            ))),
        }
    }
}

impl SourceConnector for MockSource {
    type Client = MockSource;
    type Error = GitHubApiError;

    async fn connect(&self) -> Result<MockSource, GitHubApiError> {
        let mut state = self.state();
        state.calls.connect += 1;
        if state.fail_connect {
            return Err(GitHubApiError::permanent_without_source("bad credentials"));
        }
        Ok(self.clone())
    }
}
