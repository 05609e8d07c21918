use std::collections::HashMap;

use serde_json::Value;

use crate::codec::join_ids;
use crate::{FetchError, FilterState, PageFilter, Record, RecordsPage, SetFilter};

/// Generation counter used to detect and discard superseded request results.
///
/// Exactly one value is "current"; any completed fetch whose token differs
/// from the current token at completion time is discarded unapplied.
pub type RequestToken = u64;

/// Small first page for a fast initial paint.
pub const FIRST_PAGE_LIMIT: u32 = 15;
/// Larger page size for incremental loads.
pub const PAGE_LIMIT: u32 = 50;
/// When the unfetched remainder is at most this, top up eagerly without
/// waiting for the visibility signal.
pub const TOP_UP_REMAINDER: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    /// Replaces the entire record set from offset 0.
    Full,
    /// Appends records onto the existing set.
    Incremental,
}

/// A request descriptor for the host's transport.
///
/// The engine never performs network I/O itself; it hands the host one of
/// these, and the host reports the outcome back through
/// [`FetchCoordinator::complete`] with the same token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: RequestToken,
    pub kind: LoadKind,
    pub limit: u32,
    pub offset: u64,
    /// The full parameter list, values unencoded. Includes `limit`, `offset`,
    /// the filter criteria (page-filter slug unioned in), and a cache-busting
    /// `_` token.
    pub params: Vec<(String, String)>,
}

impl FetchRequest {
    /// Renders the parameters as a percent-encoded query string.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={}", encode_param(k, v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// Set-field values are comma-joined from already-encoded identifiers; encoding
// them again would double-escape the separators.
fn encode_param(key: &str, value: &str) -> String {
    if SetFilter::from_param(key).is_some() {
        value.to_owned()
    } else {
        urlencoding::encode(value).into_owned()
    }
}

/// A snapshot of the pagination counters.
///
/// `has_more` is derived, so `current_offset <= total_count` and
/// `has_more == (current_offset < total_count)` hold by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pagination {
    pub current_offset: u64,
    pub total_count: u64,
    pub is_loading: bool,
}

impl Pagination {
    pub fn has_more(&self) -> bool {
        self.current_offset < self.total_count
    }
}

/// What [`FetchCoordinator::complete`] did with a reported result.
#[derive(Clone, Debug, PartialEq)]
pub enum CompletionOutcome {
    /// A full reload succeeded; the cache was replaced wholesale.
    Replaced { total: u64 },
    /// An incremental load succeeded; records were appended.
    Appended { appended: usize, total: u64 },
    /// The result was stale or unsolicited and was silently dropped.
    Discarded,
    /// The fetch failed; loading flags cleared, cache and counters untouched.
    Failed(FetchError),
}

#[derive(Clone, Copy, Debug)]
struct Inflight {
    token: RequestToken,
    kind: LoadKind,
}

/// Issues full-reload and incremental fetch descriptors against a records
/// endpoint; owns the record cache, the pagination counters, and the
/// request-race suppression token.
///
/// State machine: Idle → Loading(full) | Loading(incremental) → Idle. A
/// failed request returns to Idle without blocking future requests.
/// Cancellation is cooperative: in-flight work is not aborted at the
/// transport layer, its result is suppressed by the token check.
#[derive(Clone, Debug, Default)]
pub struct FetchCoordinator {
    records: Vec<Record>,
    by_id: HashMap<String, usize>,
    current_offset: u64,
    total_count: u64,
    inflight: Option<Inflight>,
    token: RequestToken,
    first_page_limit: u32,
    page_limit: u32,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::with_page_limits(FIRST_PAGE_LIMIT, PAGE_LIMIT)
    }

    pub fn with_page_limits(first_page_limit: u32, page_limit: u32) -> Self {
        Self {
            records: Vec::new(),
            by_id: HashMap::new(),
            current_offset: 0,
            total_count: 0,
            inflight: None,
            token: 0,
            first_page_limit: first_page_limit.max(1),
            page_limit: page_limit.max(1),
        }
    }

    pub fn current_token(&self) -> RequestToken {
        self.token
    }

    /// The cached record set, in fetch order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Looks up a record's full payload by identifier, for lazy detail
    /// population by the external renderer.
    pub fn record(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            current_offset: self.current_offset,
            total_count: self.total_count,
            is_loading: self.inflight.is_some(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.inflight.is_some()
    }

    /// Starts a full reload: cancels any pending incremental load, resets
    /// pagination to offset 0, bumps the token, and returns a small
    /// first-page request for fast initial paint.
    pub fn apply_filters(
        &mut self,
        filters: &FilterState,
        page: Option<&PageFilter>,
        now_ms: u64,
    ) -> FetchRequest {
        self.cancel_pending();
        self.current_offset = 0;
        let limit = self.first_page_limit;
        let request = self.request(LoadKind::Full, limit, 0, filters, page, now_ms);
        lsdebug!(token = request.token, "FetchCoordinator: full reload issued");
        self.inflight = Some(Inflight {
            token: request.token,
            kind: LoadKind::Full,
        });
        request
    }

    /// Starts an incremental load from `current_offset` at the larger page
    /// size. No-op (`None`) if a load is already outstanding or there is
    /// nothing more to fetch; a concurrent call while one is in flight must
    /// not start a second network request.
    pub fn load_more(
        &mut self,
        filters: &FilterState,
        page: Option<&PageFilter>,
        now_ms: u64,
    ) -> Option<FetchRequest> {
        if self.inflight.is_some() || !self.pagination().has_more() {
            return None;
        }
        let limit = self.page_limit;
        let request = self.request(
            LoadKind::Incremental,
            limit,
            self.current_offset,
            filters,
            page,
            now_ms,
        );
        lsdebug!(
            token = request.token,
            offset = request.offset,
            "FetchCoordinator: incremental load issued"
        );
        self.inflight = Some(Inflight {
            token: request.token,
            kind: LoadKind::Incremental,
        });
        Some(request)
    }

    /// Invalidates the current token and clears the loading flag. Always
    /// invoked by [`Self::apply_filters`], so a cancellation strictly precedes
    /// the visible effects of the next full reload.
    pub fn cancel_pending(&mut self) {
        self.token += 1;
        self.inflight = None;
    }

    /// Applies a completed fetch reported by the host.
    ///
    /// The token is checked against the coordinator's current token at
    /// completion time; a mismatch (superseded request, unsolicited report)
    /// is silently discarded. At most one full-reload response is ever
    /// applied per token generation.
    pub fn complete(
        &mut self,
        token: RequestToken,
        result: Result<RecordsPage, FetchError>,
    ) -> CompletionOutcome {
        let Some(inflight) = self.inflight else {
            lstrace!(token, "FetchCoordinator: unsolicited completion discarded");
            return CompletionOutcome::Discarded;
        };
        if inflight.token != token || token != self.token {
            lsdebug!(
                token,
                current = self.token,
                "FetchCoordinator: stale completion discarded"
            );
            return CompletionOutcome::Discarded;
        }
        self.inflight = None;

        let page = match result {
            Ok(page) => page,
            Err(error) => {
                lswarn!(token, error = %error, "FetchCoordinator: fetch failed");
                return CompletionOutcome::Failed(error);
            }
        };

        match inflight.kind {
            LoadKind::Full => {
                self.records = page.records;
                self.rebuild_index();
                self.current_offset = self.records.len() as u64;
                self.total_count = page
                    .total
                    .unwrap_or(self.current_offset)
                    .max(self.current_offset);
                CompletionOutcome::Replaced {
                    total: self.total_count,
                }
            }
            LoadKind::Incremental => {
                let appended = self.append(page.records);
                self.current_offset += appended as u64;
                if let Some(total) = page.total {
                    self.total_count = total;
                }
                self.total_count = self.total_count.max(self.current_offset);
                CompletionOutcome::Appended {
                    appended,
                    total: self.total_count,
                }
            }
        }
    }

    /// The eager "top-up" rule: proactively load more, without waiting for
    /// the visibility signal, when the unfetched remainder is small or the
    /// viewport can show more rows than are rendered.
    pub fn should_top_up(&self, rendered_rows: usize, viewport_rows: usize) -> bool {
        let remainder = self.total_count.saturating_sub(self.current_offset);
        if remainder == 0 {
            return false;
        }
        remainder <= TOP_UP_REMAINDER || viewport_rows > rendered_rows
    }

    fn append(&mut self, incoming: Vec<Record>) -> usize {
        let mut appended = 0;
        for record in incoming {
            if self.by_id.contains_key(&record.id) {
                continue;
            }
            self.by_id.insert(record.id.clone(), self.records.len());
            self.records.push(record);
            appended += 1;
        }
        appended
    }

    fn rebuild_index(&mut self) {
        self.by_id.clear();
        // On duplicate ids the first occurrence wins, matching append order.
        for (i, record) in self.records.iter().enumerate() {
            self.by_id.entry(record.id.clone()).or_insert(i);
        }
    }

    /// Convenience for hosts handing back a raw body: parses leniently, then
    /// applies through [`Self::complete`].
    pub fn complete_json(&mut self, token: RequestToken, body: &str) -> CompletionOutcome {
        self.complete(token, RecordsPage::from_json(body))
    }

    pub fn complete_value(&mut self, token: RequestToken, value: &Value) -> CompletionOutcome {
        self.complete(token, Ok(RecordsPage::from_value(value)))
    }

    fn request(
        &self,
        kind: LoadKind,
        limit: u32,
        offset: u64,
        filters: &FilterState,
        page: Option<&PageFilter>,
        now_ms: u64,
    ) -> FetchRequest {
        FetchRequest {
            token: self.token,
            kind,
            limit,
            offset,
            params: build_params(filters, page, limit, offset, now_ms),
        }
    }
}

/// Builds the outbound parameter list for the records endpoint.
///
/// The page-filter slug is unioned into its same-named set field; the single
/// date is mutually exclusive with the range (single date wins).
pub(crate) fn build_params(
    filters: &FilterState,
    page: Option<&PageFilter>,
    limit: u32,
    offset: u64,
    now_ms: u64,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("limit".into(), limit.to_string()),
        ("offset".into(), offset.to_string()),
    ];
    if !filters.search.is_empty() {
        params.push(("search".into(), filters.search.clone()));
    }
    if let Some(date) = filters.date {
        params.push(("date".into(), date.format("%Y-%m-%d").to_string()));
    } else {
        if let Some(from) = filters.date_from {
            params.push(("dateFrom".into(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(until) = filters.date_until {
            params.push(("dateUntil".into(), until.format("%Y-%m-%d").to_string()));
        }
    }
    if let Some(urgent) = filters.urgent {
        params.push(("urgent".into(), urgent.to_string()));
    }
    for f in SetFilter::ALL {
        let user = filters.set(f);
        let values = match page {
            Some(pf) if pf.kind == f => pf.union_into(user),
            _ => user.to_vec(),
        };
        if !values.is_empty() {
            params.push((f.param().into(), join_ids(&values)));
        }
    }
    params.push(("_".into(), now_ms.to_string()));
    params
}
