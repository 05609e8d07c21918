/// The ways a fetch can fail.
///
/// Stale/superseded responses are *not* errors; they are silently discarded
/// by the token check in [`crate::FetchCoordinator::complete`]. Every variant
/// here leaves the record cache and pagination counters untouched, so any
/// later `apply_filters`/`load_more` retries cleanly.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The transport layer failed (network down, timeout, aborted socket).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status code.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body was not JSON at all.
    ///
    /// A JSON body merely *missing* expected fields is not an error; it is
    /// treated as an empty page (see [`crate::RecordsPage::from_json`]).
    #[error("malformed response: {0}")]
    Malformed(String),
}
