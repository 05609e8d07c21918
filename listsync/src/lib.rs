//! A headless filter-state and incremental list-synchronization engine.
//!
//! For adapter-level utilities (scroll anchoring, density switching, the
//! ready-made controller), see the `listsync-adapter` crate.
//!
//! This crate keeps a paginated, filterable collection of records consistent
//! across user-edited filter criteria, a shareable URL representation of those
//! criteria, an immutable route-derived filter context, and out-of-order
//! asynchronous fetches.
//!
//! It is transport- and UI-agnostic. A host adapter is expected to provide:
//! - execution of the [`FetchRequest`] descriptors the engine produces
//! - completion reports ([`FetchCoordinator::complete`]) with parsed pages
//! - history/location writes for the encoded query strings
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod codec;
mod coordinator;
mod error;
mod filter;
mod route;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use codec::{WriteMode, decode, encode};
pub use coordinator::{
    CompletionOutcome, FIRST_PAGE_LIMIT, FetchCoordinator, FetchRequest, LoadKind, PAGE_LIMIT,
    Pagination, RequestToken, TOP_UP_REMAINDER,
};
pub use error::FetchError;
pub use filter::{FilterState, SetFilter, StateKey};
pub use route::{PageFilter, PageFilterResolver, RoutePattern};
pub use store::{StateStore, SubscriptionHandle};
pub use types::{DensityMode, Record, RecordsPage, SyncEvent};
