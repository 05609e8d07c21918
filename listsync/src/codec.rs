//! Bidirectional mapping between [`FilterState`] and a URL query string.
//!
//! The encoding emits only non-empty fields. Set-valued fields serialize as a
//! comma-joined list with each identifier percent-encoded, so identifiers
//! containing commas survive as `%2C`. The single date takes precedence over
//! the range; the two are never emitted together.

use chrono::NaiveDate;

use crate::{FilterState, SetFilter};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How an encoded query string should be written into the history stack.
///
/// `Push` creates a new history entry and is used after user-initiated
/// changes; `Replace` is used when state is being reconciled *from* the URL
/// (initial load, back/forward navigation). Conflating the two breaks
/// back-button semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Push,
    Replace,
}

/// Encodes a filter state as a query string (no leading `?`).
pub fn encode(filters: &FilterState) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !filters.search.is_empty() {
        parts.push(format!("search={}", urlencoding::encode(&filters.search)));
    }
    if let Some(date) = filters.date {
        parts.push(format!("date={}", date.format(DATE_FORMAT)));
    } else {
        if let Some(from) = filters.date_from {
            parts.push(format!("dateFrom={}", from.format(DATE_FORMAT)));
        }
        if let Some(until) = filters.date_until {
            parts.push(format!("dateUntil={}", until.format(DATE_FORMAT)));
        }
    }
    if let Some(urgent) = filters.urgent {
        parts.push(format!("urgent={urgent}"));
    }
    for f in SetFilter::ALL {
        let values = filters.set(f);
        if !values.is_empty() {
            parts.push(format!("{}={}", f.param(), join_ids(values)));
        }
    }
    parts.join("&")
}

/// Decodes a query string (with or without a leading `?`).
///
/// Unknown or malformed parameters are ignored field-by-field, never fatal:
/// a bad date or urgent value simply leaves that field at its default. When
/// both the single date and a range are present, the single date wins.
pub fn decode(query: &str) -> FilterState {
    let mut filters = FilterState::default();
    let query = query.strip_prefix('?').unwrap_or(query);
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "search" => {
                if let Ok(v) = urlencoding::decode(raw) {
                    filters.search = v.into_owned();
                }
            }
            "date" => filters.date = parse_date(raw),
            "dateFrom" => filters.date_from = parse_date(raw),
            "dateUntil" => filters.date_until = parse_date(raw),
            "urgent" => {
                filters.urgent = match raw {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => {
                        lswarn!(value = raw, "FilterCodec: ignoring bad urgent value");
                        None
                    }
                }
            }
            _ => {
                if let Some(f) = SetFilter::from_param(key) {
                    *filters.set_mut(f) = split_ids(raw);
                } else {
                    lstrace!(key, "FilterCodec: ignoring unknown parameter");
                }
            }
        }
    }
    if filters.date.is_some() {
        filters.date_from = None;
        filters.date_until = None;
    }
    filters
}

pub(crate) fn join_ids(values: &[String]) -> String {
    values
        .iter()
        .map(|v| urlencoding::encode(v).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_ids(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let Ok(decoded) = urlencoding::decode(part) else {
            continue;
        };
        let decoded = decoded.into_owned();
        if !decoded.is_empty() && !out.contains(&decoded) {
            out.push(decoded);
        }
    }
    out
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok();
    if date.is_none() && !raw.is_empty() {
        lswarn!(value = raw, "FilterCodec: ignoring bad date value");
    }
    date
}
