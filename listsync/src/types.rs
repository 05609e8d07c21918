use serde_json::Value;

use crate::FetchError;

/// One of the two alternate rendering granularities for the same record set.
///
/// The preference persists across sessions independently of the filter state
/// and the URL; an absent or invalid stored value falls back to [`Full`].
///
/// [`Full`]: DensityMode::Full
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityMode {
    #[default]
    Full,
    Mini,
}

impl DensityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Mini => "mini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "mini" => Some(Self::Mini),
            _ => None,
        }
    }

    /// Resolves a stored preference value, falling back to the default mode.
    pub fn from_stored(stored: Option<&str>) -> Self {
        stored.and_then(Self::parse).unwrap_or_default()
    }
}

/// A fetched record: opaque beyond its identifier.
///
/// The full payload is kept alongside so an external renderer can lazily
/// populate per-record detail without another fetch.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: serde_json::Map::new(),
        }
    }
}

/// One page of the records endpoint's response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordsPage {
    pub records: Vec<Record>,
    /// The authoritative total count, when the response carried one.
    pub total: Option<u64>,
}

impl RecordsPage {
    /// Parses a response body leniently.
    ///
    /// A body that is not JSON at all is a [`FetchError::Malformed`]. A JSON
    /// body missing the record array or the total behaves as a successful
    /// empty (or total-less) page, so a sloppy backend never strands the UI
    /// mid-load. Array entries without a usable `id` are skipped.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let items = value
            .get("records")
            .or_else(|| value.get("items"))
            .and_then(Value::as_array);
        let mut records = Vec::with_capacity(items.map_or(0, Vec::len));
        for item in items.into_iter().flatten() {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let Some(id) = obj.get("id").and_then(Value::as_str) else {
                lswarn!("RecordsPage: skipping record without id");
                continue;
            };
            if id.is_empty() {
                continue;
            }
            let mut payload = obj.clone();
            payload.remove("id");
            records.push(Record {
                id: id.to_owned(),
                payload,
            });
        }
        let total = value
            .get("total")
            .or_else(|| value.get("totalCount"))
            .and_then(Value::as_u64);
        Self { records, total }
    }
}

/// Events emitted for collaborators after the engine applies a completion or
/// a density switch.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// A full reload succeeded; the cache was replaced wholesale.
    FiltersApplied { total: u64 },
    /// An incremental load succeeded; records were appended.
    RecordsAppended { appended: usize, total: u64 },
    /// The rendering density changed (no fetch involved).
    DensityChanged { mode: DensityMode },
    /// A fetch failed; cache and pagination are untouched and retriable.
    LoadFailed { error: FetchError },
}
