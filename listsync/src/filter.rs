use chrono::NaiveDate;

/// The set-valued filter fields: ordered lists of unique string identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SetFilter {
    Topic,
    Region,
    Locality,
    Territory,
    Reporter,
}

impl SetFilter {
    pub const ALL: [SetFilter; 5] = [
        Self::Topic,
        Self::Region,
        Self::Locality,
        Self::Territory,
        Self::Reporter,
    ];

    /// The query parameter name for this field.
    pub fn param(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Region => "region",
            Self::Locality => "locality",
            Self::Territory => "territory",
            Self::Reporter => "reporter",
        }
    }

    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.param() == name)
    }
}

/// Every watchable key of the state store.
///
/// Subscribers can restrict delivery to a subset of these; see
/// [`crate::StateStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKey {
    Search,
    Date,
    DateFrom,
    DateUntil,
    Urgent,
    Topic,
    Region,
    Locality,
    Territory,
    Reporter,
    Density,
}

impl StateKey {
    /// The keys that describe filter criteria (everything except `Density`).
    pub const FILTER_KEYS: [StateKey; 10] = [
        Self::Search,
        Self::Date,
        Self::DateFrom,
        Self::DateUntil,
        Self::Urgent,
        Self::Topic,
        Self::Region,
        Self::Locality,
        Self::Territory,
        Self::Reporter,
    ];

    pub fn of_set(filter: SetFilter) -> Self {
        match filter {
            SetFilter::Topic => Self::Topic,
            SetFilter::Region => Self::Region,
            SetFilter::Locality => Self::Locality,
            SetFilter::Territory => Self::Territory,
            SetFilter::Reporter => Self::Reporter,
        }
    }
}

/// The structured, serializable set of user-adjustable search criteria.
///
/// The single `date` and the `date_from`/`date_until` range may coexist here;
/// the codec resolves the exclusivity deterministically (single date wins) and
/// the store mutators keep mutator-reachable states exclusive so that
/// `decode(encode(s)) == s` holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilterState {
    pub search: String,
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_until: Option<NaiveDate>,
    /// Tri-state: `None` = unset, `Some(true)` / `Some(false)` = explicit.
    pub urgent: Option<bool>,
    pub topic: Vec<String>,
    pub region: Vec<String>,
    pub locality: Vec<String>,
    pub territory: Vec<String>,
    pub reporter: Vec<String>,
}

impl FilterState {
    pub fn set(&self, filter: SetFilter) -> &[String] {
        match filter {
            SetFilter::Topic => &self.topic,
            SetFilter::Region => &self.region,
            SetFilter::Locality => &self.locality,
            SetFilter::Territory => &self.territory,
            SetFilter::Reporter => &self.reporter,
        }
    }

    pub(crate) fn set_mut(&mut self, filter: SetFilter) -> &mut Vec<String> {
        match filter {
            SetFilter::Topic => &mut self.topic,
            SetFilter::Region => &mut self.region,
            SetFilter::Locality => &mut self.locality,
            SetFilter::Territory => &mut self.territory,
            SetFilter::Reporter => &mut self.reporter,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Number of active criteria, counted the way a tag/indicator UI shows
    /// them: one per set-field identifier, one per scalar field in use. A date
    /// range counts once.
    pub fn active_tag_count(&self) -> usize {
        let mut n = SetFilter::ALL.iter().map(|&f| self.set(f).len()).sum();
        if !self.search.is_empty() {
            n += 1;
        }
        if self.date.is_some() || self.date_from.is_some() || self.date_until.is_some() {
            n += 1;
        }
        if self.urgent.is_some() {
            n += 1;
        }
        n
    }

    /// Keys whose values differ between `self` and `other`, appended to `out`.
    pub(crate) fn diff_keys(&self, other: &FilterState, out: &mut Vec<StateKey>) {
        if self.search != other.search {
            out.push(StateKey::Search);
        }
        if self.date != other.date {
            out.push(StateKey::Date);
        }
        if self.date_from != other.date_from {
            out.push(StateKey::DateFrom);
        }
        if self.date_until != other.date_until {
            out.push(StateKey::DateUntil);
        }
        if self.urgent != other.urgent {
            out.push(StateKey::Urgent);
        }
        for f in SetFilter::ALL {
            if self.set(f) != other.set(f) {
                out.push(StateKey::of_set(f));
            }
        }
    }
}
