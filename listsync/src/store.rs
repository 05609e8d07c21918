use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::NaiveDate;

use crate::{DensityMode, FilterState, SetFilter, StateKey};

/// An explicit handle returned by [`StateStore::subscribe`].
///
/// Hold on to it and pass it to [`StateStore::unsubscribe`] at teardown;
/// there are no ambient listener chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Callback = Rc<dyn Fn(&StateStore, &[StateKey])>;

struct Subscriber {
    handle: SubscriptionHandle,
    watched: Option<Box<[StateKey]>>,
    callback: Callback,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct State {
    filters: FilterState,
    density: DensityMode,
}

/// The central mutable filter/UI state, with subscription and re-entrancy-safe
/// notification.
///
/// The store is explicitly constructed and dependency-injected; it holds no
/// globals. Execution is assumed single-threaded and cooperative (interior
/// mutability via `RefCell`/`Cell`); a multi-threaded port must put a mutex or
/// actor boundary around the store.
///
/// Notification is a mailbox: if a subscriber's callback mutates the store,
/// the resulting notification is queued and flushed immediately after the
/// current delivery cycle completes, never nested. This keeps side effects
/// ordered and bounds the call stack.
pub struct StateStore {
    state: RefCell<State>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_handle: Cell<u64>,
    delivering: Cell<bool>,
    mailbox: RefCell<VecDeque<Vec<StateKey>>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            subscribers: RefCell::new(Vec::new()),
            next_handle: Cell::new(0),
            delivering: Cell::new(false),
            mailbox: RefCell::new(VecDeque::new()),
        }
    }

    pub fn with_filters(filters: FilterState) -> Self {
        let store = Self::new();
        store.state.borrow_mut().filters = filters;
        store
    }

    /// A snapshot of the current filter criteria.
    pub fn filters(&self) -> FilterState {
        self.state.borrow().filters.clone()
    }

    pub fn density(&self) -> DensityMode {
        self.state.borrow().density
    }

    /// Registers `callback`. With `watched` given, the callback fires only
    /// when at least one watched key's value differs from its value in the
    /// snapshot taken before the mutation.
    pub fn subscribe(
        &self,
        watched: Option<&[StateKey]>,
        callback: impl Fn(&StateStore, &[StateKey]) + 'static,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            handle,
            watched: watched.map(Into::into),
            callback: Rc::new(callback),
        });
        handle
    }

    /// Releases a subscription. Returns `false` if the handle was unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|s| s.handle != handle);
        subs.len() != before
    }

    /// Applies `mutate` to the filter state and notifies subscribers of the
    /// keys that actually changed. `silent` suppresses notification (used for
    /// bookkeeping that must not re-trigger derivation).
    pub fn update(&self, silent: bool, mutate: impl FnOnce(&mut FilterState)) {
        let before = self.state.borrow().filters.clone();
        mutate(&mut self.state.borrow_mut().filters);
        let mut changed = Vec::new();
        self.state.borrow().filters.diff_keys(&before, &mut changed);
        self.dispatch(changed, silent);
    }

    pub fn set_search(&self, search: impl Into<String>) {
        self.update(false, |f| f.search = search.into());
    }

    /// Sets the single date. A set date clears the range, keeping
    /// mutator-reachable states exclusive so the codec round-trips.
    pub fn set_date(&self, date: Option<NaiveDate>) {
        self.update(false, |f| {
            f.date = date;
            if date.is_some() {
                f.date_from = None;
                f.date_until = None;
            }
        });
    }

    /// Sets the date range. A set range clears the single date.
    pub fn set_date_range(&self, from: Option<NaiveDate>, until: Option<NaiveDate>) {
        self.update(false, |f| {
            f.date_from = from;
            f.date_until = until;
            if from.is_some() || until.is_some() {
                f.date = None;
            }
        });
    }

    pub fn set_urgent(&self, urgent: Option<bool>) {
        self.update(false, |f| f.urgent = urgent);
    }

    /// Replaces a set-valued field wholesale, deduplicating while preserving
    /// first-occurrence order.
    pub fn set_filter(&self, filter: SetFilter, values: Vec<String>) {
        self.update(false, |f| {
            let target = f.set_mut(filter);
            target.clear();
            for v in values {
                if !v.is_empty() && !target.contains(&v) {
                    target.push(v);
                }
            }
        });
    }

    /// Adds `value` to a set-valued field. No-op returning `false` when the
    /// value is already present.
    pub fn add_to_filter(&self, filter: SetFilter, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() {
            return false;
        }
        {
            let state = self.state.borrow();
            if state.filters.set(filter).contains(&value) {
                return false;
            }
        }
        self.update(false, |f| f.set_mut(filter).push(value));
        true
    }

    /// Removes `value` from a set-valued field. Returns `false` (and performs
    /// no mutation) when the value is absent.
    pub fn remove_from_filter(&self, filter: SetFilter, value: &str) -> bool {
        {
            let state = self.state.borrow();
            if !state.filters.set(filter).iter().any(|v| v == value) {
                return false;
            }
        }
        self.update(false, |f| f.set_mut(filter).retain(|v| v != value));
        true
    }

    /// Resets the filter criteria wholesale. Density is untouched.
    pub fn clear_filters(&self) {
        self.update(false, |f| *f = FilterState::default());
    }

    /// Replaces the filter criteria wholesale (used when reconciling state
    /// *from* the URL). Notifies per-key unless `silent`.
    pub fn replace_filters(&self, filters: FilterState, silent: bool) {
        self.update(silent, |f| *f = filters);
    }

    pub fn set_density(&self, mode: DensityMode, silent: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            if state.density == mode {
                false
            } else {
                state.density = mode;
                true
            }
        };
        if changed {
            self.dispatch(vec![StateKey::Density], silent);
        }
    }

    /// Dynamic read facade mirroring [`Self::set_field`]: the field's value
    /// rendered as a string (empty when unset). Unknown paths yield `None`.
    pub fn field(&self, path: &str) -> Option<String> {
        let state = self.state.borrow();
        match path {
            "filters.search" => Some(state.filters.search.clone()),
            "filters.date" => Some(
                state
                    .filters
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            "filters.urgent" => Some(
                state
                    .filters
                    .urgent
                    .map(|u| u.to_string())
                    .unwrap_or_default(),
            ),
            "ui.density" => Some(state.density.as_str().to_owned()),
            _ => None,
        }
    }

    /// Dynamic facade over the typed mutators, for hosts that address fields
    /// by path (e.g. deserialized UI wiring). An unknown path degrades to a
    /// logged no-op returning `false`; it never panics.
    pub fn set_field(&self, path: &str, value: &str) -> bool {
        match path {
            "filters.search" => self.set_search(value),
            "filters.date" => match parse_opt_date(value) {
                Some(d) => self.set_date(d),
                None => return false,
            },
            "filters.urgent" => match value {
                "" => self.set_urgent(None),
                "true" => self.set_urgent(Some(true)),
                "false" => self.set_urgent(Some(false)),
                _ => return false,
            },
            "ui.density" => match DensityMode::parse(value) {
                Some(m) => self.set_density(m, false),
                None => return false,
            },
            _ => {
                lswarn!(path, "StateStore::set_field: unknown path");
                return false;
            }
        }
        true
    }

    fn dispatch(&self, changed: Vec<StateKey>, silent: bool) {
        if changed.is_empty() || silent {
            return;
        }
        self.mailbox.borrow_mut().push_back(changed);
        if self.delivering.get() {
            // A delivery cycle is already running; the queued notification is
            // flushed right after it completes.
            return;
        }
        self.delivering.set(true);
        loop {
            let Some(changed) = self.mailbox.borrow_mut().pop_front() else {
                break;
            };
            self.deliver(&changed);
        }
        self.delivering.set(false);
    }

    fn deliver(&self, changed: &[StateKey]) {
        lstrace!(keys = changed.len(), "StateStore: delivering change");
        // Snapshot the callbacks so subscribers can subscribe/unsubscribe
        // re-entrantly without holding a borrow across their call.
        let snapshot: Vec<(SubscriptionHandle, Callback)> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| match &s.watched {
                None => true,
                Some(watched) => watched.iter().any(|k| changed.contains(k)),
            })
            .map(|s| (s.handle, Rc::clone(&s.callback)))
            .collect();
        for (handle, callback) in snapshot {
            let still_registered = self
                .subscribers
                .borrow()
                .iter()
                .any(|s| s.handle == handle);
            if still_registered {
                callback(self, changed);
            }
        }
    }
}

fn parse_opt_date(value: &str) -> Option<Option<NaiveDate>> {
    if value.is_empty() {
        return Some(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(Some)
}
