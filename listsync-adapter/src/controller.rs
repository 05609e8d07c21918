use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use listsync::{
    DensityMode, FetchCoordinator, FetchError, FetchRequest, PageFilterResolver, RecordsPage,
    RequestToken, StateKey, StateStore, SubscriptionHandle, SyncEvent, WriteMode, decode, encode,
};

use crate::RenderSurface;
use crate::density::{DensityStore, DensitySwitcher, Renderer};

/// A side effect the host must execute, in order.
///
/// The controller never touches the network, the history stack, or the DOM
/// itself; it queues these and the host drains them via
/// [`Controller::take_effects`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Execute a records-endpoint request; report back through
    /// [`Controller::complete_fetch`] with the same token.
    IssueFetch(FetchRequest),
    /// Write `query` into the location/history stack with the given mode.
    WriteUrl { query: String, mode: WriteMode },
    /// Repaint from the (changed) record cache.
    Render,
}

/// Construction parameters for [`Controller`].
pub struct ControllerOptions {
    pub resolver: PageFilterResolver,
    /// The route path at load time, e.g. `/region/hebron`.
    pub route_path: String,
    /// The location query string at load time.
    pub initial_query: String,
    /// Fixed-header offset for scroll anchoring, in pixels.
    pub header_offset: i64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            resolver: PageFilterResolver::default(),
            route_path: "/".into(),
            initial_query: String::new(),
            header_offset: 0,
        }
    }
}

struct Inner {
    coordinator: FetchCoordinator,
    page_filter: Option<listsync::PageFilter>,
    effects: VecDeque<Effect>,
    on_event: Option<Rc<dyn Fn(&SyncEvent)>>,
    /// True while state is being reconciled *from* the URL; filter changes
    /// then write with `Replace` so back/forward semantics survive.
    reconciling: bool,
    now_ms: u64,
}

/// A framework-neutral controller that wires the state store, the URL codec,
/// the route-derived filter context, and the fetch coordinator together.
///
/// Data flow: a mutation on the injected [`StateStore`] (or a navigation
/// event) notifies the controller's subscription, which queues a URL write
/// and a full-reload fetch; completions reported by the host update the cache
/// and queue a repaint. Density switches replay the cache with no fetch.
///
/// Call [`Controller::dispose`] at teardown to release the subscription.
pub struct Controller<S> {
    store: Rc<StateStore>,
    inner: Rc<RefCell<Inner>>,
    switcher: DensitySwitcher<S>,
    subscription: Option<SubscriptionHandle>,
}

impl<S: DensityStore> Controller<S> {
    /// Builds the controller and performs the load sequence: resolve the page
    /// filter from the route (once, immutable), load the persisted density
    /// preference, decode the initial URL query into the store, and issue the
    /// initial full fetch.
    pub fn new(
        store: Rc<StateStore>,
        options: ControllerOptions,
        density_store: S,
        now_ms: u64,
    ) -> Self {
        let page_filter = options.resolver.detect(&options.route_path);
        let switcher = DensitySwitcher::new(options.header_offset, density_store);

        let inner = Rc::new(RefCell::new(Inner {
            coordinator: FetchCoordinator::new(),
            page_filter,
            effects: VecDeque::new(),
            on_event: None,
            reconciling: false,
            now_ms,
        }));

        store.set_density(switcher.stored_mode(), true);
        store.replace_filters(decode(&options.initial_query), true);

        let subscription = {
            let inner = Rc::clone(&inner);
            store.subscribe(Some(&StateKey::FILTER_KEYS), move |store, _| {
                let mut inner = inner.borrow_mut();
                let mode = if inner.reconciling {
                    WriteMode::Replace
                } else {
                    WriteMode::Push
                };
                let filters = store.filters();
                inner.effects.push_back(Effect::WriteUrl {
                    query: encode(&filters),
                    mode,
                });
                let now = inner.now_ms;
                let page = inner.page_filter.clone();
                let request = inner.coordinator.apply_filters(&filters, page.as_ref(), now);
                inner.effects.push_back(Effect::IssueFetch(request));
            })
        };

        let controller = Self {
            store,
            inner,
            switcher,
            subscription: Some(subscription),
        };
        controller.issue_full_reload();
        controller
    }

    pub fn on_event(&self, callback: impl Fn(&SyncEvent) + 'static) {
        self.inner.borrow_mut().on_event = Some(Rc::new(callback));
    }

    pub fn store(&self) -> &Rc<StateStore> {
        &self.store
    }

    /// The immutable route-derived filter context, if the route matched.
    pub fn page_filter(&self) -> Option<listsync::PageFilter> {
        self.inner.borrow().page_filter.clone()
    }

    pub fn records_len(&self) -> usize {
        self.inner.borrow().coordinator.records().len()
    }

    pub fn pagination(&self) -> listsync::Pagination {
        self.inner.borrow().coordinator.pagination()
    }

    /// Runs `f` against the cached record set without cloning it.
    pub fn with_records<R>(&self, f: impl FnOnce(&[listsync::Record]) -> R) -> R {
        f(self.inner.borrow().coordinator.records())
    }

    /// Drains the queued side effects, in order.
    pub fn take_effects(&self) -> Vec<Effect> {
        self.inner.borrow_mut().effects.drain(..).collect()
    }

    /// Advances the controller's clock (used for cache-busting tokens on
    /// requests triggered by store subscriptions).
    pub fn tick(&self, now_ms: u64) {
        self.inner.borrow_mut().now_ms = now_ms;
    }

    /// Handles a back/forward navigation: re-derives the filter state from
    /// the URL and refetches. The resulting URL write uses `Replace` so no
    /// new history entry is created.
    pub fn navigated(&self, query: &str, now_ms: u64) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.now_ms = now_ms;
            inner.reconciling = true;
        }
        self.store.replace_filters(decode(query), false);
        self.inner.borrow_mut().reconciling = false;
    }

    /// Reports a completed fetch. Stale results are discarded by the token
    /// check; applied results queue a repaint and emit the matching event.
    pub fn complete_fetch(&self, token: RequestToken, result: Result<RecordsPage, FetchError>) {
        let event = {
            let mut inner = self.inner.borrow_mut();
            match inner.coordinator.complete(token, result) {
                listsync::CompletionOutcome::Replaced { total } => {
                    inner.effects.push_back(Effect::Render);
                    Some(SyncEvent::FiltersApplied { total })
                }
                listsync::CompletionOutcome::Appended { appended, total } => {
                    inner.effects.push_back(Effect::Render);
                    Some(SyncEvent::RecordsAppended { appended, total })
                }
                listsync::CompletionOutcome::Discarded => None,
                listsync::CompletionOutcome::Failed(error) => {
                    Some(SyncEvent::LoadFailed { error })
                }
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    /// The external visibility signal: a sentinel neared the viewport. Issues
    /// an incremental load unless one is outstanding or everything is
    /// fetched.
    pub fn sentinel_visible(&self, now_ms: u64) {
        let filters = self.store.filters();
        let mut inner = self.inner.borrow_mut();
        inner.now_ms = now_ms;
        let page = inner.page_filter.clone();
        if let Some(request) = inner.coordinator.load_more(&filters, page.as_ref(), now_ms) {
            inner.effects.push_back(Effect::IssueFetch(request));
        }
    }

    /// The eager top-up rule: after a repaint, load more proactively when the
    /// unfetched remainder is small or the viewport can show more rows than
    /// are rendered.
    pub fn maybe_top_up(&self, rendered_rows: usize, viewport_rows: usize, now_ms: u64) {
        let should = self
            .inner
            .borrow()
            .coordinator
            .should_top_up(rendered_rows, viewport_rows);
        if should {
            self.sentinel_visible(now_ms);
        }
    }

    /// Switches rendering density: anchor capture, silent mode update,
    /// full-cache replay (no network), anchor restore. No-op if `mode` is
    /// already current.
    pub fn switch_density(
        &mut self,
        mode: DensityMode,
        renderer: &mut dyn Renderer,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        let switched = {
            let inner = self.inner.borrow();
            self.switcher.switch(
                mode,
                &self.store,
                inner.coordinator.records(),
                renderer,
                surface,
            )
        };
        if switched {
            self.emit(&SyncEvent::DensityChanged { mode });
        }
        switched
    }

    // Emits with no `inner` borrow held, so the callback may freely call back
    // into the controller.
    fn emit(&self, event: &SyncEvent) {
        let callback = self.inner.borrow().on_event.clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Releases the store subscription. Further store mutations no longer
    /// reach this controller.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
        }
    }

    fn issue_full_reload(&self) {
        let filters = self.store.filters();
        let mut inner = self.inner.borrow_mut();
        let now = inner.now_ms;
        let page = inner.page_filter.clone();
        let request = inner.coordinator.apply_filters(&filters, page.as_ref(), now);
        inner.effects.push_back(Effect::IssueFetch(request));
    }
}

impl<S> Drop for Controller<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(handle);
        }
    }
}
