use crate::*;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use serde_json::json;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn page(ids: &[&str], total: u64) -> RecordsPage {
    RecordsPage {
        records: ids.iter().map(|id| Record::new(*id)).collect(),
        total: Some(total),
    }
}

fn param<'a>(req: &'a FetchRequest, key: &str) -> Option<&'a str> {
    req.params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// --- store ---

#[test]
fn add_to_filter_is_a_set() {
    let store = StateStore::new();
    assert!(store.add_to_filter(SetFilter::Topic, "arson"));
    assert!(!store.add_to_filter(SetFilter::Topic, "arson"));
    assert_eq!(store.filters().topic, vec!["arson"]);
}

#[test]
fn remove_from_filter_absent_value_is_noop() {
    let store = StateStore::new();
    store.set_filter(SetFilter::Topic, vec!["arson".into(), "looting".into()]);
    assert!(!store.remove_from_filter(SetFilter::Topic, "fraud"));
    assert!(store.remove_from_filter(SetFilter::Topic, "arson"));
    assert_eq!(store.filters().topic, vec!["looting"]);
}

#[test]
fn set_filter_dedups_preserving_order() {
    let store = StateStore::new();
    store.set_filter(
        SetFilter::Region,
        vec!["a".into(), "b".into(), "a".into(), String::new()],
    );
    assert_eq!(store.filters().region, vec!["a", "b"]);
}

#[test]
fn watched_keys_gate_delivery() {
    let store = StateStore::new();
    let hits = Rc::new(Cell::new(0));
    let hits2 = Rc::clone(&hits);
    store.subscribe(Some(&[StateKey::Search]), move |_, _| {
        hits2.set(hits2.get() + 1);
    });
    store.set_filter(SetFilter::Topic, vec!["arson".into()]);
    assert_eq!(hits.get(), 0);
    store.set_search("fire");
    assert_eq!(hits.get(), 1);
    // Setting the same value again changes nothing, so nothing fires.
    store.set_search("fire");
    assert_eq!(hits.get(), 1);
}

#[test]
fn silent_update_suppresses_notification() {
    let store = StateStore::new();
    let hits = Rc::new(Cell::new(0));
    let hits2 = Rc::clone(&hits);
    store.subscribe(None, move |_, _| hits2.set(hits2.get() + 1));
    store.replace_filters(
        FilterState {
            search: "x".into(),
            ..Default::default()
        },
        true,
    );
    assert_eq!(hits.get(), 0);
    assert_eq!(store.filters().search, "x");
}

#[test]
fn reentrant_mutation_is_queued_not_nested() {
    let store = Rc::new(StateStore::new());
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_a = Rc::clone(&log);
    store.subscribe(Some(&[StateKey::Search]), move |s, _| {
        log_a.borrow_mut().push(format!("a:{}", s.filters().search));
        // Re-entrant mutation: must be delivered after this cycle completes.
        if s.filters().topic.is_empty() {
            s.add_to_filter(SetFilter::Topic, "arson");
        }
    });
    let log_b = Rc::clone(&log);
    store.subscribe(None, move |s, changed| {
        let tag = if changed.contains(&StateKey::Topic) {
            "b:topic"
        } else {
            "b:other"
        };
        log_b
            .borrow_mut()
            .push(format!("{tag}:{}", s.filters().topic.len()));
    });

    store.set_search("fire");
    // The search cycle runs to completion for both subscribers before the
    // queued topic cycle starts.
    assert_eq!(
        *log.borrow(),
        vec!["a:fire", "b:other:1", "b:topic:1"],
        "nested delivery must not interleave"
    );
}

#[test]
fn unsubscribe_stops_delivery() {
    let store = StateStore::new();
    let hits = Rc::new(Cell::new(0));
    let hits2 = Rc::clone(&hits);
    let handle = store.subscribe(None, move |_, _| hits2.set(hits2.get() + 1));
    store.set_search("a");
    assert!(store.unsubscribe(handle));
    assert!(!store.unsubscribe(handle));
    store.set_search("b");
    assert_eq!(hits.get(), 1);
}

#[test]
fn unknown_field_path_is_a_noop() {
    let store = StateStore::new();
    assert!(!store.set_field("filters.bogus", "x"));
    assert!(!store.set_field("filters.urgent", "maybe"));
    assert!(store.set_field("filters.search", "fire"));
    assert!(store.set_field("filters.urgent", "true"));
    assert_eq!(store.filters().urgent, Some(true));
}

#[test]
fn field_reads_by_path() {
    let store = StateStore::new();
    assert_eq!(store.field("filters.search"), Some(String::new()));
    store.set_field("filters.search", "fire");
    store.set_field("filters.date", "2024-03-05");
    assert_eq!(store.field("filters.search").as_deref(), Some("fire"));
    assert_eq!(store.field("filters.date").as_deref(), Some("2024-03-05"));
    assert_eq!(store.field("ui.density").as_deref(), Some("full"));
    assert_eq!(store.field("filters.bogus"), None);
}

#[test]
fn date_mutators_keep_single_date_and_range_exclusive() {
    let store = StateStore::new();
    store.set_date_range(Some(d("2024-01-01")), Some(d("2024-02-01")));
    store.set_date(Some(d("2024-03-05")));
    let f = store.filters();
    assert_eq!(f.date, Some(d("2024-03-05")));
    assert_eq!(f.date_from, None);
    assert_eq!(f.date_until, None);

    store.set_date_range(Some(d("2024-01-01")), None);
    assert_eq!(store.filters().date, None);
}

#[test]
fn clear_filters_resets_wholesale_but_keeps_density() {
    let store = StateStore::new();
    store.set_search("fire");
    store.add_to_filter(SetFilter::Region, "hebron");
    store.set_density(DensityMode::Mini, false);
    store.clear_filters();
    assert!(store.filters().is_default());
    assert_eq!(store.density(), DensityMode::Mini);
}

// --- codec ---

#[test]
fn encode_emits_only_nonempty_fields() {
    assert_eq!(encode(&FilterState::default()), "");
    let mut f = FilterState::default();
    f.search = "fire".into();
    f.topic = vec!["arson".into(), "looting".into()];
    assert_eq!(encode(&f), "search=fire&topic=arson,looting");
}

#[test]
fn single_date_wins_over_range_in_encoding() {
    let mut f = FilterState::default();
    f.date = Some(d("2024-03-05"));
    f.date_from = Some(d("2024-01-01"));
    f.date_until = Some(d("2024-02-01"));
    assert_eq!(encode(&f), "date=2024-03-05");
}

#[test]
fn decode_scenario_a() {
    let f = decode("?search=fire&topic=arson,looting&region=hebron");
    assert_eq!(f.search, "fire");
    assert_eq!(f.topic, vec!["arson", "looting"]);
    assert_eq!(f.region, vec!["hebron"]);
    assert_eq!(f.urgent, None);
}

#[test]
fn decode_ignores_unknown_and_malformed_parameters() {
    let f = decode("search=x&bogus=1&date=not-a-date&urgent=maybe&topic=");
    assert_eq!(f.search, "x");
    assert_eq!(f.date, None);
    assert_eq!(f.urgent, None);
    assert!(f.topic.is_empty());
}

#[test]
fn decode_prefers_single_date_when_both_present() {
    let f = decode("date=2024-03-05&dateFrom=2024-01-01&dateUntil=2024-02-01");
    assert_eq!(f.date, Some(d("2024-03-05")));
    assert_eq!(f.date_from, None);
    assert_eq!(f.date_until, None);
}

#[test]
fn identifiers_with_commas_survive_percent_encoded() {
    let mut f = FilterState::default();
    f.topic = vec!["a,b".into(), "c".into()];
    let q = encode(&f);
    assert_eq!(q, "topic=a%2Cb,c");
    assert_eq!(decode(&q), f);
}

#[test]
fn codec_round_trips_mutator_reachable_states() {
    let store = StateStore::new();
    store.set_search("brush fire & smoke");
    store.set_urgent(Some(false));
    store.set_date_range(Some(d("2023-11-01")), Some(d("2023-12-31")));
    store.add_to_filter(SetFilter::Topic, "arson");
    store.add_to_filter(SetFilter::Topic, "looting");
    store.add_to_filter(SetFilter::Reporter, "field team 7");
    let s = store.filters();
    assert_eq!(decode(&encode(&s)), s);

    store.set_date(Some(d("2024-03-05")));
    store.clear_filters();
    let s = store.filters();
    assert_eq!(decode(&encode(&s)), s);
}

// --- route ---

#[test]
fn resolver_first_match_wins_most_specific_first() {
    let resolver = PageFilterResolver::new(vec![
        RoutePattern::new(SetFilter::Locality, "/region/{slug}/local"),
        RoutePattern::new(SetFilter::Region, "/region/{slug}"),
    ]);
    let pf = resolver.detect("/region/hebron/local").unwrap();
    assert_eq!(pf.kind, SetFilter::Locality);
    assert_eq!(pf.slug, "hebron");
    let pf = resolver.detect("/region/hebron").unwrap();
    assert_eq!(pf.kind, SetFilter::Region);
}

#[test]
fn resolver_no_match_yields_none() {
    let resolver = PageFilterResolver::default();
    assert_eq!(resolver.detect("/"), None);
    assert_eq!(resolver.detect("/about"), None);
    assert_eq!(resolver.detect("/topic/arson/extra"), None);
}

#[test]
fn resolver_ignores_query_and_trailing_slash_and_decodes_slug() {
    let resolver = PageFilterResolver::default();
    let pf = resolver.detect("/topic/west%20bank/?search=x").unwrap();
    assert_eq!(pf.kind, SetFilter::Topic);
    assert_eq!(pf.slug, "west bank");
}

#[test]
fn page_filter_union_deduplicates() {
    let pf = PageFilter {
        kind: SetFilter::Region,
        slug: "hebron".into(),
    };
    assert_eq!(
        pf.union_into(&["nablus".into(), "hebron".into()]),
        vec!["hebron", "nablus"]
    );
}

// --- coordinator ---

#[test]
fn scenario_a_full_reload_sets_pagination() {
    let filters = decode("search=fire&topic=arson,looting&region=hebron");
    let pf = PageFilter {
        kind: SetFilter::Region,
        slug: "ramallah".into(),
    };
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, Some(&pf), 1_000);
    assert_eq!(req.kind, LoadKind::Full);
    assert_eq!(req.offset, 0);
    assert_eq!(req.limit, FIRST_PAGE_LIMIT);
    assert_eq!(param(&req, "search"), Some("fire"));
    assert_eq!(param(&req, "topic"), Some("arson,looting"));
    // Page-filter slug unioned into the user-chosen region values.
    assert_eq!(param(&req, "region"), Some("ramallah,hebron"));
    assert_eq!(param(&req, "_"), Some("1000"));

    let ids: Vec<String> = (0..15).map(|i| format!("r{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let outcome = c.complete(req.token, Ok(page(&id_refs, 42)));
    assert_eq!(outcome, CompletionOutcome::Replaced { total: 42 });
    let p = c.pagination();
    assert_eq!(p.current_offset, 15);
    assert_eq!(p.total_count, 42);
    assert!(p.has_more());
    assert!(!p.is_loading);
}

#[test]
fn token_monotonicity() {
    let mut c = FetchCoordinator::new();
    let initial = c.current_token();
    let filters = FilterState::default();
    for _ in 0..5 {
        c.apply_filters(&filters, None, 0);
    }
    assert_eq!(c.current_token(), initial + 5);
}

#[test]
fn scenario_c_stale_full_reload_never_lands() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req_n = c.apply_filters(&filters, None, 0);
    let req_n1 = c.apply_filters(&filters, None, 1);

    // Token N's response arrives after N+1 was issued: discarded unapplied.
    assert_eq!(
        c.complete(req_n.token, Ok(page(&["stale"], 1))),
        CompletionOutcome::Discarded
    );
    assert!(c.records().is_empty());

    assert_eq!(
        c.complete(req_n1.token, Ok(page(&["fresh"], 1))),
        CompletionOutcome::Replaced { total: 1 }
    );
    assert_eq!(c.records()[0].id, "fresh");
}

#[test]
fn load_more_is_single_flight() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a", "b"], 10)));

    let first = c.load_more(&filters, None, 2).expect("should issue");
    assert_eq!(first.kind, LoadKind::Incremental);
    assert_eq!(first.offset, 2);
    assert_eq!(first.limit, PAGE_LIMIT);
    // Overlapping call: no second network request.
    assert_eq!(c.load_more(&filters, None, 3), None);

    assert_eq!(
        c.complete(first.token, Ok(page(&["c"], 10))),
        CompletionOutcome::Appended {
            appended: 1,
            total: 10
        }
    );
    assert_eq!(c.pagination().current_offset, 3);
}

#[test]
fn load_more_noop_when_nothing_more() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a"], 1)));
    assert!(!c.pagination().has_more());
    assert_eq!(c.load_more(&filters, None, 0), None);
}

#[test]
fn apply_filters_cancels_pending_incremental() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a"], 5)));
    let inc = c.load_more(&filters, None, 1).unwrap();

    let full = c.apply_filters(&filters, None, 2);
    assert!(full.token > inc.token);
    // The preempted incremental resolves afterward and is suppressed.
    assert_eq!(
        c.complete(inc.token, Ok(page(&["late"], 5))),
        CompletionOutcome::Discarded
    );
    c.complete(full.token, Ok(page(&["b"], 5)));
    assert_eq!(c.records().len(), 1);
    assert_eq!(c.records()[0].id, "b");
}

#[test]
fn pagination_invariant_holds_after_any_sequence() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();

    let check = |c: &FetchCoordinator| {
        let p = c.pagination();
        assert!(p.current_offset <= p.total_count);
        assert_eq!(p.has_more(), p.current_offset < p.total_count);
    };

    check(&c);
    let req = c.apply_filters(&filters, None, 0);
    check(&c);
    // A server that under-reports the total never breaks the invariant.
    c.complete(req.token, Ok(page(&["a", "b", "c"], 2)));
    check(&c);

    let req = c.apply_filters(&filters, None, 1);
    c.complete(req.token, Ok(page(&["a"], 4)));
    check(&c);
    let inc = c.load_more(&filters, None, 2).unwrap();
    check(&c);
    c.complete(inc.token, Ok(page(&["b", "c", "d"], 4)));
    check(&c);
    assert!(!c.pagination().has_more());
}

#[test]
fn failure_clears_loading_and_preserves_cache() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a"], 3)));

    let inc = c.load_more(&filters, None, 1).unwrap();
    let outcome = c.complete(inc.token, Err(FetchError::Transport("boom".into())));
    assert_eq!(
        outcome,
        CompletionOutcome::Failed(FetchError::Transport("boom".into()))
    );
    assert!(!c.is_loading());
    assert_eq!(c.records().len(), 1);
    assert_eq!(c.pagination().current_offset, 1);

    // Retriable cleanly.
    let retry = c.load_more(&filters, None, 2).unwrap();
    c.complete(retry.token, Ok(page(&["b"], 3)));
    assert_eq!(c.records().len(), 2);
}

#[test]
fn incremental_append_dedups_by_id() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a", "b"], 4)));
    let inc = c.load_more(&filters, None, 1).unwrap();
    c.complete(inc.token, Ok(page(&["b", "c"], 4)));
    let ids: Vec<&str> = c.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn top_up_rule() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 0);
    c.complete(req.token, Ok(page(&["a", "b"], 8)));

    // Remainder (6) is small: top up without the visibility signal.
    assert!(c.should_top_up(2, 2));
    // Viewport can show more rows than are rendered: top up.
    let req = c.apply_filters(&filters, None, 1);
    c.complete(req.token, Ok(page(&["a", "b"], 100)));
    assert!(c.should_top_up(2, 10));
    // Plenty unfetched and the viewport is already covered: wait.
    assert!(!c.should_top_up(10, 5));
    // Nothing left to fetch: never.
    let req = c.apply_filters(&filters, None, 2);
    c.complete(req.token, Ok(page(&["a"], 1)));
    assert!(!c.should_top_up(0, 50));
}

#[test]
fn record_lookup_returns_full_payload() {
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&FilterState::default(), None, 0);
    let body = json!({
        "records": [
            {"id": "r1", "title": "Brush fire", "urgent": true},
            {"id": "r2", "title": "Road closure"}
        ],
        "total": 2
    });
    c.complete_value(req.token, &body);
    let r = c.record("r1").unwrap();
    assert_eq!(r.payload["title"], "Brush fire");
    assert_eq!(c.record("missing"), None);
}

#[test]
fn query_string_rendering_percent_encodes() {
    let mut filters = FilterState::default();
    filters.search = "brush fire".into();
    filters.topic = vec!["a,b".into()];
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&filters, None, 7);
    let q = req.to_query_string();
    assert!(q.contains("search=brush%20fire"));
    assert!(q.contains("topic=a%2Cb"));
    assert!(q.contains("limit=15"));
    assert!(q.contains("_=7"));
}

// --- lenient response parsing ---

#[test]
fn missing_fields_behave_as_empty_page() {
    let page = RecordsPage::from_json("{}").unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.total, None);

    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&FilterState::default(), None, 0);
    assert_eq!(
        c.complete_json(req.token, "{}"),
        CompletionOutcome::Replaced { total: 0 }
    );
    assert!(!c.pagination().has_more());
}

#[test]
fn non_json_body_is_malformed() {
    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&FilterState::default(), None, 0);
    match c.complete_json(req.token, "<html>oops</html>") {
        CompletionOutcome::Failed(FetchError::Malformed(_)) => {}
        other => panic!("expected malformed failure, got {other:?}"),
    }
    assert!(!c.is_loading());
}

#[test]
fn records_without_id_are_skipped() {
    let page = RecordsPage::from_value(&json!({
        "items": [{"id": "a"}, {"title": "no id"}, {"id": ""}, 7],
        "totalCount": 9
    }));
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].id, "a");
    assert_eq!(page.total, Some(9));
}

// --- misc types ---

#[test]
fn density_preference_falls_back_to_default() {
    assert_eq!(DensityMode::from_stored(None), DensityMode::Full);
    assert_eq!(DensityMode::from_stored(Some("garbage")), DensityMode::Full);
    assert_eq!(DensityMode::from_stored(Some("mini")), DensityMode::Mini);
    assert_eq!(DensityMode::Mini.as_str(), "mini");
}

#[test]
fn active_tag_count_counts_range_once() {
    let store = StateStore::new();
    store.set_search("x");
    store.set_date_range(Some(d("2024-01-01")), Some(d("2024-02-01")));
    store.set_urgent(Some(true));
    store.add_to_filter(SetFilter::Topic, "a");
    store.add_to_filter(SetFilter::Topic, "b");
    assert_eq!(store.filters().active_tag_count(), 5);
}
