// Example: out-of-order responses are suppressed by the request token.
//
// The coordinator never aborts in-flight work at the transport layer; it
// discards superseded results at completion time instead.
use listsync::{CompletionOutcome, FetchCoordinator, FilterState, Record, RecordsPage};

fn page_of(id: &str) -> RecordsPage {
    RecordsPage {
        records: vec![Record::new(id)],
        total: Some(1),
    }
}

fn main() {
    let filters = FilterState::default();
    let mut c = FetchCoordinator::new();

    // Two rapid filter applications: the first request is now stale.
    let slow = c.apply_filters(&filters, None, 0);
    let fast = c.apply_filters(&filters, None, 1);

    // The newer response lands first.
    let outcome = c.complete(fast.token, Ok(page_of("fresh")));
    println!("fast completion: {outcome:?}");

    // The stale response arrives late and is dropped unapplied.
    let outcome = c.complete(slow.token, Ok(page_of("stale")));
    assert_eq!(outcome, CompletionOutcome::Discarded);
    println!("slow completion: {outcome:?}");

    println!(
        "cache holds: {:?}",
        c.records().iter().map(|r| r.id.as_str()).collect::<Vec<_>>()
    );
}
