// Example: the core flow without an adapter: mutate filters, encode a
// shareable URL, issue a full reload, and page through the results.
use listsync::{FetchCoordinator, RecordsPage, SetFilter, StateStore, encode};

fn fake_endpoint(offset: u64, limit: u32, total: u64) -> RecordsPage {
    let end = total.min(offset + limit as u64);
    RecordsPage {
        records: (offset..end)
            .map(|i| listsync::Record::new(format!("record-{i}")))
            .collect(),
        total: Some(total),
    }
}

fn main() {
    let store = StateStore::new();
    store.set_search("fire");
    store.add_to_filter(SetFilter::Topic, "arson");
    store.add_to_filter(SetFilter::Region, "hebron");
    println!("url query: ?{}", encode(&store.filters()));

    let mut c = FetchCoordinator::new();
    let req = c.apply_filters(&store.filters(), None, 0);
    println!("full reload: {}", req.to_query_string());
    c.complete(req.token, Ok(fake_endpoint(req.offset, req.limit, 42)));
    println!("after first page: {:?}", c.pagination());

    while let Some(req) = c.load_more(&store.filters(), None, 0) {
        c.complete(req.token, Ok(fake_endpoint(req.offset, req.limit, 42)));
        println!("appended up to offset {}", c.pagination().current_offset);
    }
    println!("records cached: {}", c.records().len());
}
