// Example: drive a Controller with a simulated host: the host drains the
// effect queue, "executes" fetches, and reports completions back.
use std::rc::Rc;

use listsync::{Record, RecordsPage, SetFilter, StateStore};
use listsync_adapter::{Controller, ControllerOptions, DensityStore, Effect};

struct NoDensityStore;

impl DensityStore for NoDensityStore {
    fn load(&self) -> Option<String> {
        None
    }
    fn save(&mut self, _value: &str) {}
}

fn serve(offset: u64, limit: u32) -> RecordsPage {
    let total = 37u64;
    RecordsPage {
        records: (offset..total.min(offset + limit as u64))
            .map(|i| Record::new(format!("r{i}")))
            .collect(),
        total: Some(total),
    }
}

fn drain(c: &Controller<NoDensityStore>) {
    for effect in c.take_effects() {
        match effect {
            Effect::IssueFetch(req) => {
                println!("GET ?{}", req.to_query_string());
                c.complete_fetch(req.token, Ok(serve(req.offset, req.limit)));
            }
            Effect::WriteUrl { query, mode } => println!("history {mode:?}: ?{query}"),
            Effect::Render => println!("render {} records", c.records_len()),
        }
    }
}

fn main() {
    let store = Rc::new(StateStore::new());
    let c = Controller::new(
        Rc::clone(&store),
        ControllerOptions {
            route_path: "/region/hebron".into(),
            initial_query: "?search=fire".into(),
            ..Default::default()
        },
        NoDensityStore,
        0,
    );
    drain(&c);
    drain(&c); // the completion queued a render

    // The user adds a topic tag: one URL push, one full reload.
    store.add_to_filter(SetFilter::Topic, "arson");
    drain(&c);
    drain(&c);

    // The sentinel nears the viewport: one incremental page.
    c.sentinel_visible(5);
    drain(&c);
    drain(&c);
    println!("pagination: {:?}", c.pagination());
}
