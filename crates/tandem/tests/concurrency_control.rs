//! Several participants editing through a sequencing server converge.

mod common;

use common::{op, string_array, text, Network};
use proptest::prelude::*;
use serde_json::json;
use tandem::model::{DataKind, DataValue};
use tandem::ot::ops::OpBody;

#[test]
fn concurrent_inserts_at_one_index_converge() {
    let mut net = Network::new(&string_array("list", 5), 2);
    net.clients[0].edit(op("list", OpBody::ArrayInsert { index: 3, value: text("a:0", "A") }));
    net.clients[1].edit(op("list", OpBody::ArrayInsert { index: 3, value: text("b:0", "B") }));

    // Both are sent against version 0 before either hears of the other.
    assert!(net.send(0));
    assert!(net.send(1));
    net.settle();

    net.assert_converged();
    assert_eq!(
        net.server.doc.to_json(),
        json!(["e0", "e1", "e2", "A", "B", "e3", "e4"])
    );
    for client in &net.clients {
        assert_eq!(client.control.context_version(), 2);
    }
}

#[test]
fn late_sender_rebases_queued_work() {
    let mut net = Network::new(&text("t", "hello"), 2);
    net.clients[0].edit(op("t", OpBody::StringInsert { index: 5, value: " world".into() }));
    net.clients[1].edit(op("t", OpBody::StringInsert { index: 0, value: ">".into() }));
    net.clients[1].edit(op("t", OpBody::StringRemove { index: 1, value: "h".into() }));

    net.send(0);
    net.settle();

    net.assert_converged();
    assert_eq!(net.server.doc.to_json(), json!(">ello world"));
}

#[test]
fn batched_edits_travel_as_one_operation() {
    let mut net = Network::new(&string_array("list", 2), 2);
    net.clients[0].control.begin_batch().unwrap();
    net.clients[0].edit(op("list", OpBody::ArrayRemove { index: 0 }));
    net.clients[0].edit(op("list", OpBody::ArrayInsert { index: 0, value: text("a:0", "A") }));
    let sent = net.clients[0].control.complete_batch().unwrap().unwrap();
    assert_eq!(sent.operation.discrete_ops().len(), 2);

    net.clients[1].edit(op("list", OpBody::ArrayMove { from: 1, to: 0 }));
    net.settle();

    net.assert_converged();
    assert_eq!(net.clients[0].control.context_version(), 2);
}

#[derive(Debug, Clone)]
enum Step {
    Edit { client: usize, kind: u8, at: usize, len: usize },
    /// Two edits collected into one compound operation.
    Batch { client: usize, kind: u8, at: usize, len: usize },
    Send(usize),
    Deliver(usize),
}

fn script(clients: usize) -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        3 => (0..clients, 0u8..8, any::<usize>(), 1usize..4)
            .prop_map(|(client, kind, at, len)| Step::Edit { client, kind, at, len }),
        1 => (0..clients, 0u8..8, any::<usize>(), 1usize..4)
            .prop_map(|(client, kind, at, len)| Step::Batch { client, kind, at, len }),
        2 => (0..clients).prop_map(Step::Send),
        2 => (0..clients).prop_map(Step::Deliver),
    ];
    prop::collection::vec(step, 1..40)
}

fn current_text(value: &DataValue) -> Vec<char> {
    match &value.kind {
        DataKind::String(s) => s.chars().collect(),
        other => panic!("expected a string, found {}", other.type_name()),
    }
}

fn current_len(value: &DataValue) -> usize {
    match &value.kind {
        DataKind::Array(items) => items.len(),
        other => panic!("expected an array, found {}", other.type_name()),
    }
}

fn run(net: &mut Network, steps: &[Step], mut edit: impl FnMut(&mut Network, usize, u8, usize, usize)) {
    for step in steps {
        match *step {
            Step::Edit { client, kind, at, len } => edit(net, client, kind, at, len),
            Step::Batch { client, kind, at, len } => {
                net.clients[client].control.begin_batch().expect("no batch is open");
                edit(net, client, kind, at, len);
                edit(net, client, kind.wrapping_add(1), at / 3, len);
                net.clients[client].control.complete_batch().expect("batch is open");
            }
            Step::Send(client) => {
                net.send(client);
            }
            Step::Deliver(client) => {
                net.deliver(client);
            }
        }
    }
    net.settle();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_text_editing_converges(steps in script(3)) {
        let mut net = Network::new(&text("t", "abcdef"), 3);
        run(&mut net, &steps, |net, client, kind, at, len| {
            let current = current_text(&net.clients[client].doc.snapshot());
            let body = match kind % 8 {
                6 => OpBody::StringSet { value: format!("s{client}").repeat(len) },
                k if k % 2 == 0 || current.is_empty() => OpBody::StringInsert {
                    index: at % (current.len() + 1),
                    value: format!("{client}").repeat(len),
                },
                _ => {
                    let index = at % current.len();
                    let count = len.min(current.len() - index);
                    OpBody::StringRemove {
                        index,
                        value: current[index..index + count].iter().collect(),
                    }
                }
            };
            net.clients[client].edit(op("t", body));
        });
        net.assert_converged();
    }

    #[test]
    fn random_list_editing_converges(steps in script(3)) {
        let mut net = Network::new(&string_array("list", 4), 3);
        let mut minted = 0usize;
        run(&mut net, &steps, |net, client, kind, at, len| {
            let items = current_len(&net.clients[client].doc.snapshot());
            minted += 1;
            let value = text(&format!("c{client}:{minted}"), "x");
            let body = match kind % 8 {
                6 => {
                    let fresh = (0..len - 1)
                        .map(|k| text(&format!("c{client}:{minted}:{k}"), "s"))
                        .collect();
                    OpBody::ArraySet { value: fresh }
                }
                _ if items == 0 => OpBody::ArrayInsert { index: 0, value },
                0 | 1 => OpBody::ArrayInsert { index: at % (items + 1), value },
                2 | 7 => OpBody::ArrayRemove { index: at % items },
                3 => OpBody::ArrayMove { from: at % items, to: (at / 7 + len) % items },
                4 => OpBody::ArrayReplace { index: at % items, value },
                _ => {
                    let shift = at % items;
                    OpBody::ArrayReorder { order: (0..items).map(|k| (k + shift) % items).collect() }
                }
            };
            net.clients[client].edit(op("list", body));
        });
        net.assert_converged();
    }
}

#[test]
fn reorder_and_set_race_through_the_server() {
    let mut net = Network::new(&string_array("list", 3), 3);
    net.clients[0].edit(op("list", OpBody::ArrayReorder { order: vec![2, 0, 1] }));
    net.clients[1].control.begin_batch().unwrap();
    net.clients[1].edit(op("list", OpBody::ArrayInsert { index: 1, value: text("b:0", "B") }));
    net.clients[1].edit(op("list", OpBody::ArrayRemove { index: 0 }));
    net.clients[1].control.complete_batch().unwrap();
    net.clients[2].edit(op("list", OpBody::ArraySet { value: vec![text("c:0", "C")] }));

    assert!(net.send(0));
    assert!(net.send(1));
    assert!(net.send(2));
    net.settle();

    net.assert_converged();
    assert_eq!(net.server.doc.to_json(), json!(["C"]));
}
