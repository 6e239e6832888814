// PathSim: Packet path simulation and topology validation for virtual networks
// Copyright (C) 2026 The PathSim Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::net::Ipv4Addr;

use pretty_assertions::assert_eq;
use test_log::test;

use crate::trace::{lock, HopAction, Trace, TraceState, TraceStore};

fn trace(id: &str) -> Trace {
    Trace::new(
        id,
        "h1",
        "h2",
        Ipv4Addr::new(10, 0, 0, 1),
        Ipv4Addr::new(10, 0, 0, 2),
        "start",
    )
}

fn actions(t: &Trace) -> Vec<HopAction> {
    t.hops().iter().map(|h| h.action).collect()
}

#[test]
fn lifecycle() {
    let mut t = trace("t1");
    assert_eq!(t.state(), TraceState::InProgress);
    assert_eq!(t.current_node(), "h1");
    assert!(!t.success());

    assert!(t.push_hop("h1", HopAction::Forward, "Forwarding to h2"));
    assert!(t.push_hop("h2", HopAction::Receive, "received"));
    assert!(t.complete(true, None));
    assert!(t.is_completed());
    assert!(t.success());
    assert_eq!(t.error(), None);
    assert_eq!(
        actions(&t),
        vec![
            HopAction::Start,
            HopAction::Forward,
            HopAction::Receive,
            HopAction::End
        ]
    );
    assert_eq!(t.hops()[3].node, "h2");
    assert!(t.rtt_ms().unwrap() >= 0.0);

    // completed traces never change
    let before = t.clone();
    assert!(!t.push_hop("h2", HopAction::Forward, "again"));
    assert!(!t.complete(false, Some("late".to_string())));
    assert_eq!(t, before);
}

#[test]
fn success_requires_destination() {
    let mut t = trace("t1");
    t.push_hop("s1", HopAction::Forward, "Forwarding to h2");
    assert!(t.complete(true, None));
    assert!(!t.success());
    assert_eq!(t.hops().last().unwrap().details, "Trace completed without reaching h2");

    let mut t = trace("t2");
    t.push_hop("h2", HopAction::Receive, "received");
    assert!(t.complete(true, Some("broken".to_string())));
    assert!(!t.success());
    assert_eq!(t.error(), Some("broken"));
    assert_eq!(t.hops().last().unwrap().details, "Trace failed: broken");
}

#[test]
fn timestamps_never_decrease() {
    let mut t = trace("t1");
    for i in 0..50 {
        t.push_hop(format!("s{}", i), HopAction::Forward, "");
    }
    t.complete(false, None);
    for w in t.hops().windows(2) {
        assert!(w[0].time <= w[1].time);
    }
}

#[test]
fn report() {
    let mut t = trace("t1");
    t.push_hop("h2", HopAction::Receive, "received");
    t.complete(true, None);
    let report = serde_json::to_value(t.report()).unwrap();
    assert_eq!(report["id"], "t1");
    assert_eq!(report["source_node"], "h1");
    assert_eq!(report["destination_node"], "h2");
    assert_eq!(report["current_node"], "h2");
    assert_eq!(report["state"], "completed");
    assert_eq!(report["source_ip"], "10.0.0.1");
    assert_eq!(report["completed"], true);
    assert_eq!(report["success"], true);
    assert_eq!(report["error"], serde_json::Value::Null);
    assert_eq!(report["hops"][0]["action"], "start");
    assert_eq!(report["hops"][2]["action"], "end");
}

#[test]
fn store_evicts_completed_first() {
    let mut store = TraceStore::new(2);
    store.insert(trace("a")).unwrap();
    let b = store.insert(trace("b")).unwrap();
    lock(&b).complete(false, None);

    store.insert(trace("c")).unwrap();
    assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a", "c"]);
    assert!(store.get("b").is_none());

    // all in progress: the store grows instead of dropping a running trace
    store.insert(trace("d")).unwrap();
    assert_eq!(store.ids().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    assert_eq!(store.len(), 3);

    // once some are completed, the oldest completed ones make room again
    lock(&store.handle("a").unwrap()).complete(false, None);
    lock(&store.handle("c").unwrap()).complete(false, None);
    store.insert(trace("e")).unwrap();
    assert_eq!(store.ids().collect::<Vec<_>>(), vec!["d", "e"]);
}

#[test]
fn store_replaces_completed_id_only() {
    let mut store = TraceStore::new(0);
    assert_eq!(store.capacity(), 1);
    assert!(store.is_empty());
    let first = store.insert(trace("a")).unwrap();

    // the first trace is still running
    let rejected = store.insert(trace("a")).unwrap_err();
    assert_eq!(rejected.id(), "a");
    assert_eq!(store.len(), 1);

    // writes through the handle are visible in the store
    assert!(lock(&first).push_hop("h1", HopAction::Send, ""));
    assert_eq!(store.get("a").unwrap().hops().len(), 2);

    lock(&first).complete(false, None);
    let second = store.insert(trace("a")).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("a").unwrap().hops().len(), 1);

    // the replaced trace stays frozen, the new one is written through its own handle
    assert!(!lock(&first).push_hop("h1", HopAction::Send, ""));
    assert!(lock(&second).push_hop("h1", HopAction::Send, ""));
    assert!(store.remove("a").is_some());
    assert!(store.get("a").is_none());
}
