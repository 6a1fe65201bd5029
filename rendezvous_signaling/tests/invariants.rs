mod common;

use common::*;
use rendezvous_protocol::{ClientEvent, ConnectionId, ServerEvent};
use serde_json::json;
use std::sync::Arc;

#[test]
fn repeated_join_keeps_one_membership() {
    let (router, _outbox) = router();
    let a = connect(&router, "a");

    join(&router, &a, "r1");
    join(&router, &a, "r1");

    assert_eq!(router.state().room_members(&room("r1")), vec![a]);
    assert_consistent(&router);
}

#[test]
fn join_then_leave_restores_empty_table() {
    let (router, _outbox) = router();
    let a = connect(&router, "a");

    join(&router, &a, "r1");
    leave(&router, &a, None);

    assert_eq!(router.state().stats().rooms, 0);
    assert!(router.state().room_members(&room("r1")).is_empty());
    assert!(router.state().connection(&a).unwrap().room.is_none());
}

#[test]
fn leave_without_membership_emits_nothing() {
    let (router, outbox) = router();
    let a = connect(&router, "a");
    let b = connect(&router, "b");
    join(&router, &b, "r1");
    outbox.take();

    leave(&router, &a, None);
    leave(&router, &a, Some("r1"));
    leave(&router, &a, Some("missing"));

    assert!(outbox.take().is_empty());
    assert_eq!(router.state().room_members(&room("r1")), vec![b]);
}

#[test]
fn empty_leave_room_id_falls_back_to_current_room() {
    let (router, outbox) = router();
    let a = connect(&router, "a");
    let b = connect(&router, "b");
    join(&router, &a, "r1");
    join(&router, &b, "r1");
    outbox.take();

    leave(&router, &a, Some(""));

    assert_eq!(outbox.take_for(&b), vec![ServerEvent::UserLeft { user_id: a }]);
}

#[test]
fn signal_to_unknown_target_is_dropped_silently() {
    let (router, outbox) = router();
    let a = connect(&router, "a");

    signal(&router, &a, "never-existed", json!({"type": "offer"}));
    router
        .dispatch(
            &a,
            ClientEvent::Signal {
                target_id: None,
                signal: json!(null),
            },
        )
        .unwrap();

    assert!(outbox.take().is_empty());
}

#[test]
fn signal_to_departed_peer_is_dropped() {
    let (router, outbox) = router();
    let a = connect(&router, "a");
    let b = connect(&router, "b");
    router.disconnect(&b).unwrap();

    signal(&router, &a, "b", json!({"type": "answer"}));

    assert!(outbox.take().is_empty());
}

#[test]
fn broadcast_outside_a_room_is_dropped() {
    let (router, outbox) = router();
    let a = connect(&router, "a");

    broadcast(&router, &a, json!({"x": 1}));

    assert!(outbox.take().is_empty());
}

#[test]
fn duplicate_connect_is_rejected() {
    let (router, _outbox) = router();
    connect(&router, "a");

    assert!(router.connect(id("a")).is_err());
    assert_eq!(router.state().stats().connections, 1);
}

#[test]
fn mixed_sequence_stays_consistent() {
    let (router, _outbox) = router();
    let peers: Vec<ConnectionId> = (0..6).map(|n| connect(&router, &format!("p{n}"))).collect();

    for (n, peer) in peers.iter().enumerate() {
        join(&router, peer, if n % 2 == 0 { "even" } else { "odd" });
        assert_consistent(&router);
    }
    join(&router, &peers[0], "odd");
    assert_consistent(&router);
    leave(&router, &peers[1], None);
    assert_consistent(&router);
    router.disconnect(&peers[2]).unwrap();
    assert_consistent(&router);
    leave(&router, &peers[4], Some("odd"));
    assert_consistent(&router);

    assert_eq!(
        router.state().room_members(&room("odd")),
        vec![peers[3].clone(), peers[5].clone(), peers[0].clone()]
    );
    assert_eq!(router.state().room_members(&room("even")), vec![peers[4].clone()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_on_one_room_stays_consistent() {
    let (router, outbox) = router();
    let router = Arc::new(router);

    let mut tasks = Vec::new();
    for n in 0..16 {
        let router = Arc::clone(&router);
        tasks.push(tokio::spawn(async move {
            let me = connect(&router, &format!("peer-{n}"));
            for round in 0..25 {
                join(&router, &me, "hot");
                broadcast(&router, &me, json!({"round": round}));
                if round % 3 == 0 {
                    leave(&router, &me, None);
                }
            }
            join(&router, &me, "hot");
            if n % 2 == 0 {
                router.disconnect(&me).unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_consistent(&router);
    let stats = router.state().stats();
    assert_eq!(stats.connections, 8);
    assert_eq!(router.state().room_members(&room("hot")).len(), 8);

    // every user_joined count matches a membership that really existed
    for (_, event) in outbox.take() {
        if let ServerEvent::UserJoined { user_count, .. } = event {
            assert!((1..=16).contains(&user_count));
        }
    }
}
