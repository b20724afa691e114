//! Discovery nodes finding each other over loopback UDP.

use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::{Duration, Instant};

use peer_explorer::{Discovery, ExecState, NodeId};

fn node(bootstrap: &[String]) -> Discovery {
    Discovery::builder()
        .bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .bootstrap(bootstrap)
        .network_id(3)
        .update_period(Duration::from_millis(100))
        .clean_period(Duration::from_millis(100))
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);

    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }

    false
}

fn peer_ids(discovery: &Discovery) -> Vec<NodeId> {
    discovery
        .get_nodes()
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect()
}

#[test]
fn two_nodes_handshake() {
    let mut seed = node(&[]);
    let seed_info = seed.info().unwrap();

    let mut joiner = node(&[seed_info.local_addr().to_string()]);
    let joiner_info = joiner.info().unwrap();

    assert_eq!(joiner_info.state(), ExecState::Running);

    assert!(wait_for(|| peer_ids(&joiner) == vec![*seed_info.id()]));
    assert!(wait_for(|| peer_ids(&seed) == vec![*joiner_info.id()]));

    joiner.shutdown();
    seed.shutdown();
}

#[test]
fn discover_through_neighbors() {
    let mut seed = node(&[]);
    let seed_address = seed.info().unwrap().local_addr().to_string();

    let mut first = node(&[seed_address.clone()]);
    assert!(wait_for(|| first.get_nodes().unwrap().len() == 1));

    let mut second = node(&[seed_address]);
    let first_id = *first.info().unwrap().id();

    // The seed introduces the first node to the second on an update tick.
    assert!(wait_for(|| peer_ids(&second).contains(&first_id)));

    second.shutdown();
    first.shutdown();
    seed.shutdown();
}

#[test]
fn other_network_is_ignored() {
    let mut seed = node(&[]);
    let seed_address = seed.info().unwrap().local_addr().to_string();

    let mut stranger = Discovery::builder()
        .bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .bootstrap(&[seed_address])
        .network_id(4)
        .build()
        .unwrap();

    thread::sleep(Duration::from_millis(500));

    assert!(seed.get_nodes().unwrap().is_empty());
    assert!(stranger.get_nodes().unwrap().is_empty());

    stranger.shutdown();
    seed.shutdown();
}
