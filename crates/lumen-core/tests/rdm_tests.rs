mod common;

use std::rc::Rc;

use common::{discovery_recorder, rdm_recorder, uid_set, Harness, MockOutputPort, TEST_UNIVERSE};
use lumen_core::rdm::{RdmFrame, RdmReply, RdmRequest, RdmResponse, RdmStatusCode};
use lumen_core::{Counter, Uid, Universe};

const CONTROLLER: Uid = Uid::new(0x7a70, 1);
const RESPONDER_A: Uid = Uid::new(0x7a70, 0x10);
const RESPONDER_B: Uid = Uid::new(0x7a70, 0x20);

fn get_request(destination: Uid) -> RdmRequest {
    RdmRequest::get(CONTROLLER, destination, 0, 1, 0, 0x0060, Vec::new())
}

fn dub_request() -> RdmRequest {
    RdmRequest::discovery_unique_branch(
        CONTROLLER,
        Uid::new(0, 0),
        Uid::new(0xfffe, 0xffff_ffff),
        0,
    )
}

/// A universe with `count` output ports
fn universe_with_ports(harness: &Harness, count: usize) -> (Universe, Vec<Rc<MockOutputPort>>) {
    let mut universe = harness.universe(TEST_UNIVERSE);
    let ports: Vec<_> = (0..count)
        .map(|i| MockOutputPort::new(&format!("out-{i}")))
        .collect();
    for port in &ports {
        universe.add_output_port(port.clone());
    }
    (universe, ports)
}

/// Teach the universe that `uid` lives behind `port`
fn discover(universe: &mut Universe, port: &MockOutputPort, uids: &[Uid]) {
    port.set_responders(uids);
    let (_, callback) = discovery_recorder();
    universe.run_rdm_discovery(callback, true);
    port.complete_discovery();
}

#[test]
fn test_unknown_uid_is_deferred() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 2);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_A), callback);

    // nothing runs on the caller's stack
    assert!(replies.borrow().is_empty());
    assert!(ports.iter().all(|port| port.requests.borrow().is_empty()));

    assert_eq!(harness.tasks.run_pending(), 1);
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::UnknownUid)]
    );
}

#[test]
fn test_unicast_goes_to_owning_port_only() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 2);
    ports[1].set_responders(&[RESPONDER_A]);
    let (_, callback) = discovery_recorder();
    universe.run_rdm_discovery(callback, true);
    ports[0].complete_discovery();
    ports[1].complete_discovery();
    assert_eq!(universe.port_for_uid(&RESPONDER_A), Some(ports[1].id()));

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_A), callback);

    assert!(ports[0].requests.borrow().is_empty());
    assert_eq!(ports[1].requests.borrow().len(), 1);
    assert!(replies.borrow().is_empty());

    ports[1].complete_rdm_status(RdmStatusCode::CompletedOk);
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::CompletedOk)]
    );
    assert!(harness.tasks.is_empty());
    assert_eq!(
        harness.metrics.counter(TEST_UNIVERSE, Counter::RdmRequests),
        Some(1)
    );
}

#[test]
fn test_unicast_response_reaches_caller_unchanged() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 1);
    discover(&mut universe, &ports[0], &[RESPONDER_A]);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_A), callback);

    let response = RdmResponse {
        source_uid: RESPONDER_A,
        destination_uid: CONTROLLER,
        transaction_number: 0,
        response_type: 0,
        sub_device: 0,
        param_id: 0x0060,
        param_data: vec![0x01, 0x00, 0x00, 0x01],
    };
    ports[0].complete_rdm(RdmReply::with_response(response.clone()));

    let replies = replies.borrow();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status_code, RdmStatusCode::CompletedOk);
    assert_eq!(replies[0].response.as_ref(), Some(&response));
}

#[test]
fn test_broadcast_without_ports_is_deferred() {
    let harness = Harness::new();
    let universe = harness.universe(TEST_UNIVERSE);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(Uid::all_devices()), callback);
    assert!(replies.borrow().is_empty());

    harness.tasks.run_pending();
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::WasBroadcast)]
    );
}

#[test]
fn test_dub_without_ports_times_out() {
    let harness = Harness::new();
    let universe = harness.universe(TEST_UNIVERSE);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(dub_request(), callback);
    harness.tasks.run_pending();
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::Timeout)]
    );
}

#[test]
fn test_broadcast_fans_out_and_completes_once() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 3);

    let (replies, callback) = rdm_recorder();
    let request = get_request(Uid::vendorcast(0x7a70));
    universe.send_rdm_request(request.clone(), callback);

    for port in &ports {
        assert_eq!(*port.requests.borrow(), vec![request.clone()]);
    }

    ports[2].complete_rdm_status(RdmStatusCode::WasBroadcast);
    ports[0].complete_rdm_status(RdmStatusCode::WasBroadcast);
    assert!(replies.borrow().is_empty());

    ports[1].complete_rdm_status(RdmStatusCode::WasBroadcast);
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::WasBroadcast)]
    );
}

#[test]
fn test_broadcast_reports_last_failure() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 3);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(Uid::all_devices()), callback);

    ports[0].complete_rdm_status(RdmStatusCode::FailedToSend);
    ports[1].complete_rdm_status(RdmStatusCode::WasBroadcast);
    ports[2].complete_rdm_status(RdmStatusCode::Timeout);

    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::Timeout)]
    );
}

#[test]
fn test_synchronous_port_replies_are_deferred_for_broadcast() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 2);
    for port in &ports {
        port.reply_immediately(RdmReply::from_status(RdmStatusCode::WasBroadcast));
    }

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(Uid::all_devices()), callback);
    assert!(replies.borrow().is_empty());

    assert_eq!(harness.tasks.run_pending(), 1);
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::WasBroadcast)]
    );
}

#[test]
fn test_synchronous_port_reply_is_deferred_for_unicast() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 1);
    discover(&mut universe, &ports[0], &[RESPONDER_A]);
    ports[0].reply_immediately(RdmReply::from_status(RdmStatusCode::CompletedOk));

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_A), callback);
    assert_eq!(ports[0].requests.borrow().len(), 1);
    assert!(replies.borrow().is_empty());

    harness.tasks.run_pending();
    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::CompletedOk)]
    );
}

#[test]
fn test_unicast_through_port_added_to_universe() {
    let harness = Harness::new();
    let mut universe = harness.universe(TEST_UNIVERSE);
    let port = MockOutputPort::new("out");
    universe.add_output_port(port.clone());
    discover(&mut universe, &port, &[RESPONDER_B]);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_B), callback);
    port.complete_rdm_status(RdmStatusCode::CompletedOk);

    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::CompletedOk)]
    );
}

#[test]
fn test_dub_prefers_responses_and_keeps_frames() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 3);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(dub_request(), callback);
    for port in &ports {
        assert!(port.requests.borrow()[0].is_dub());
    }

    ports[0].complete_rdm(RdmReply::with_frames(
        RdmStatusCode::DubResponse,
        vec![RdmFrame::new(vec![0xfe, 0xfe, 0xaa])],
    ));
    ports[1].complete_rdm_status(RdmStatusCode::Timeout);
    ports[2].complete_rdm(RdmReply::with_frames(
        RdmStatusCode::DubResponse,
        vec![RdmFrame::new(vec![0xaa, 0x55])],
    ));

    let replies = replies.borrow();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status_code, RdmStatusCode::DubResponse);
    assert_eq!(
        replies[0].frames,
        vec![
            RdmFrame::new(vec![0xfe, 0xfe, 0xaa]),
            RdmFrame::new(vec![0xaa, 0x55]),
        ]
    );
}

#[test]
fn test_dub_timeout_beats_failure() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 2);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(dub_request(), callback);
    ports[0].complete_rdm_status(RdmStatusCode::Timeout);
    ports[1].complete_rdm_status(RdmStatusCode::FailedToSend);

    assert_eq!(replies.borrow()[0].status_code, RdmStatusCode::Timeout);
}

#[test]
fn test_lost_port_completion_still_releases_broadcast() {
    let harness = Harness::new();
    let (universe, ports) = universe_with_ports(&harness, 2);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(Uid::all_devices()), callback);

    ports[0].complete_rdm_status(RdmStatusCode::FailedToSend);
    assert!(replies.borrow().is_empty());
    ports[1].lose_rdm();

    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::FailedToSend)]
    );
}

#[test]
fn test_unpatched_port_completion_is_discarded_but_counted() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 2);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(Uid::all_devices()), callback);

    universe.remove_output_port(&ports[1].id());

    ports[1].complete_rdm_status(RdmStatusCode::Timeout);
    assert!(replies.borrow().is_empty());
    ports[0].complete_rdm_status(RdmStatusCode::WasBroadcast);

    assert_eq!(
        *replies.borrow(),
        vec![RdmReply::from_status(RdmStatusCode::WasBroadcast)]
    );
}

#[test]
fn test_unicast_to_removed_port_never_completes() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 1);
    discover(&mut universe, &ports[0], &[RESPONDER_B]);

    let (replies, callback) = rdm_recorder();
    universe.send_rdm_request(get_request(RESPONDER_B), callback);
    universe.remove_output_port(&ports[0].id());

    ports[0].complete_rdm_status(RdmStatusCode::CompletedOk);
    harness.tasks.run_pending();
    assert!(replies.borrow().is_empty());
}

#[test]
fn test_transaction_numbers_advance() {
    let harness = Harness::new();
    let mut universe = harness.universe(TEST_UNIVERSE);
    assert_eq!(universe.next_rdm_transaction_number(), 0);
    assert_eq!(universe.next_rdm_transaction_number(), 1);
    assert_eq!(universe.next_rdm_transaction_number(), 2);
}

#[test]
fn test_uid_set_helper_matches_discovery() {
    let harness = Harness::new();
    let (mut universe, ports) = universe_with_ports(&harness, 1);
    discover(&mut universe, &ports[0], &[RESPONDER_A, RESPONDER_B]);
    assert_eq!(universe.uids(), uid_set(&[RESPONDER_A, RESPONDER_B]));
}
