//! Tests for the L2CAP signaling implementation

#[cfg(test)]
mod tests {
    use super::super::bredr_command_handler::*;
    use super::super::constants::*;
    use super::super::le_command_handler::*;
    use super::super::signaling::*;
    use super::super::types::*;
    use crate::testing::{init_logging, manual_time, weak_channel, FakeChannel};
    use crate::time::{ManualTimeSource, TimeSource};
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    struct Fixture {
        channel: Rc<FakeChannel>,
        time: Rc<ManualTimeSource>,
        signaling: SignalingChannel,
    }

    fn fixture(connection_type: ConnectionType) -> Fixture {
        init_logging();
        let channel = FakeChannel::new();
        let time = manual_time();
        let signaling = SignalingChannel::new(weak_channel(&channel), connection_type, time.clone());
        Fixture {
            channel,
            time,
            signaling,
        }
    }

    type Calls = Rc<RefCell<Vec<(Status, Vec<u8>)>>>;

    fn recording_handler(calls: &Calls, action: ResponseHandlerAction) -> ResponseHandler {
        let calls = calls.clone();
        Box::new(move |status, payload| {
            calls.borrow_mut().push((status, payload.to_vec()));
            action
        })
    }

    #[test]
    fn test_command_id_wraps_past_zero() {
        let mut ids = CommandIdAllocator::new();
        assert_eq!(ids.next_command_id(), 0x01);
        for _ in 0..253 {
            ids.next_command_id();
        }
        assert_eq!(ids.next_command_id(), 0xFF);
        assert_eq!(ids.next_command_id(), 0x01);
    }

    #[test]
    fn test_command_id_exhaustion() {
        let mut ids = CommandIdAllocator::new();
        assert_eq!(ids.allocate(|_| true), None);
        // Only 0x80 is free
        assert_eq!(ids.allocate(|id| id != 0x80), Some(0x80));
    }

    proptest! {
        #[test]
        fn prop_allocated_id_is_free_and_valid(
            in_use in proptest::collection::hash_set(1u8..=255, 0..255),
            advance in 0usize..600,
        ) {
            let mut ids = CommandIdAllocator::new();
            for _ in 0..advance {
                ids.next_command_id();
            }
            let id = ids.allocate(|id| in_use.contains(&id));
            prop_assert!(id.is_some());
            let id = id.unwrap();
            prop_assert_ne!(id, INVALID_COMMAND_ID);
            prop_assert!(!in_use.contains(&id));
        }

        #[test]
        fn prop_back_to_back_requests_use_sequential_ids(count in 1usize..40) {
            let f = fixture(ConnectionType::LE);
            for _ in 0..count {
                let sent = f.signaling.send_request(
                    L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST,
                    &[0u8; 8],
                    Box::new(|_, _| ResponseHandlerAction::CompleteOutboundTransaction),
                );
                prop_assert!(sent);
            }
            let ids: Vec<u8> = f.channel.take_sent().iter().map(|frame| frame[1]).collect();
            let expected: Vec<u8> = (1..=count as u8).collect();
            prop_assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_send_request_wire_format() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();

        assert!(f.signaling.send_request(
            L2CAP_DISCONNECTION_REQUEST,
            &[0x40, 0x00, 0x41, 0x00],
            recording_handler(&calls, ResponseHandlerAction::CompleteOutboundTransaction),
        ));

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x06, 0x01, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]]
        );
        assert_eq!(f.signaling.pending_command_count(), 1);
    }

    #[test]
    fn test_response_completes_request() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_DISCONNECTION_REQUEST,
            &[0x40, 0x00, 0x41, 0x00],
            recording_handler(&calls, ResponseHandlerAction::CompleteOutboundTransaction),
        );
        f.channel.take_sent();

        f.signaling
            .handle_sdu(&[0x07, 0x01, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]);

        assert_eq!(
            *calls.borrow(),
            vec![(Status::Success, vec![0x40, 0x00, 0x41, 0x00])]
        );
        assert_eq!(f.signaling.pending_command_count(), 0);
        assert!(f.signaling.next_deadline().is_none());
        assert_eq!(f.channel.sent_count(), 0);
    }

    #[test]
    fn test_response_with_unknown_id_is_dropped() {
        let f = fixture(ConnectionType::Classic);
        f.signaling
            .handle_sdu(&[0x07, 0x09, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]);
        // Never reject an unmatched response
        assert_eq!(f.channel.sent_count(), 0);
    }

    #[test]
    fn test_mismatched_response_code_is_rejected() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_DISCONNECTION_REQUEST,
            &[0x40, 0x00, 0x41, 0x00],
            recording_handler(&calls, ResponseHandlerAction::CompleteOutboundTransaction),
        );
        f.channel.take_sent();

        // Connection Response with the identifier of the Disconnection Request
        f.signaling.handle_sdu(&[
            0x03, 0x01, 0x08, 0x00, 0x40, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x01, 0x02, 0x00, 0x00, 0x00]]
        );
        assert!(calls.borrow().is_empty());
        assert_eq!(f.signaling.pending_command_count(), 1);

        // The real response still completes the request
        f.signaling
            .handle_sdu(&[0x07, 0x01, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_command_reject_reports_reject_status() {
        let f = fixture(ConnectionType::LE);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST,
            &[0u8; 8],
            recording_handler(&calls, ResponseHandlerAction::CompleteOutboundTransaction),
        );

        f.signaling.handle_sdu(&[0x01, 0x01, 0x02, 0x00, 0x00, 0x00]);

        assert_eq!(*calls.borrow(), vec![(Status::Reject, vec![0x00, 0x00])]);
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_rtx_retransmits_with_doubling_then_times_out() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_INFORMATION_REQUEST,
            &[0x02, 0x00],
            recording_handler(&calls, ResponseHandlerAction::CompleteOutboundTransaction),
        );
        let first = f.channel.last_sent().unwrap();
        assert_eq!(
            f.signaling.next_deadline(),
            Some(f.time.now() + Duration::from_secs(1))
        );

        f.time.advance(Duration::from_millis(999));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 1);

        // First retransmission after RTX
        f.time.advance(Duration::from_millis(1));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 2);
        assert_eq!(f.channel.last_sent().unwrap(), first);
        assert_eq!(
            f.signaling.next_deadline(),
            Some(f.time.now() + Duration::from_secs(2))
        );

        // Second retransmission after 2 * RTX
        f.time.advance(Duration::from_secs(2));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 3);
        assert_eq!(f.channel.last_sent().unwrap(), first);

        // Out of transmissions after 4 * RTX
        f.time.advance(Duration::from_secs(4));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 3);
        assert_eq!(*calls.borrow(), vec![(Status::TimeOut, vec![])]);
        assert_eq!(f.signaling.pending_command_count(), 0);
        assert!(f.signaling.next_deadline().is_none());
    }

    #[test]
    fn test_additional_response_switches_to_ertx() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_CONNECTION_REQUEST,
            &[0x01, 0x00, 0x40, 0x00],
            recording_handler(&calls, ResponseHandlerAction::ExpectAdditionalResponse),
        );
        f.channel.take_sent();

        // Pending result
        f.signaling.handle_sdu(&[
            0x03, 0x01, 0x08, 0x00, 0x00, 0x00, 0x40, 0x00, 0x01, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(
            f.signaling.next_deadline(),
            Some(f.time.now() + L2CAP_ERTX_TIMEOUT)
        );

        // No retransmission under ERTX
        f.time.advance(Duration::from_secs(59));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 0);

        f.time.advance(Duration::from_secs(1));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 0);
        assert_eq!(calls.borrow().last().unwrap().0, Status::TimeOut);
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_ignored_response_keeps_rtx_running() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        f.signaling.send_request(
            L2CAP_INFORMATION_REQUEST,
            &[0x02, 0x00],
            recording_handler(&calls, ResponseHandlerAction::IgnoreResponse),
        );
        let deadline = f.signaling.next_deadline();

        f.time.advance(Duration::from_millis(500));
        f.signaling.handle_sdu(&[0x0B, 0x01, 0x00, 0x00]);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(f.signaling.next_deadline(), deadline);

        f.time.advance(Duration::from_millis(500));
        f.signaling.process_timeouts();
        assert_eq!(f.channel.sent_count(), 2);
    }

    #[test]
    fn test_oversized_command_rejected_with_mtu() {
        let f = fixture(ConnectionType::Classic);
        let mut frame = vec![0x0A, 0x05, 45, 0x00];
        frame.extend_from_slice(&[0u8; 45]);

        f.signaling.handle_sdu(&frame);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x05, 0x04, 0x00, 0x01, 0x00, 0x30, 0x00]]
        );
    }

    #[test]
    fn test_command_of_exactly_mtu_is_accepted() {
        let f = fixture(ConnectionType::Classic);
        let mut frame = vec![L2CAP_ECHO_REQUEST, 0x07, 44, 0x00];
        frame.extend_from_slice(&[0xAB; 44]);

        f.signaling.handle_sdu(&frame);

        let sent = f.channel.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..4], &[L2CAP_ECHO_RESPONSE, 0x07, 44, 0x00]);
        assert_eq!(&sent[0][4..], &[0xAB; 44][..]);
    }

    #[test]
    fn test_le_oversized_command_rejected_with_mtu() {
        let f = fixture(ConnectionType::LE);
        let mut frame = vec![L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST, 0x02, 20, 0x00];
        frame.extend_from_slice(&[0u8; 20]);

        f.signaling.handle_sdu(&frame);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x02, 0x04, 0x00, 0x01, 0x00, 23, 0x00]]
        );
    }

    #[test]
    fn test_invalid_id_is_not_understood() {
        let f = fixture(ConnectionType::Classic);
        f.signaling.handle_sdu(&[L2CAP_ECHO_REQUEST, 0x00, 0x00, 0x00]);
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x00, 0x02, 0x00, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_unhandled_request_is_not_understood() {
        let f = fixture(ConnectionType::Classic);
        f.signaling
            .handle_sdu(&[L2CAP_INFORMATION_REQUEST, 0x04, 0x02, 0x00, 0x02, 0x00]);
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x04, 0x02, 0x00, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_bredr_frame_with_several_commands() {
        let f = fixture(ConnectionType::Classic);
        let frame = [
            L2CAP_ECHO_REQUEST, 0x01, 0x01, 0x00, 0xAA, //
            L2CAP_ECHO_REQUEST, 0x02, 0x00, 0x00, //
            L2CAP_ECHO_REQUEST, 0x03, 0x04, 0x00, 0x01, // truncated
        ];

        f.signaling.handle_sdu(&frame);

        assert_eq!(
            f.channel.take_sent(),
            vec![
                vec![L2CAP_ECHO_RESPONSE, 0x01, 0x01, 0x00, 0xAA],
                vec![L2CAP_ECHO_RESPONSE, 0x02, 0x00, 0x00],
            ]
        );
    }

    #[test]
    fn test_le_frame_with_bad_length_is_dropped() {
        let f = fixture(ConnectionType::LE);
        let served = Rc::new(Cell::new(0));
        let counter = served.clone();
        f.signaling.serve_request(
            L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST,
            Box::new(move |_, _| counter.set(counter.get() + 1)),
        );

        // Header claims 10 bytes, 11 follow
        let mut frame = vec![L2CAP_LE_CREDIT_BASED_CONNECTION_REQUEST, 0x01, 10, 0x00];
        frame.extend_from_slice(&[0u8; 11]);
        f.signaling.handle_sdu(&frame);

        assert_eq!(served.get(), 0);
        assert_eq!(f.channel.sent_count(), 0);
    }

    #[test]
    fn test_le_has_no_echo() {
        let f = fixture(ConnectionType::LE);
        f.signaling.handle_sdu(&[L2CAP_ECHO_REQUEST, 0x01, 0x00, 0x00]);
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x01, 0x02, 0x00, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_serve_request_last_registration_wins() {
        let f = fixture(ConnectionType::Classic);
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let counter = first.clone();
        f.signaling.serve_request(
            L2CAP_INFORMATION_REQUEST,
            Box::new(move |_, _| counter.set(counter.get() + 1)),
        );
        let counter = second.clone();
        f.signaling.serve_request(
            L2CAP_INFORMATION_REQUEST,
            Box::new(move |_, responder| {
                counter.set(counter.get() + 1);
                responder.send(&[0x02, 0x00, 0x01, 0x00]);
            }),
        );

        f.signaling
            .handle_sdu(&[L2CAP_INFORMATION_REQUEST, 0x09, 0x02, 0x00, 0x02, 0x00]);

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x0B, 0x09, 0x04, 0x00, 0x02, 0x00, 0x01, 0x00]]
        );
    }

    #[test]
    #[should_panic]
    fn test_serving_a_response_code_panics() {
        let f = fixture(ConnectionType::Classic);
        f.signaling
            .serve_request(L2CAP_CONNECTION_RESPONSE, Box::new(|_, _| {}));
    }

    #[test]
    #[should_panic]
    fn test_request_over_mtu_panics() {
        let f = fixture(ConnectionType::LE);
        f.signaling.send_request(
            L2CAP_CONNECTION_PARAMETER_UPDATE_REQUEST,
            &[0u8; 20],
            Box::new(|_, _| ResponseHandlerAction::CompleteOutboundTransaction),
        );
    }

    #[test]
    fn test_channel_closed_fails_pending_in_order() {
        let f = fixture(ConnectionType::Classic);
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3u8 {
            let order = order.clone();
            f.signaling.send_request(
                L2CAP_ECHO_REQUEST,
                &[tag],
                Box::new(move |status, _| {
                    order.borrow_mut().push((tag, status));
                    ResponseHandlerAction::CompleteOutboundTransaction
                }),
            );
        }

        f.signaling.on_channel_closed();
        f.signaling.on_channel_closed();

        assert_eq!(
            *order.borrow(),
            vec![(0, Status::Closed), (1, Status::Closed), (2, Status::Closed)]
        );
        assert!(!f.signaling.is_open());
        assert!(!f.signaling.send_request(
            L2CAP_ECHO_REQUEST,
            &[],
            Box::new(|_, _| ResponseHandlerAction::CompleteOutboundTransaction),
        ));
    }

    #[test]
    fn test_refused_send_leaves_nothing_pending() {
        let f = fixture(ConnectionType::Classic);
        f.channel.set_accept_sends(false);
        assert!(!f.signaling.send_request(
            L2CAP_ECHO_REQUEST,
            &[],
            Box::new(|_, _| ResponseHandlerAction::CompleteOutboundTransaction),
        ));
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_dropped_channel_refuses_requests() {
        let f = fixture(ConnectionType::Classic);
        drop(f.channel);
        assert!(!f.signaling.send_request(
            L2CAP_ECHO_REQUEST,
            &[],
            Box::new(|_, _| ResponseHandlerAction::CompleteOutboundTransaction),
        ));
    }

    #[test]
    fn test_handler_closing_the_channel_gets_closed_status() {
        let f = fixture(ConnectionType::Classic);
        let calls: Calls = Rc::default();
        let signaling = f.signaling.clone();
        let recorded = calls.clone();
        f.signaling.send_request(
            L2CAP_ECHO_REQUEST,
            &[],
            Box::new(move |status, _| {
                recorded.borrow_mut().push((status, Vec::new()));
                signaling.on_channel_closed();
                ResponseHandlerAction::ExpectAdditionalResponse
            }),
        );

        f.signaling.handle_sdu(&[L2CAP_ECHO_RESPONSE, 0x01, 0x00, 0x00]);

        let statuses: Vec<Status> = calls.borrow().iter().map(|(status, _)| *status).collect();
        assert_eq!(statuses, vec![Status::Success, Status::Closed]);
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_test_link_reports_echo() {
        let f = fixture(ConnectionType::Classic);
        let echoed = Rc::new(RefCell::new(None));
        let result = echoed.clone();
        assert!(f.signaling.test_link(&[1, 2, 3], move |data| {
            *result.borrow_mut() = Some(data.map(|data| data.to_vec()));
        }));
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![L2CAP_ECHO_REQUEST, 0x01, 0x03, 0x00, 1, 2, 3]]
        );

        f.signaling
            .handle_sdu(&[L2CAP_ECHO_RESPONSE, 0x01, 0x03, 0x00, 1, 2, 3]);
        assert_eq!(*echoed.borrow(), Some(Some(vec![1, 2, 3])));
    }

    #[test]
    fn test_test_link_timeout_reports_none() {
        let f = fixture(ConnectionType::Classic);
        let echoed = Rc::new(RefCell::new(None));
        let result = echoed.clone();
        f.signaling.test_link(&[], move |data| {
            *result.borrow_mut() = Some(data.map(|data| data.to_vec()));
        });

        for _ in 0..3 {
            f.time.advance(Duration::from_secs(4));
            f.signaling.process_timeouts();
        }
        assert_eq!(*echoed.borrow(), Some(None));
    }

    #[test]
    fn test_connection_rejected_with_invalid_cid() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let response = Rc::new(RefCell::new(None));
        let result = response.clone();

        assert!(handler.send_connection_request(0x0001, 0x0040, move |rsp| {
            *result.borrow_mut() = Some(rsp.clone());
        }));
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x02, 0x01, 0x04, 0x00, 0x01, 0x00, 0x40, 0x00]]
        );

        f.signaling.handle_sdu(&[
            0x01, 0x01, 0x06, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x00,
        ]);

        let response = response.borrow();
        let response = response.as_ref().unwrap();
        assert_eq!(response.status(), Status::Reject);
        assert_eq!(response.reject_reason(), Some(RejectReason::InvalidCid));
        assert_eq!(response.local_cid(), 0x0005);
        assert_eq!(response.remote_cid(), 0x0000);
        assert!(response.payload().is_none());
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_malformed_reject_is_dropped() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        handler.send_connection_request(0x0001, 0x0040, move |_| flag.set(true));

        // Invalid CID reject without the channel identifiers
        f.signaling
            .handle_sdu(&[0x01, 0x01, 0x02, 0x00, 0x02, 0x00]);
        // Reject with a one byte reason
        f.signaling.handle_sdu(&[0x01, 0x01, 0x01, 0x00, 0x00]);

        assert!(!called.get());
        assert_eq!(f.signaling.pending_command_count(), 1);
    }

    #[test]
    fn test_short_response_is_dropped_until_timeout() {
        let f = fixture(ConnectionType::Classic);
        let failures = Rc::new(Cell::new(0));
        let counter = failures.clone();
        let handler = BrEdrCommandHandler::new(
            f.signaling.clone(),
            Some(Rc::new(move || counter.set(counter.get() + 1))),
        );
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        handler.send_connection_request(0x0001, 0x0040, move |_| flag.set(true));

        f.signaling
            .handle_sdu(&[0x03, 0x01, 0x04, 0x00, 0x41, 0x00, 0x40, 0x00]);
        assert!(!called.get());

        for _ in 0..3 {
            f.time.advance(Duration::from_secs(4));
            f.signaling.process_timeouts();
        }
        assert!(!called.get());
        assert_eq!(failures.get(), 1);
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_pending_connection_waits_for_final_response() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let results = Rc::new(RefCell::new(Vec::new()));
        let recorded = results.clone();
        handler.send_connection_request(0x0001, 0x0040, move |rsp| {
            let params = rsp.payload().unwrap();
            recorded
                .borrow_mut()
                .push((rsp.local_cid(), rsp.remote_cid(), params.result));
        });

        f.signaling.handle_sdu(&[
            0x03, 0x01, 0x08, 0x00, 0x00, 0x00, 0x40, 0x00, 0x01, 0x00, 0x01, 0x00,
        ]);
        assert_eq!(f.signaling.pending_command_count(), 1);

        f.signaling.handle_sdu(&[
            0x03, 0x01, 0x08, 0x00, 0x41, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(
            *results.borrow(),
            vec![
                (0x0040, 0x0000, L2CAP_RESULT_PENDING),
                (0x0040, 0x0041, L2CAP_RESULT_SUCCESS)
            ]
        );
        assert_eq!(f.signaling.pending_command_count(), 0);
    }

    #[test]
    fn test_disconnection_round_trip() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let response = Rc::new(RefCell::new(None));
        let result = response.clone();

        handler.send_disconnection_request(0x0041, 0x0040, move |rsp| {
            *result.borrow_mut() = Some((rsp.local_cid(), rsp.remote_cid()));
        });
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x06, 0x01, 0x04, 0x00, 0x41, 0x00, 0x40, 0x00]]
        );

        f.signaling
            .handle_sdu(&[0x07, 0x01, 0x04, 0x00, 0x41, 0x00, 0x40, 0x00]);
        assert_eq!(*response.borrow(), Some((0x0040, 0x0041)));
    }

    #[test]
    fn test_serve_disconnection_request() {
        let f = fixture(ConnectionType::LE);
        let handler = LeCommandHandler::new(f.signaling.clone(), None);
        let seen = Rc::new(RefCell::new(None));
        let recorded = seen.clone();
        handler.serve_disconnection_request(move |local_cid, remote_cid, responder| {
            *recorded.borrow_mut() = Some((local_cid, remote_cid));
            responder.send();
        });

        f.signaling
            .handle_sdu(&[0x06, 0x03, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]);

        assert_eq!(*seen.borrow(), Some((0x0040, 0x0041)));
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x07, 0x03, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]]
        );
    }

    #[test]
    fn test_disconnection_for_unknown_channel_rejected() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        handler.serve_disconnection_request(|_, _, responder| {
            responder.reject_invalid_channel_id();
        });

        f.signaling
            .handle_sdu(&[0x06, 0x03, 0x04, 0x00, 0x40, 0x00, 0x41, 0x00]);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x03, 0x06, 0x00, 0x02, 0x00, 0x40, 0x00, 0x41, 0x00]]
        );
    }

    #[test]
    fn test_malformed_request_is_not_understood() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        handler.serve_disconnection_request(move |_, _, _| flag.set(true));

        f.signaling.handle_sdu(&[0x06, 0x03, 0x02, 0x00, 0x40, 0x00]);

        assert!(!called.get());
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x01, 0x03, 0x02, 0x00, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_configuration_request_encoding() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let options = ConfigOptions {
            mtu: Some(672),
            retransmission: Some(RetransmissionFlowControl {
                mode: RetransmissionMode::EnhancedRetransmission,
                tx_window_size: 10,
                max_transmit: 3,
                retransmission_timeout: 2000,
                monitor_timeout: 12000,
                max_pdu_size: 1010,
            }),
            ..Default::default()
        };

        handler.send_configuration_request(0x0041, 0x0000, &options, |_| {});

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![
                0x04, 0x01, 0x13, 0x00, // header
                0x41, 0x00, 0x00, 0x00, // dcid, flags
                0x01, 0x02, 0xA0, 0x02, // MTU 672
                0x04, 0x09, 0x03, 0x0A, 0x03, 0xD0, 0x07, 0xE0, 0x2E, 0xF2, 0x03, // ERTM
            ]]
        );
    }

    #[test]
    fn test_configuration_continuation() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        let responses = Rc::new(RefCell::new(Vec::new()));
        let recorded = responses.clone();
        handler.send_configuration_request(0x0041, 0x0000, &ConfigOptions::default(), move |rsp| {
            recorded.borrow_mut().push(rsp.payload().unwrap().clone());
        });

        // Continued response carrying the MTU option
        f.signaling.handle_sdu(&[
            0x05, 0x01, 0x0A, 0x00, 0x40, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x01,
        ]);
        assert_eq!(f.signaling.pending_command_count(), 1);

        f.signaling
            .handle_sdu(&[0x05, 0x01, 0x06, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(f.signaling.pending_command_count(), 0);

        let responses = responses.borrow();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].options.mtu, Some(256));
        assert_eq!(responses[1].flags, 0);
    }

    #[test]
    fn test_serve_configuration_request() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        handler.serve_configuration_request(|local_cid, flags, options, responder| {
            assert_eq!(local_cid, 0x0040);
            assert_eq!(flags, 0);
            assert_eq!(options.mtu, Some(0x0100));
            assert_eq!(options.unknown, vec![(0x80 | 0x7F, vec![0xEE])]);
            responder.send(0x0041, 0, L2CAP_CONF_SUCCESS, &ConfigOptions::default());
        });

        f.signaling.handle_sdu(&[
            0x04, 0x02, 0x0B, 0x00, 0x40, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x01, 0xFF, 0x01,
            0xEE,
        ]);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![0x05, 0x02, 0x06, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00]]
        );
    }

    #[test]
    fn test_information_exchange() {
        let f = fixture(ConnectionType::Classic);
        let handler = BrEdrCommandHandler::new(f.signaling.clone(), None);
        handler.serve_information_request(|info_type, responder| match info_type {
            InformationType::ExtendedFeatures => {
                responder.send_extended_features(0x0000_00B8);
            }
            _ => {
                responder.send_not_supported();
            }
        });

        f.signaling
            .handle_sdu(&[0x0A, 0x05, 0x02, 0x00, 0x02, 0x00, 0x0A, 0x06, 0x02, 0x00, 0x09, 0x00]);
        assert_eq!(
            f.channel.take_sent(),
            vec![
                vec![0x0B, 0x05, 0x08, 0x00, 0x02, 0x00, 0x00, 0x00, 0xB8, 0x00, 0x00, 0x00],
                vec![0x0B, 0x06, 0x04, 0x00, 0x09, 0x00, 0x01, 0x00],
            ]
        );

        let channels = Rc::new(Cell::new(None));
        let result = channels.clone();
        handler.send_information_request(InformationType::FixedChannels, move |rsp| {
            result.set(rsp.payload().and_then(|params| params.channels()));
        });
        f.signaling.handle_sdu(&[
            0x0B, 0x01, 0x0C, 0x00, 0x03, 0x00, 0x00, 0x00, 0x86, 0, 0, 0, 0, 0, 0, 0,
        ]);
        assert_eq!(channels.get(), Some(0x86));
    }

    #[test]
    fn test_connection_parameter_validation() {
        let valid = ConnectionParameterUpdate {
            conn_interval_min: 0x0006,
            conn_interval_max: 0x0010,
            conn_latency: 0,
            supervision_timeout: 0x0064,
        };
        assert!(valid.validate());

        let inverted = ConnectionParameterUpdate {
            conn_interval_min: 0x0020,
            conn_interval_max: 0x0010,
            ..valid
        };
        assert!(!inverted.validate());

        let too_short_timeout = ConnectionParameterUpdate {
            conn_interval_max: 0x0C80,
            conn_latency: 4,
            supervision_timeout: 0x0064,
            ..valid
        };
        assert!(!too_short_timeout.validate());
    }

    #[test]
    fn test_connection_parameter_update_served() {
        let f = fixture(ConnectionType::LE);
        let handler = LeCommandHandler::new(f.signaling.clone(), None);
        let served = Rc::new(Cell::new(0));
        let counter = served.clone();
        handler.serve_connection_parameter_update_request(move |params, responder| {
            counter.set(counter.get() + 1);
            assert_eq!(params.conn_interval_max, 0x0010);
            responder.send(L2CAP_CONN_PARAM_ACCEPTED);
        });

        // Valid parameters
        f.signaling.handle_sdu(&[
            0x12, 0x01, 0x08, 0x00, 0x06, 0x00, 0x10, 0x00, 0x00, 0x00, 0x64, 0x00,
        ]);
        // Interval minimum out of range
        f.signaling.handle_sdu(&[
            0x12, 0x02, 0x08, 0x00, 0x01, 0x00, 0x10, 0x00, 0x00, 0x00, 0x64, 0x00,
        ]);

        assert_eq!(served.get(), 1);
        assert_eq!(
            f.channel.take_sent(),
            vec![
                vec![0x13, 0x01, 0x02, 0x00, 0x00, 0x00],
                vec![0x13, 0x02, 0x02, 0x00, 0x01, 0x00],
            ]
        );
    }

    #[test]
    fn test_connection_parameter_update_request() {
        let f = fixture(ConnectionType::LE);
        let handler = LeCommandHandler::new(f.signaling.clone(), None);
        let accepted = Rc::new(Cell::new(None));
        let result = accepted.clone();
        let params = ConnectionParameterUpdate {
            conn_interval_min: 0x0006,
            conn_interval_max: 0x0010,
            conn_latency: 0,
            supervision_timeout: 0x0064,
        };

        handler.send_connection_parameter_update_request(&params, move |rsp| {
            result.set(rsp.payload().map(|params| params.accepted()));
        });
        assert_eq!(
            f.channel.take_sent(),
            vec![vec![
                0x12, 0x01, 0x08, 0x00, 0x06, 0x00, 0x10, 0x00, 0x00, 0x00, 0x64, 0x00
            ]]
        );

        f.signaling.handle_sdu(&[0x13, 0x01, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(accepted.get(), Some(true));
    }

    #[test]
    fn test_le_credit_based_connection() {
        let f = fixture(ConnectionType::LE);
        let handler = LeCommandHandler::new(f.signaling.clone(), None);
        handler.serve_le_credit_based_connection_request(|request, responder| {
            assert_eq!(request.le_psm, 0x0080);
            assert_eq!(responder.remote_cid(), 0x0041);
            responder.send(0x0040, 512, 247, 10, L2CAP_LE_RESULT_SUCCESS);
        });

        f.signaling.handle_sdu(&[
            0x14, 0x04, 0x0A, 0x00, 0x80, 0x00, 0x41, 0x00, 0x00, 0x02, 0xF7, 0x00, 0x0A, 0x00,
        ]);

        assert_eq!(
            f.channel.take_sent(),
            vec![vec![
                0x15, 0x04, 0x0A, 0x00, 0x40, 0x00, 0x00, 0x02, 0xF7, 0x00, 0x0A, 0x00, 0x00, 0x00
            ]]
        );
    }

    #[test]
    fn test_request_fail_callback_on_close() {
        let f = fixture(ConnectionType::LE);
        let failures = Rc::new(Cell::new(0));
        let counter = failures.clone();
        let handler = LeCommandHandler::new(
            f.signaling.clone(),
            Some(Rc::new(move || counter.set(counter.get() + 1))),
        );
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        handler.send_disconnection_request(0x0041, 0x0040, move |_| flag.set(true));

        f.signaling.on_channel_closed();

        assert_eq!(failures.get(), 1);
        assert!(!called.get());
    }

    #[test]
    fn test_config_option_decoding_errors() {
        // MTU option with a three byte value
        assert!(ConfigOptions::decode(&[0x01, 0x03, 0x00, 0x01, 0x00]).is_err());
        // Option running past the payload
        assert!(ConfigOptions::decode(&[0x02, 0x02, 0x00]).is_err());
        // Lone option type byte
        assert!(ConfigOptions::decode(&[0x01]).is_err());
        assert!(ConfigOptions::decode(&[]).unwrap().is_empty());
    }
}
