/// Example wiring two BR/EDR signaling channels back to back
use bluehost::l2cap::constants::*;
use bluehost::l2cap::*;
use bluehost::security::{SecurityLevel, SecurityUpgradeCallback};
use bluehost::time::{SystemTimeSource, TimeSource};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

const PSM_RFCOMM: u16 = 0x0003;

/// One direction of an in-memory link
#[derive(Default)]
struct Pipe {
    frames: RefCell<VecDeque<Vec<u8>>>,
}

impl Channel for Pipe {
    fn send(&self, sdu: Vec<u8>) -> bool {
        self.frames.borrow_mut().push_back(sdu);
        true
    }

    fn security(&self) -> SecurityLevel {
        SecurityLevel::NoSecurity
    }

    fn upgrade_security(&self, _level: SecurityLevel, callback: SecurityUpgradeCallback) {
        callback(Err(bluehost::HostError::NotSupported));
    }

    fn signal_link_error(&self) {
        println!("Link error signaled");
    }
}

fn weak(pipe: &Rc<Pipe>) -> Weak<dyn Channel> {
    let pipe: Rc<dyn Channel> = pipe.clone();
    Rc::downgrade(&pipe)
}

/// Deliver frames in both directions until the link is idle
fn pump(a_to_b: &Pipe, b_to_a: &Pipe, a: &SignalingChannel, b: &SignalingChannel) {
    loop {
        let to_b = a_to_b.frames.borrow_mut().pop_front();
        let to_a = b_to_a.frames.borrow_mut().pop_front();
        if to_b.is_none() && to_a.is_none() {
            break;
        }
        if let Some(frame) = to_b {
            println!("A -> B: {}", hex::encode(&frame));
            b.handle_sdu(&frame);
        }
        if let Some(frame) = to_a {
            println!("B -> A: {}", hex::encode(&frame));
            a.handle_sdu(&frame);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("L2CAP Signaling Loopback Example");
    println!("--------------------------------");

    let a_to_b = Rc::new(Pipe::default());
    let b_to_a = Rc::new(Pipe::default());
    let time: Rc<dyn TimeSource> = Rc::new(SystemTimeSource::new());

    let a = SignalingChannel::new(weak(&a_to_b), ConnectionType::Classic, time.clone());
    let b = SignalingChannel::new(weak(&b_to_a), ConnectionType::Classic, time);

    let a_commands = BrEdrCommandHandler::new(
        a.clone(),
        Some(Rc::new(|| println!("A: request failed"))),
    );
    let b_commands = BrEdrCommandHandler::new(b.clone(), None);

    // B answers feature queries and accepts RFCOMM channels
    b_commands.serve_information_request(|info_type, responder| {
        println!("B: information request for {:?}", info_type);
        match info_type {
            InformationType::ExtendedFeatures => responder.send_extended_features(0x0000_0080),
            InformationType::FixedChannels => responder.send_fixed_channels(0x0000_0000_0000_0002),
            _ => responder.send_not_supported(),
        };
    });

    let next_cid = RefCell::new(L2CAP_DYNAMIC_CID_MIN);
    b_commands.serve_connection_request(move |psm, remote_cid, responder| {
        if psm != PSM_RFCOMM {
            responder.send(L2CAP_INVALID_CID, L2CAP_RESULT_PSM_NOT_SUPPORTED, 0);
            return;
        }
        let mut next_cid = next_cid.borrow_mut();
        let local_cid = *next_cid;
        *next_cid += 1;
        println!("B: accepting PSM {:#06x} from {:#06x} as {:#06x}", psm, remote_cid, local_cid);
        responder.send(local_cid, L2CAP_RESULT_SUCCESS, 0);
    });

    a_commands.send_information_request(InformationType::ExtendedFeatures, |response| {
        match response.payload().and_then(|params| params.features()) {
            Some(features) => println!("A: peer features {:#010x}", features),
            None => println!("A: peer did not report features"),
        }
    });

    a_commands.send_connection_request(PSM_RFCOMM, L2CAP_DYNAMIC_CID_MIN, |response| {
        match response.payload() {
            Some(params) if params.result == L2CAP_RESULT_SUCCESS => {
                println!(
                    "A: channel {:#06x} connected to {:#06x}",
                    response.local_cid(),
                    response.remote_cid()
                );
            }
            Some(params) => println!("A: connection refused ({:#06x})", params.result),
            None => println!("A: connection rejected ({:?})", response.reject_reason()),
        }
    });

    a.test_link(b"ping", |echo| match echo {
        Some(data) => println!("A: echo {:?}", String::from_utf8_lossy(data)),
        None => println!("A: echo failed"),
    });

    pump(&a_to_b, &b_to_a, &a, &b);

    println!("Pending requests on A: {}", a.pending_command_count());
    a.on_channel_closed();
    b.on_channel_closed();

    Ok(())
}
