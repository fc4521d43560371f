/// Example exchanging ATT transactions between two bearers
use bluehost::att::*;
use bluehost::l2cap::Channel;
use bluehost::security::{SecurityLevel, SecurityUpgradeCallback};
use bluehost::time::{SystemTimeSource, TimeSource};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

const PROTECTED_HANDLE: u16 = 0x0003;

/// One direction of an in-memory link that pairs on demand
#[derive(Default)]
struct Pipe {
    frames: RefCell<VecDeque<Vec<u8>>>,
    security: Rc<Cell<SecurityLevel>>,
}

impl Channel for Pipe {
    fn send(&self, sdu: Vec<u8>) -> bool {
        self.frames.borrow_mut().push_back(sdu);
        true
    }

    fn security(&self) -> SecurityLevel {
        self.security.get()
    }

    fn upgrade_security(&self, level: SecurityLevel, callback: SecurityUpgradeCallback) {
        println!("Pairing to reach {}", level);
        self.security.set(level);
        callback(Ok(()));
    }

    fn signal_link_error(&self) {
        println!("Link error signaled");
    }
}

fn weak(pipe: &Rc<Pipe>) -> Weak<dyn Channel> {
    let pipe: Rc<dyn Channel> = pipe.clone();
    Rc::downgrade(&pipe)
}

fn pump(client_out: &Pipe, server_out: &Pipe, client: &Bearer, server: &Bearer) {
    loop {
        let to_server = client_out.frames.borrow_mut().pop_front();
        let to_client = server_out.frames.borrow_mut().pop_front();
        if to_server.is_none() && to_client.is_none() {
            break;
        }
        if let Some(pdu) = to_server {
            println!("client -> server: {}", hex::encode(&pdu));
            server.handle_pdu(&pdu);
        }
        if let Some(pdu) = to_client {
            println!("server -> client: {}", hex::encode(&pdu));
            client.handle_pdu(&pdu);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("ATT Bearer Loopback Example");
    println!("---------------------------");

    // Both directions share the link security level
    let security = Rc::new(Cell::new(SecurityLevel::NoSecurity));
    let client_out = Rc::new(Pipe {
        security: security.clone(),
        ..Default::default()
    });
    let server_out = Rc::new(Pipe {
        security: security.clone(),
        ..Default::default()
    });
    let time: Rc<dyn TimeSource> = Rc::new(SystemTimeSource::new());

    let client = Bearer::new(weak(&client_out), time.clone()).ok_or("channel closed")?;
    let server = Bearer::new(weak(&server_out), time).ok_or("channel closed")?;
    client.set_closed_callback(|| println!("client bearer closed"));

    // The server only reveals the protected attribute over an encrypted link
    {
        let responder = server.clone();
        let security = security.clone();
        server.register_handler(ATT_READ_REQ, move |id, pdu| {
            let handle = u16::from_le_bytes([pdu[1], pdu[2]]);
            if handle == PROTECTED_HANDLE && !security.get().is_encrypted() {
                responder.reply_with_error(id, handle, AttErrorCode::InsufficientAuthentication);
                return;
            }
            responder.reply(id, vec![ATT_READ_RSP, 0x42, 0x00]);
        });
    }
    {
        let responder = server.clone();
        server.register_handler(ATT_EXCHANGE_MTU_REQ, move |id, pdu| {
            let Ok(request) = ExchangeMtuRequest::parse(pdu) else {
                responder.reply_with_error(id, 0, AttErrorCode::InvalidPdu);
                return;
            };
            let response = ExchangeMtuResponse {
                server_mtu: responder.preferred_mtu(),
            };
            responder.reply(id, response.serialize());
            responder.set_mtu(negotiated_mtu(responder.preferred_mtu(), request.client_mtu));
        });
    }

    let mtu_request = ExchangeMtuRequest {
        client_mtu: client.preferred_mtu(),
    };
    {
        let bearer = client.clone();
        client.start_transaction(mtu_request.serialize(), move |result| match result
            .map_err(|err| err.to_string())
            .and_then(|pdu| ExchangeMtuResponse::parse(pdu).map_err(|code| format!("{:?}", code)))
        {
            Ok(response) => {
                let mtu = negotiated_mtu(bearer.preferred_mtu(), response.server_mtu);
                bearer.set_mtu(mtu);
                println!("MTU is now {}", mtu);
            }
            Err(err) => println!("MTU exchange failed: {}", err),
        });
    }

    client.start_transaction(
        vec![ATT_READ_REQ, PROTECTED_HANDLE as u8, 0x00],
        |result| match result {
            Ok(pdu) => println!("Read value {}", hex::encode(&pdu[1..])),
            Err(err) => println!("Read failed: {}", err),
        },
    );

    pump(&client_out, &server_out, &client, &server);

    println!("Link security: {}", security.get());
    client.shut_down();
    server.on_channel_closed();

    Ok(())
}
