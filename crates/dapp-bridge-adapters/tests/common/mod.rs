#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tiny_http::{Header, Response, Server, StatusCode};
use tokio::sync::mpsc;

use dapp_bridge_core::event::EventReceiver;
use dapp_bridge_core::{BridgeEvent, ConnectionAction, RelayLink};

pub type Calls = Arc<Mutex<Vec<Value>>>;

/// Serves JSON-RPC posts until the test process ends; `handler` maps a request body to
/// a status code and a raw response body.
pub fn spawn_json_server<F>(handler: F) -> (String, Calls)
where
    F: Fn(&Value) -> (u16, String) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);

    thread::spawn(move || {
        for mut req in server.incoming_requests() {
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            if let Ok(mut g) = seen.lock() {
                g.push(body.clone());
            }
            let (code, payload) = handler(&body);
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).expect("header");
            let response = Response::from_string(payload)
                .with_status_code(StatusCode(code))
                .with_header(header);
            let _ = req.respond(response);
        }
    });

    (addr, calls)
}

pub fn link(epoch: u64) -> (RelayLink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelayLink::new(epoch, tx), rx)
}

pub async fn next_event(events: &mut EventReceiver) -> BridgeEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event within timeout")
        .expect("link still open")
}

pub async fn next_node_message(events: &mut EventReceiver) -> Value {
    loop {
        match next_event(events).await {
            BridgeEvent::Node(message) => return message,
            BridgeEvent::Connection { .. } => continue,
            other => panic!("unexpected event {other:?}"),
        }
    }
}

pub async fn next_connection(events: &mut EventReceiver) -> (u64, ConnectionAction) {
    loop {
        match next_event(events).await {
            BridgeEvent::Connection { epoch, action } => return (epoch, action),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
