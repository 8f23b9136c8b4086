use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use textbridge_bridge::{BridgeConfig, BridgeContext, BridgeError, Routing};
use textbridge_envelope::{Binary, ElementType, EnvelopeError, Port, Value};
use textbridge_transport::{memory_pair, TextTransport};

const WAIT: Duration = Duration::from_secs(2);

fn connected() -> (BridgeContext, BridgeContext) {
    let (left, right) = memory_pair();
    (BridgeContext::new(left), BridgeContext::new(right))
}

#[test]
fn nested_binary_roundtrip() {
    let (a, b) = connected();
    let port_a = a.establish("").expect("establish a").port();
    let port_b = b.establish("").expect("establish b").port();

    let message = Value::object([(
        "a",
        Value::object([("b", Binary::raw(b"Hello".to_vec()))]),
    )]);
    port_a.send(message.clone()).expect("send should succeed");

    let received = port_b.recv_timeout(WAIT).expect("should receive");
    assert_eq!(received, message);
    let binary = received
        .get("a")
        .and_then(|a| a.get("b"))
        .and_then(Value::as_binary)
        .expect("binary should be restored");
    assert_eq!(binary.bytes().as_ref(), b"Hello");
}

#[test]
fn plain_json_arrives_unchanged() {
    let (a, b) = connected();
    let port_a = a.establish("plain").unwrap().port();
    let port_b = b.establish("plain").unwrap().port();

    let message = Value::from_json(json!({"n": 1, "list": [true, null, "s"], "nested": {"x": 2.5}}));
    port_a.send(message.clone()).unwrap();
    assert_eq!(port_b.recv_timeout(WAIT).unwrap(), message);
}

#[test]
fn typed_views_keep_their_element_type() {
    let (a, b) = connected();
    let port_a = a.establish("views").unwrap().port();
    let port_b = b.establish("views").unwrap().port();

    port_a
        .send(Value::array([
            Value::from(Binary::from_f32s(&[1.5, -2.0])),
            Value::from(Binary::from_u16s(&[7, 65535])),
        ]))
        .unwrap();

    let received = port_b.recv_timeout(WAIT).unwrap();
    let items = received.as_array().expect("array payload");
    let floats = items[0].as_binary().unwrap();
    assert_eq!(floats.element_type(), ElementType::Float32);
    assert_eq!(floats.to_f32s().unwrap(), vec![1.5, -2.0]);
    assert_eq!(items[1].as_binary().unwrap().to_u16s().unwrap(), vec![7, 65535]);
}

#[test]
fn shared_composite_is_transferred_once() {
    let (a, b) = connected();
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    let shared = Value::object([("buf", Binary::raw(vec![0xaa, 0xbb]))]);
    port_a
        .send(Value::object([("a", shared.clone()), ("b", shared)]))
        .unwrap();

    let received = port_b.recv_timeout(WAIT).unwrap();
    assert!(received.get("a").and_then(|a| a.get("buf")).is_some_and(Value::is_transferable));
    assert!(received.get("b").and_then(|b| b.get("buf")).is_some_and(Value::is_null));
}

#[test]
fn transferred_port_is_duplex() {
    let (a, b) = connected();
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    let (give, keep) = Port::pair();
    port_a
        .send(Value::object([("port", Value::from(give))]))
        .unwrap();

    let received = port_b.recv_timeout(WAIT).unwrap();
    let remote = received
        .get("port")
        .and_then(Value::as_port)
        .cloned()
        .expect("port should be restored");

    remote.send("ping").unwrap();
    assert_eq!(keep.recv_timeout(WAIT).unwrap(), Value::from("ping"));

    keep.send("pong").unwrap();
    assert_eq!(remote.recv_timeout(WAIT).unwrap(), Value::from("pong"));

    assert_eq!(a.stats().channels, 2);
    assert_eq!(b.stats().channels, 2);
}

#[test]
fn transferred_port_carries_binaries_and_ports() {
    let (a, b) = connected();
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    let (give, keep) = Port::pair();
    port_a.send(give).unwrap();
    let remote = port_b.recv_timeout(WAIT).unwrap();
    let remote = remote.as_port().cloned().expect("root payload is a port");

    let (inner_give, inner_keep) = Port::pair();
    keep.send(Value::object([
        ("blob", Value::from(Binary::raw(vec![1, 2, 3]))),
        ("reply", Value::from(inner_give)),
    ]))
    .unwrap();

    let message = remote.recv_timeout(WAIT).unwrap();
    assert_eq!(
        message.get("blob").and_then(Value::as_binary).map(|b| b.bytes().to_vec()),
        Some(vec![1, 2, 3])
    );
    let reply = message.get("reply").and_then(Value::as_port).cloned().unwrap();
    reply.send("done").unwrap();
    assert_eq!(inner_keep.recv_timeout(WAIT).unwrap(), Value::from("done"));
}

#[test]
fn repeated_port_is_transferred_once() {
    let (a, b) = connected();
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    let (give, _keep) = Port::pair();
    port_a
        .send(Value::array([Value::from(give.clone()), Value::from(give)]))
        .unwrap();

    let received = port_b.recv_timeout(WAIT).unwrap();
    let items = received.as_array().unwrap();
    assert!(items[0].as_port().is_some());
    assert!(items[1].is_null());
}

#[test]
fn channels_are_multiplexed() {
    let (a, b) = connected();
    let ax = a.establish("x").unwrap().port();
    let ay = a.establish("y").unwrap().port();
    let bx = b.establish("x").unwrap().port();
    let by = b.establish("y").unwrap().port();

    ax.send("to x").unwrap();
    ay.send("to y").unwrap();
    by.send("from y").unwrap();

    assert_eq!(bx.recv_timeout(WAIT).unwrap(), Value::from("to x"));
    assert_eq!(by.recv_timeout(WAIT).unwrap(), Value::from("to y"));
    assert_eq!(ay.recv_timeout(WAIT).unwrap(), Value::from("from y"));
    assert!(bx.try_recv().is_none());
    assert!(ax.try_recv().is_none());
}

#[test]
fn handler_echo_roundtrip() {
    let (a, b) = connected();
    let port_a = a.establish("echo").unwrap().port();
    let port_b = b.establish("echo").unwrap().port();

    let responder = port_b.clone();
    port_b.set_handler(move |value| {
        let _ = responder.send(value);
    });

    port_a.send(Value::from_json(json!({"hello": "world"}))).unwrap();
    assert_eq!(
        port_a.recv_timeout(WAIT).unwrap(),
        Value::from_json(json!({"hello": "world"}))
    );
}

#[test]
fn envelope_for_unestablished_channel_is_dropped() {
    let (a, b) = connected();
    let port_a = a.establish("only-here").unwrap().port();
    port_a.send("lost").unwrap();

    let stats = b.stats();
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(a.stats().sent, 1);
}

#[test]
fn inbound_faults_do_not_stop_the_context() {
    let (left, right) = memory_pair();
    let raw: Arc<dyn TextTransport> = Arc::new(right);
    let a = BridgeContext::new(left);
    let b = BridgeContext::from_shared(Arc::clone(&raw), BridgeConfig::default());
    let port_a = a.establish("").unwrap().port();

    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&faults);
    a.set_fault_handler(move |err| sink.lock().unwrap().push(err.to_string()));

    raw.send("{ not json").unwrap();
    raw.send(r#"{"channelId":"","payload":{"x":null},"transferList":[{"kind":"mystery","path":["x"],"value":""}]}"#)
        .unwrap();

    let port_b = b.establish("").unwrap().port();
    port_b.send("after faults").unwrap();

    assert_eq!(port_a.recv_timeout(WAIT).unwrap(), Value::from("after faults"));
    assert_eq!(faults.lock().unwrap().len(), 2);
    assert_eq!(a.stats().faults, 2);
}

#[test]
fn malformed_descriptor_is_reported_to_caller() {
    let (left, _right) = memory_pair();
    let context = BridgeContext::new(left);
    let _bridge = context.establish("").unwrap();

    let err = context
        .handle_text(r#"{"channelId":"","payload":{"v":null},"transferList":[{"kind":"binary","subtype":"float64","path":["v"],"value":"0102"}]}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Envelope(EnvelopeError::MisalignedView { .. })
    ));

    let err = context
        .handle_text(r#"{"channelId":"","payload":{"v":null},"transferList":[{"kind":"binary","path":["v"],"value":"zz"}]}"#)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Envelope(EnvelopeError::InvalidHex(_))));
}

#[test]
fn root_level_transferable_is_replaced() {
    let (a, _b) = connected();
    let _bridge = a.establish("").unwrap();
    let port = a.bridge("").unwrap().port();

    let routing = a
        .handle_text(r#"{"channelId":"","payload":null,"transferList":[{"kind":"binary","subtype":"raw","path":[],"value":"cafe"}]}"#)
        .unwrap();
    assert_eq!(routing, Routing::Delivered);
    assert_eq!(
        port.recv_timeout(WAIT).unwrap(),
        Value::from(Binary::raw(vec![0xca, 0xfe]))
    );
}

#[test]
fn closing_transport_closes_ports_on_both_sides() {
    let (left, right) = memory_pair();
    let raw: Arc<dyn TextTransport> = Arc::new(left);
    let a = BridgeContext::from_shared(Arc::clone(&raw), BridgeConfig::default());
    let b = BridgeContext::new(right);
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    raw.close();

    assert!(port_a.is_closed());
    assert!(port_b.is_closed());
    assert!(matches!(port_b.recv_timeout(WAIT), Err(EnvelopeError::PortClosed)));
}

#[test]
fn closing_transport_closes_nested_ports() {
    let (left, right) = memory_pair();
    let raw: Arc<dyn TextTransport> = Arc::new(left);
    let a = BridgeContext::from_shared(Arc::clone(&raw), BridgeConfig::default());
    let b = BridgeContext::new(right);
    let port_a = a.establish("").unwrap().port();
    let port_b = b.establish("").unwrap().port();

    let (give, keep) = Port::pair();
    port_a.send(Value::object([("reply", Value::from(give))])).unwrap();
    let received = port_b.recv_timeout(WAIT).unwrap();
    let remote = received.get("reply").and_then(Value::as_port).cloned().unwrap();
    assert!(!keep.is_closed());
    assert!(!remote.is_closed());

    raw.close();

    assert!(keep.is_closed());
    assert!(remote.is_closed());
    assert!(port_a.is_closed());
    assert!(port_b.is_closed());
}

#[test]
fn evicted_channel_closes_kept_end() {
    let (left, right) = memory_pair();
    let a = BridgeContext::with_config(
        left,
        BridgeConfig {
            max_channels: 1,
            ..BridgeConfig::default()
        },
    );
    let b = BridgeContext::new(right);
    let port_a = a.establish("").unwrap().port();
    let _port_b = b.establish("").unwrap().port();

    let (first, first_kept) = Port::pair();
    let (second, second_kept) = Port::pair();
    port_a.send(first).unwrap();
    port_a.send(second).unwrap();

    assert!(first_kept.is_closed());
    assert!(!second_kept.is_closed());
}

#[test]
fn post_reports_oversize_envelope() {
    let (left, _right) = memory_pair();
    let context = BridgeContext::with_config(
        left,
        BridgeConfig {
            max_envelope_len: 64,
            ..BridgeConfig::default()
        },
    );
    let bridge = context.establish("").unwrap();

    let err = bridge.post("x".repeat(128)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Envelope(EnvelopeError::EnvelopeTooLarge { max: 64, .. })
    ));
    assert!(bridge.post("small").is_ok());
}
