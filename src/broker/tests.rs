use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::Broker;
use super::message::Message;
use super::topic::Topic;
use crate::transport::connection::Connection;
use crate::utils::Error;

fn frames(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(Message::decode(&frame));
    }
    out
}

// --- codec ---

#[test]
fn test_encode_commands() {
    assert_eq!(&Message::connect("client1").encode()[..], b"CONNECT client1\n");
    assert_eq!(&Message::Disconnect.encode()[..], b"DISCONNECT\n");
    assert_eq!(&Message::subscribe("t").encode()[..], b"SUBSCRIBE t\n");
    assert_eq!(&Message::unsubscribe("t").encode()[..], b"UNSUBSCRIBE t\n");
    assert_eq!(
        &Message::publish("my_topic", "Hello, World!").encode()[..],
        b"PUBLISH my_topic Hello, World!\n"
    );
    assert_eq!(&Message::Unknown.encode()[..], b"UNKNOWN\n");
}

#[test]
fn test_decode_subscribe() {
    assert_eq!(
        Message::decode_line("SUBSCRIBE my_topic"),
        Message::subscribe("my_topic")
    );
}

#[test]
fn test_decode_unknown_inputs() {
    for input in ["", "   ", "PUBLISH", "NOPE a b", "INVALID_COMMAND", "SUBSCRIBE", "CONNECT"] {
        assert_eq!(Message::decode_line(input), Message::Unknown, "input {input:?}");
    }
}

#[test]
fn test_decode_is_case_sensitive() {
    assert_eq!(Message::decode_line("subscribe t"), Message::Unknown);
}

#[test]
fn test_decode_publish_without_data() {
    assert_eq!(Message::decode_line("PUBLISH t"), Message::publish("t", ""));
}

#[test]
fn test_decode_publish_keeps_inner_whitespace() {
    assert_eq!(
        Message::decode_line("PUBLISH t   spaced  out  "),
        Message::publish("t", "  spaced  out  ")
    );
}

#[test]
fn test_decode_strips_delimiter_and_tolerates_bad_utf8() {
    assert_eq!(Message::decode(b"DISCONNECT\n"), Message::Disconnect);
    assert_eq!(Message::decode(&[0xff, 0xfe, b'\n']), Message::Unknown);
}

#[test]
fn test_round_trip() {
    let messages = [
        Message::connect("client1"),
        Message::Disconnect,
        Message::subscribe("sensors/temp"),
        Message::unsubscribe("sensors.temp-1"),
        Message::publish("topic", "data1"),
        Message::publish("topic", ""),
        Message::publish("topic", "hello world  with   spaces "),
        Message::publish("topic", " leading"),
    ];
    for m in messages {
        assert!(m.validate().is_ok(), "{m:?} should be sendable");
        assert_eq!(Message::decode(&m.encode()), m);
    }
}

#[test]
fn test_validate_rejects_messages_that_would_not_be_one_frame() {
    let rejected = [
        Message::publish("t", "hello\nSUBSCRIBE evil"),
        Message::publish("t", "trailing\n"),
        Message::publish("", "data"),
        Message::publish("a b", "data"),
        Message::subscribe("a b"),
        Message::subscribe(""),
        Message::unsubscribe("a\tb"),
        Message::unsubscribe("t\n"),
        Message::connect("two words"),
        Message::connect(""),
        Message::Unknown,
    ];
    for m in rejected {
        assert!(
            matches!(m.validate(), Err(Error::InvalidMessage { .. })),
            "{m:?} should be rejected"
        );
    }
}

#[test]
fn test_validate_error_names_command_and_reason() {
    let err = Message::subscribe("a b").validate().unwrap_err();
    assert_eq!(err.to_string(), "invalid SUBSCRIBE message: topic contains whitespace");
    let err = Message::publish("t", "x\ny").validate().unwrap_err();
    assert_eq!(err.to_string(), "invalid PUBLISH message: data contains a line break");
}

#[test]
fn test_unchecked_line_break_in_data_becomes_a_second_command() {
    // encode itself does not check its input
    let message = Message::publish("t", "hello\nSUBSCRIBE evil");
    let encoded = message.encode();
    let lines: Vec<Message> = encoded
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(Message::decode)
        .collect();
    assert_eq!(
        lines,
        vec![Message::publish("t", "hello"), Message::subscribe("evil")]
    );
    assert!(message.validate().is_err());
}

// --- topic ---

#[test]
fn test_topic_subscribe_is_idempotent() {
    let (conn, _rx) = Connection::channel("a");
    let mut topic = Topic::new("test_topic");
    assert!(topic.subscribe(conn.clone()));
    assert!(!topic.subscribe(conn.clone()));
    assert_eq!(topic.subscribers.len(), 1);
    assert!(topic.unsubscribe(&conn.id()));
    assert!(!topic.unsubscribe(&conn.id()));
    assert!(topic.is_empty());
}

// --- registry ---

#[test]
fn test_broker_subscribe_and_unsubscribe() {
    let broker = Broker::new();
    let (conn, _rx) = Connection::channel("a");

    broker.subscribe("test_topic", &conn);
    broker.subscribe("test_topic", &conn);
    assert_eq!(broker.subscriber_count("test_topic"), 1);
    assert!(broker.is_subscribed("test_topic", &conn.id()));

    broker.unsubscribe("test_topic", &conn.id());
    assert!(!broker.is_subscribed("test_topic", &conn.id()));
    // empty topics are pruned
    assert_eq!(broker.topic_count(), 0);
    // idempotent
    broker.unsubscribe("test_topic", &conn.id());
    broker.unsubscribe("never_created", &conn.id());
}

#[test]
fn test_fan_out_reaches_only_topic_subscribers() {
    let broker = Broker::new();
    let (a, mut rx_a) = Connection::channel("a");
    let (b, mut rx_b) = Connection::channel("b");
    let (c, mut rx_c) = Connection::channel("c");
    broker.subscribe("t", &a);
    broker.subscribe("t", &b);
    broker.subscribe("u", &c);

    assert_eq!(broker.publish("t", "x"), 2);

    assert_eq!(frames(&mut rx_a), vec![Message::publish("t", "x")]);
    assert_eq!(frames(&mut rx_b), vec![Message::publish("t", "x")]);
    assert!(frames(&mut rx_c).is_empty());
}

#[test]
fn test_publish_to_nonexistent_topic() {
    let broker = Broker::new();
    assert_eq!(broker.publish("nonexistent_topic", "hello"), 0);
}

#[test]
fn test_unsubscribe_all_removes_every_reference() {
    let broker = Broker::new();
    let (dead, mut rx_dead) = Connection::channel("dead");
    let (live, mut rx_live) = Connection::channel("live");
    broker.subscribe("t", &dead);
    broker.subscribe("u", &dead);
    broker.subscribe("u", &live);
    assert_eq!(broker.topics_of(&dead.id()), vec!["t", "u"]);

    broker.unsubscribe_all(&dead.id());

    assert!(!broker.references(&dead.id()));
    assert!(broker.topics_of(&dead.id()).is_empty());
    assert_eq!(broker.publish("t", "x"), 0);
    assert_eq!(broker.publish("u", "x"), 1);
    assert!(frames(&mut rx_dead).is_empty());
    assert_eq!(frames(&mut rx_live), vec![Message::publish("u", "x")]);
    assert_eq!(broker.topic_count(), 1);
}

#[test]
fn test_unsubscribe_all_for_unknown_connection() {
    let broker = Broker::new();
    let (conn, _rx) = Connection::channel("a");
    broker.unsubscribe_all(&conn.id());
    broker.unsubscribe_all(&conn.id());
    assert_eq!(broker.topic_count(), 0);
}

#[test]
fn test_publish_skips_closed_subscriber() {
    let broker = Broker::new();
    let (stale, _rx_stale) = Connection::channel("stale");
    let (live, mut rx_live) = Connection::channel("live");
    broker.subscribe("t", &stale);
    broker.subscribe("t", &live);

    // closed but not yet removed from the registry
    stale.close();

    assert_eq!(broker.publish("t", "hi"), 1);
    assert_eq!(frames(&mut rx_live), vec![Message::publish("t", "hi")]);
}

#[test]
fn test_publish_to_subscriber_with_dropped_receiver() {
    let broker = Broker::new();
    let (gone, rx_gone) = Connection::channel("gone");
    let (live, mut rx_live) = Connection::channel("live");
    broker.subscribe("t", &gone);
    broker.subscribe("t", &live);

    // the send loop is gone; the handle still looks open
    drop(rx_gone);

    assert_eq!(broker.publish("t", "hi"), 1);
    assert_eq!(frames(&mut rx_live).len(), 1);
}

#[test]
fn test_concurrent_subscribe_publish_and_cleanup() {
    let broker = Arc::new(Broker::new());
    let (observer, mut rx_observer) = Connection::channel("observer");
    broker.subscribe("t", &observer);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let broker = broker.clone();
            std::thread::spawn(move || {
                let (conn, _rx) = Connection::channel("worker");
                for _ in 0..100 {
                    broker.subscribe("t", &conn);
                    broker.subscribe("u", &conn);
                    broker.publish("t", "x");
                    broker.unsubscribe_all(&conn.id());
                }
                conn.id()
            })
        })
        .collect();

    for handle in handles {
        let id = handle.join().unwrap();
        assert!(!broker.references(&id));
    }

    assert_eq!(broker.subscriber_count("t"), 1);
    assert_eq!(broker.topic_count(), 1);
    assert_eq!(frames(&mut rx_observer).len(), 800);
}
