//! Tests for ordering, isolation and re-entrancy of the event router

#[cfg(test)]
mod tests {
    use crate::{Event, EventError, EventKind, EventRouter};
    use crossbeam::channel;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn recorder(router: &EventRouter, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        router.subscribe(kind, "recorder", move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_fifo_delivery() {
        let router = EventRouter::new();
        let seen = recorder(&router, EventKind::IncomingMessage);

        for i in 0..5 {
            router
                .publish(Event::IncomingMessage { id: 1, text: format!("line {i}") })
                .unwrap();
        }
        assert_eq!(router.dispatch_pending(), 5);

        let texts: Vec<String> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| match e {
                Event::IncomingMessage { text, .. } => text.clone(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let router = EventRouter::new();
        let broadcasts = recorder(&router, EventKind::Broadcast);

        router.publish(Event::outgoing(1, "direct")).unwrap();
        router.publish(Event::broadcast("everyone")).unwrap();
        router.dispatch_pending();

        assert_eq!(*broadcasts.lock().unwrap(), vec![Event::broadcast("everyone")]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let router = EventRouter::new();
        router.subscribe(EventKind::Broadcast, "always_fails", |_| {
            Err(EventError::HandlerExecution("boom".to_string()))
        });
        router.subscribe(EventKind::Broadcast, "panics", |_| panic!("handler blew up"));
        let seen = recorder(&router, EventKind::Broadcast);

        router.publish(Event::broadcast("first")).unwrap();
        router.publish(Event::broadcast("second")).unwrap();
        router.dispatch_pending();

        assert_eq!(seen.lock().unwrap().len(), 2);
        let stats = router.stats();
        assert_eq!(stats.handler_failures, 4);
        assert_eq!(stats.events_delivered, 2);
        assert_eq!(stats.total_handlers, 3);
    }

    #[test]
    fn test_handler_can_publish_without_deadlock() {
        let router = Arc::new(EventRouter::new());
        let (tx, rx) = channel::unbounded();

        let replier = router.clone();
        router.subscribe(EventKind::IncomingMessage, "echo", move |event| {
            if let Event::IncomingMessage { id, text } = event {
                replier.publish(Event::outgoing(*id, format!("you said: {text}")))?;
            }
            Ok(())
        });
        router.subscribe(EventKind::OutgoingMessage, "sink", move |event| {
            tx.send(event.clone()).map_err(|e| EventError::Other(e.to_string()))
        });

        router.start().unwrap();
        router
            .publish(Event::IncomingMessage { id: 9, text: "hello".into() })
            .unwrap();

        let reply = rx.recv_timeout(Duration::from_secs(2)).expect("reply not delivered");
        assert_eq!(reply, Event::outgoing(9, "you said: hello"));
        router.shutdown();
    }

    #[test]
    fn test_shutdown_drains_queue_then_rejects() {
        let router = Arc::new(EventRouter::new());
        let seen = recorder(&router, EventKind::Broadcast);

        for i in 0..100 {
            router.publish(Event::broadcast(format!("{i}"))).unwrap();
        }
        router.start().unwrap();
        router.shutdown();

        assert_eq!(seen.lock().unwrap().len(), 100);
        assert!(matches!(
            router.publish(Event::broadcast("late")),
            Err(EventError::RouterStopped)
        ));
        assert!(matches!(router.start(), Err(EventError::RouterStopped)));
    }

    #[test]
    fn test_start_twice_fails() {
        let router = Arc::new(EventRouter::new());
        router.start().unwrap();
        assert!(matches!(router.start(), Err(EventError::RuntimeError(_))));
        router.shutdown();
    }

    #[test]
    fn test_per_producer_order_is_preserved() {
        let router = Arc::new(EventRouter::new());
        let seen = recorder(&router, EventKind::IncomingMessage);
        router.start().unwrap();

        let producers: Vec<_> = (1..=4u64)
            .map(|id| {
                let router = router.clone();
                thread::spawn(move || {
                    for n in 0..250 {
                        router
                            .publish(Event::IncomingMessage { id, text: n.to_string() })
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        router.shutdown();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1000);
        for id in 1..=4u64 {
            let sequence: Vec<u32> = seen
                .iter()
                .filter_map(|e| match e {
                    Event::IncomingMessage { id: from, text } if *from == id => text.parse().ok(),
                    _ => None,
                })
                .collect();
            assert_eq!(sequence, (0..250).collect::<Vec<u32>>());
        }
    }

    #[test]
    fn test_subscribe_many_shares_one_handler() {
        let router = EventRouter::new();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        router.subscribe_many(
            &[EventKind::ConnectionOpened, EventKind::ConnectionClosed],
            "lifecycle",
            move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            },
        );

        assert_eq!(router.handler_count(EventKind::ConnectionOpened), 1);
        assert_eq!(router.handler_count(EventKind::ConnectionClosed), 1);
        assert_eq!(router.handler_count(EventKind::Gossip), 0);

        router
            .publish(Event::ConnectionOpened {
                id: 1,
                remote_addr: "127.0.0.1:5000".parse().unwrap(),
                timestamp: 0,
            })
            .unwrap();
        router
            .publish(Event::ConnectionClosed {
                id: 1,
                reason: crate::DisconnectReason::ClientDisconnect,
                timestamp: 0,
            })
            .unwrap();
        router.dispatch_pending();
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
