//! Behavioural tests for the topic queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thinkbank_jobs::{
    Error, FaultPolicy, FnHandler, Message, MessageHandler, PublishOutcome, QueueConfig,
    QueueEvent, TopicQueue,
};

fn counting_handler(counter: Arc<AtomicUsize>) -> impl MessageHandler<u32> + 'static {
    FnHandler::new(move |_msg: Message<u32>| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_overflow_drops_excess_before_consumers() {
    let queue = TopicQueue::new(QueueConfig::default().with_capacity(4));

    let outcomes: Vec<PublishOutcome> = (0..10).map(|i| queue.publish("t", i)).collect();
    assert_eq!(outcomes.iter().filter(|o| o.is_enqueued()).count(), 4);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == PublishOutcome::Dropped)
            .count(),
        6
    );

    let delivered = Arc::new(AtomicUsize::new(0));
    queue
        .register_consumers("t", counting_handler(delivered.clone()), 2)
        .unwrap();
    queue.shutdown().await;

    assert_eq!(delivered.load(Ordering::SeqCst), 4);
    let stats = queue.stats("t").unwrap();
    assert_eq!(stats.enqueued, 4);
    assert_eq!(stats.dropped, 6);
    assert_eq!(stats.handled, 4);
}

#[tokio::test]
async fn test_every_message_handled_once_across_workers() {
    let queue = TopicQueue::new(QueueConfig::default());
    let delivered = Arc::new(AtomicUsize::new(0));
    queue
        .register_consumers("work", counting_handler(delivered.clone()), 4)
        .unwrap();

    for i in 0..200 {
        assert_eq!(queue.publish("work", i), PublishOutcome::Enqueued);
    }
    queue.shutdown().await;

    assert_eq!(delivered.load(Ordering::SeqCst), 200);
    assert_eq!(queue.stats("work").unwrap().handled, 200);
}

#[tokio::test]
async fn test_handler_error_is_counted_and_dropped() {
    let queue = TopicQueue::new(QueueConfig::default());
    let handler = FnHandler::new(|msg: Message<u32>| async move {
        if msg.payload % 2 == 0 {
            Err(Error::Upstream("even".into()))
        } else {
            Ok(())
        }
    });
    queue.register_consumers("t", handler, 1).unwrap();
    for i in 0..6 {
        let _ = queue.publish("t", i);
    }
    queue.shutdown().await;

    let stats = queue.stats("t").unwrap();
    assert_eq!(stats.handled, 3);
    assert_eq!(stats.failed, 3);
}

#[tokio::test]
async fn test_isolated_panic_goes_to_dead_letter() {
    let config =
        QueueConfig::default().with_fault_policy(FaultPolicy::Isolate { dead_letter: true });
    let queue = TopicQueue::new(config);
    let mut events = queue.events();

    let handler = FnHandler::new(|msg: Message<u32>| async move {
        if msg.payload == 3 {
            panic!("cannot handle 3");
        }
        Ok(())
    });
    queue.register_consumers("work", handler, 1).unwrap();
    for i in 1..=5 {
        let _ = queue.publish("work", i);
    }

    let q = queue.clone();
    wait_until(move || {
        let s = q.stats("work").unwrap();
        s.handled + s.failed == 5
    })
    .await;

    let stats = queue.stats("work").unwrap();
    assert_eq!(stats.handled, 4);
    assert_eq!(stats.failed, 1);
    assert_eq!(queue.stats("work.dead_letter").unwrap().enqueued, 1);

    let mut saw_dead_letter = false;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::DeadLettered {
            dead_letter_topic, ..
        } = event
        {
            assert_eq!(dead_letter_topic, "work.dead_letter");
            saw_dead_letter = true;
        }
    }
    assert!(saw_dead_letter);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_publish_after_shutdown_is_closed() {
    let queue: Arc<TopicQueue<u32>> = TopicQueue::new(QueueConfig::default());
    queue.ensure_topic("t");
    queue.shutdown().await;

    assert!(queue.is_closed());
    assert_eq!(queue.publish("t", 1), PublishOutcome::Closed);
    assert_eq!(queue.publish("never-created", 1), PublishOutcome::Closed);
    assert!(queue.stats("never-created").is_none());

    let delivered = Arc::new(AtomicUsize::new(0));
    let err = queue
        .register_consumers("t", counting_handler(delivered), 1)
        .unwrap_err();
    assert!(matches!(err, Error::Queue(_)));
}

#[tokio::test]
async fn test_drop_event_emitted() {
    let queue = TopicQueue::new(QueueConfig::default().with_capacity(1));
    let mut events = queue.events();

    let _ = queue.publish("t", 1u32);
    assert_eq!(queue.publish("t", 2u32), PublishOutcome::Dropped);

    let mut dropped = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, QueueEvent::MessageDropped { .. }) {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 1);
    assert_eq!(queue.stats("t").unwrap().queued, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_publish_creates_one_topic() {
    const PUBLISHERS: usize = 64;
    let queue = TopicQueue::new(QueueConfig::default().with_capacity(16));
    let mut events = queue.events();
    let barrier = Arc::new(tokio::sync::Barrier::new(PUBLISHERS));

    let mut tasks = Vec::with_capacity(PUBLISHERS);
    for i in 0..PUBLISHERS {
        let queue = queue.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            queue.publish("fresh", i as u32)
        }));
    }
    let mut outcomes = Vec::with_capacity(PUBLISHERS);
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    assert_eq!(queue.topic_names(), vec!["fresh".to_string()]);
    let stats = queue.stats("fresh").unwrap();
    assert_eq!(stats.enqueued, 16);
    assert_eq!(stats.enqueued + stats.dropped, PUBLISHERS as u64);
    assert_eq!(outcomes.iter().filter(|o| o.is_enqueued()).count(), 16);

    let mut created = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, QueueEvent::TopicCreated { .. }) {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

const EXIT_CHILD_ENV: &str = "THINKBANK_QUEUE_EXIT_CHILD";

/// Re-runs itself in a child process, where a panicking handler under
/// `ExitProcess` must take the whole process down with status 1.
#[test]
fn test_handler_panic_exits_process() {
    if std::env::var_os(EXIT_CHILD_ENV).is_some() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let queue = TopicQueue::new(
                QueueConfig::default().with_fault_policy(FaultPolicy::ExitProcess),
            );
            let handler = FnHandler::new(|msg: Message<u32>| async move {
                if msg.payload == 1 {
                    panic!("handler blew up");
                }
                Ok(())
            });
            queue.register_consumers("work", handler, 1).unwrap();
            let _ = queue.publish("work", 1);
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        unreachable!("process should have exited from the worker");
    }

    let status = std::process::Command::new(std::env::current_exe().unwrap())
        .args(["test_handler_panic_exits_process", "--exact", "--test-threads=1"])
        .env(EXIT_CHILD_ENV, "1")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
    assert_eq!(status.code(), Some(1));
}
