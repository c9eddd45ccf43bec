//! In-process, topic-keyed, bounded publish/subscribe broker.
//!
//! Each topic is a bounded mpsc channel created lazily on first use. Any
//! number of worker tasks compete for messages on one topic by sharing the
//! receiver behind an async mutex, so there is no ordering guarantee between
//! workers. Publishing never blocks: when a topic is full the message is
//! dropped and counted.
//!
//! Messages live only in memory and are lost if the process exits.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use thinkbank_core::defaults::{
    DEAD_LETTER_SUFFIX, ENV_QUEUE_CAPACITY, ENV_QUEUE_FAULT_POLICY, QUEUE_CAPACITY,
    QUEUE_DRAIN_TIMEOUT_SECS,
};
use thinkbank_core::{Error, Result};

use crate::handler::{Message, MessageHandler};

/// Capacity of the queue event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// What happens when a handler panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Log and terminate the process with a non-zero status so a supervisor
    /// restarts it.
    ExitProcess,
    /// Log, keep the worker alive, and optionally republish the message to
    /// `"{topic}.dead_letter"`.
    Isolate { dead_letter: bool },
}

impl Default for FaultPolicy {
    fn default() -> Self {
        FaultPolicy::ExitProcess
    }
}

impl std::str::FromStr for FaultPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exit" | "exit_process" => Ok(FaultPolicy::ExitProcess),
            "isolate" | "dead_letter" => Ok(FaultPolicy::Isolate { dead_letter: true }),
            "isolate_drop" => Ok(FaultPolicy::Isolate { dead_letter: false }),
            other => Err(Error::Config(format!(
                "unknown fault policy {:?} (expected exit, isolate or isolate_drop)",
                other
            ))),
        }
    }
}

/// Configuration for a [`TopicQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Buffered messages per topic before publishes are dropped.
    pub capacity: usize,
    pub fault_policy: FaultPolicy,
    /// How long `shutdown` waits for workers to drain.
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: QUEUE_CAPACITY,
            fault_policy: FaultPolicy::default(),
            drain_timeout: Duration::from_secs(QUEUE_DRAIN_TIMEOUT_SECS),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUEUE_CAPACITY` | `1000` | Buffered messages per topic |
    /// | `QUEUE_FAULT_POLICY` | `exit` | `exit`, `isolate` or `isolate_drop` |
    pub fn from_env() -> Self {
        let capacity = std::env::var(ENV_QUEUE_CAPACITY)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(QUEUE_CAPACITY)
            .max(1);

        let fault_policy = match std::env::var(ENV_QUEUE_FAULT_POLICY) {
            Ok(v) => v.parse::<FaultPolicy>().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring invalid QUEUE_FAULT_POLICY");
                FaultPolicy::default()
            }),
            Err(_) => FaultPolicy::default(),
        };

        Self {
            capacity,
            fault_policy,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Result of a publish. Producers may ignore it; publish never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the outcome reports whether the message was dropped"]
pub enum PublishOutcome {
    Enqueued,
    /// The topic was full.
    Dropped,
    /// The queue has been shut down.
    Closed,
}

impl PublishOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, PublishOutcome::Enqueued)
    }
}

/// Snapshot of per-topic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub enqueued: u64,
    pub dropped: u64,
    /// Handler returned `Ok`.
    pub handled: u64,
    /// Handler returned `Err` or panicked.
    pub failed: u64,
    /// Messages currently buffered.
    pub queued: usize,
}

/// Event emitted by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    TopicCreated { topic: String },
    MessageDropped { topic: String },
    HandlerFailed { topic: String, error: String },
    HandlerPanicked { topic: String },
    DeadLettered { topic: String, dead_letter_topic: String },
    ShutdownComplete,
}

#[derive(Default)]
struct TopicCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    handled: AtomicU64,
    failed: AtomicU64,
}

// =============================================================================
// TOPIC
// =============================================================================

struct Topic<P> {
    name: String,
    capacity: usize,
    /// `None` once the topic is closed; dropping the sender lets workers
    /// drain the buffer and then observe end of stream.
    sender: Mutex<Option<mpsc::Sender<Message<P>>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Message<P>>>>,
    counters: TopicCounters,
}

impl<P> Topic<P> {
    fn new(name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: name.to_string(),
            capacity,
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            counters: TopicCounters::default(),
        }
    }

    fn close(&self) {
        lock(&self.sender).take();
    }

    fn stats(&self) -> TopicStats {
        let queued = lock(&self.sender)
            .as_ref()
            .map(|tx| self.capacity - tx.capacity())
            .unwrap_or(0);
        TopicStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            handled: self.counters.handled.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            queued,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// QUEUE
// =============================================================================

/// Topic-keyed broker shared as `Arc<TopicQueue<P>>` by producers and consumers.
pub struct TopicQueue<P> {
    config: QueueConfig,
    topics: RwLock<HashMap<String, Arc<Topic<P>>>>,
    closed: AtomicBool,
    workers: Mutex<JoinSet<()>>,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl<P> TopicQueue<P>
where
    P: Clone + Send + 'static,
{
    pub fn new(config: QueueConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            topics: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            workers: Mutex::new(JoinSet::new()),
            event_tx,
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Get a receiver for queue events.
    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Return the named topic, creating it if needed.
    ///
    /// Double-checked: concurrent first use creates exactly one channel.
    fn topic(&self, name: &str) -> Arc<Topic<P>> {
        {
            let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
            if let Some(topic) = topics.get(name) {
                return topic.clone();
            }
        }

        let mut topics = self.topics.write().unwrap_or_else(|e| e.into_inner());
        if let Some(topic) = topics.get(name) {
            return topic.clone();
        }
        let topic = Arc::new(Topic::new(name, self.config.capacity));
        topics.insert(name.to_string(), topic.clone());
        drop(topics);

        debug!(
            subsystem = "queue",
            component = "topic_queue",
            topic = name,
            capacity = self.config.capacity,
            "Topic created"
        );
        let _ = self.event_tx.send(QueueEvent::TopicCreated {
            topic: name.to_string(),
        });
        topic
    }

    /// Ensure a topic exists without publishing to it.
    pub fn ensure_topic(&self, name: &str) {
        if !self.is_closed() {
            self.topic(name);
        }
    }

    /// Names of all topics created so far.
    pub fn topic_names(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Enqueue a message without blocking.
    ///
    /// A full topic drops the message with a warning.
    pub fn publish(&self, topic: &str, payload: P) -> PublishOutcome {
        if self.is_closed() {
            debug!(subsystem = "queue", topic, "Publish after shutdown ignored");
            return PublishOutcome::Closed;
        }
        let t = self.topic(topic);
        let guard = lock(&t.sender);
        let Some(sender) = guard.as_ref() else {
            return PublishOutcome::Closed;
        };

        match sender.try_send(Message::new(topic, payload)) {
            Ok(()) => {
                t.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                PublishOutcome::Enqueued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                t.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subsystem = "queue",
                    component = "topic_queue",
                    topic,
                    capacity = t.capacity,
                    "Queue full, message dropped"
                );
                let _ = self.event_tx.send(QueueEvent::MessageDropped {
                    topic: topic.to_string(),
                });
                PublishOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PublishOutcome::Closed,
        }
    }

    /// Spawn `workers` tasks consuming `topic` with `handler`.
    ///
    /// May be called more than once per topic; all workers compete on the
    /// same channel. Must be called from within a tokio runtime.
    pub fn register_consumers<H>(self: &Arc<Self>, topic: &str, handler: H, workers: usize) -> Result<()>
    where
        H: MessageHandler<P> + 'static,
    {
        if self.is_closed() {
            return Err(Error::Queue(format!(
                "cannot register consumers on {}: queue is shut down",
                topic
            )));
        }
        if workers == 0 {
            return Err(Error::InvalidInput("worker count must be at least 1".into()));
        }

        let t = self.topic(topic);
        let handler: Arc<dyn MessageHandler<P>> = Arc::new(handler);
        let mut set = lock(&self.workers);
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                topic: t.clone(),
                handler: handler.clone(),
                policy: self.config.fault_policy,
                queue: Arc::downgrade(self),
                event_tx: self.event_tx.clone(),
            };
            set.spawn(worker.run());
        }

        info!(
            subsystem = "queue",
            component = "topic_queue",
            topic,
            workers,
            "Consumers registered"
        );
        Ok(())
    }

    /// Counters for one topic, or `None` if it was never used.
    pub fn stats(&self, topic: &str) -> Option<TopicStats> {
        let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map(|t| t.stats())
    }

    /// Close every topic, let workers drain buffered messages, and wait for
    /// them to exit (bounded by the drain timeout).
    ///
    /// Publishes after this point return [`PublishOutcome::Closed`].
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let start = Instant::now();

        let topics: Vec<Arc<Topic<P>>> = {
            let topics = self.topics.read().unwrap_or_else(|e| e.into_inner());
            topics.values().cloned().collect()
        };
        for topic in &topics {
            topic.close();
        }

        let mut workers = std::mem::take(&mut *lock(&self.workers));
        info!(
            subsystem = "queue",
            component = "topic_queue",
            op = "shutdown",
            workers = workers.len(),
            "Draining queue workers"
        );

        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    error!(subsystem = "queue", error = ?e, "Queue worker task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                subsystem = "queue",
                remaining = workers.len(),
                timeout_secs = self.config.drain_timeout.as_secs(),
                "Drain timeout elapsed, aborting remaining workers"
            );
            workers.abort_all();
        }

        info!(
            subsystem = "queue",
            component = "topic_queue",
            op = "shutdown",
            duration_ms = start.elapsed().as_millis() as u64,
            "Queue stopped"
        );
        let _ = self.event_tx.send(QueueEvent::ShutdownComplete);
    }
}

// =============================================================================
// WORKER
// =============================================================================

struct Worker<P> {
    id: usize,
    topic: Arc<Topic<P>>,
    handler: Arc<dyn MessageHandler<P>>,
    policy: FaultPolicy,
    queue: Weak<TopicQueue<P>>,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl<P> Worker<P>
where
    P: Clone + Send + 'static,
{
    async fn run(self) {
        debug!(subsystem = "queue", topic = %self.topic.name, worker = self.id, "Worker started");

        loop {
            let next = {
                let mut rx = self.topic.receiver.lock().await;
                rx.recv().await
            };
            let Some(message) = next else { break };
            self.process(message).await;
        }

        debug!(subsystem = "queue", topic = %self.topic.name, worker = self.id, "Worker stopped");
    }

    async fn process(&self, message: Message<P>) {
        let retained = match self.policy {
            FaultPolicy::Isolate { dead_letter: true } => Some(message.payload.clone()),
            _ => None,
        };

        let outcome = AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.topic.counters.handled.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.topic.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subsystem = "queue",
                    topic = %self.topic.name,
                    worker = self.id,
                    error = %e,
                    "Handler failed, message dropped"
                );
                let _ = self.event_tx.send(QueueEvent::HandlerFailed {
                    topic: self.topic.name.clone(),
                    error: e.to_string(),
                });
            }
            Err(panic) => {
                self.topic.counters.failed.fetch_add(1, Ordering::Relaxed);
                let reason = panic_message(&*panic);
                let _ = self.event_tx.send(QueueEvent::HandlerPanicked {
                    topic: self.topic.name.clone(),
                });
                self.on_panic(&reason, retained);
            }
        }
    }

    fn on_panic(&self, reason: &str, retained: Option<P>) {
        match self.policy {
            FaultPolicy::ExitProcess => {
                error!(
                    subsystem = "queue",
                    topic = %self.topic.name,
                    worker = self.id,
                    panic = reason,
                    "Handler panicked, exiting process"
                );
                std::process::exit(1);
            }
            FaultPolicy::Isolate { .. } => {
                error!(
                    subsystem = "queue",
                    topic = %self.topic.name,
                    worker = self.id,
                    panic = reason,
                    "Handler panicked, worker continues"
                );
                let (Some(payload), Some(queue)) = (retained, self.queue.upgrade()) else {
                    return;
                };
                let dead_letter_topic = format!("{}{}", self.topic.name, DEAD_LETTER_SUFFIX);
                if queue.publish(&dead_letter_topic, payload).is_enqueued() {
                    let _ = self.event_tx.send(QueueEvent::DeadLettered {
                        topic: self.topic.name.clone(),
                        dead_letter_topic,
                    });
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
