//! Message handlers for queue topics.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use thinkbank_core::Result;

/// A message delivered to a topic consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<P> {
    /// Topic the message was published on.
    pub topic: String,
    pub payload: P,
}

impl<P> Message<P> {
    pub fn new(topic: impl Into<String>, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Trait for topic consumers.
///
/// An `Err` is logged and the message is dropped; a panic is handled according
/// to the queue's [`FaultPolicy`](crate::queue::FaultPolicy).
#[async_trait]
pub trait MessageHandler<P>: Send + Sync {
    async fn handle(&self, message: Message<P>) -> Result<()>;
}

#[async_trait]
impl<P, H> MessageHandler<P> for Arc<H>
where
    P: Send + 'static,
    H: MessageHandler<P> + ?Sized,
{
    async fn handle(&self, message: Message<P>) -> Result<()> {
        (**self).handle(message).await
    }
}

/// Adapts an async closure into a [`MessageHandler`].
pub struct FnHandler<P, F> {
    f: F,
    _payload: PhantomData<fn(P)>,
}

impl<P, F, Fut> FnHandler<P, F>
where
    F: Fn(Message<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F, Fut> MessageHandler<P> for FnHandler<P, F>
where
    P: Send + 'static,
    F: Fn(Message<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, message: Message<P>) -> Result<()> {
        (self.f)(message).await
    }
}
