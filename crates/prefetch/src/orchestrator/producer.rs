//! Producer capability

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Future returned by a producer
pub type ProducerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Loads one resource.
///
/// The token fires when the attempt is cancelled. Honouring it is optional:
/// a producer that ignores it keeps running, but its result is discarded.
pub trait Producer: Send + Sync + 'static {
    fn produce(&self, cancellation: CancellationToken) -> ProducerFuture;
}

impl<F, Fut> Producer for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn produce(&self, cancellation: CancellationToken) -> ProducerFuture {
        self(cancellation).boxed()
    }
}

/// Shared producer handle stored in tables and requests
pub type SharedProducer = Arc<dyn Producer>;

/// Wrap a closure or [`Producer`] into a [`SharedProducer`]
pub fn producer<P: Producer>(producer: P) -> SharedProducer {
    Arc::new(producer)
}
