//! Stream consumption tasks
//!
//! A [`ConsumptionTask`] binds one of the child's streams to one
//! [`Strategy`] and runs it on its own tokio task, started at construction.
//! Failures are never raised on the task itself: they are recorded in the
//! task's [`TaskReport`] and pushed once to the controller's event channel.
//!
//! Every strategy races its work against a cancel signal, so `cancel()`
//! unblocks a pending read or write at its next await point. Caller-supplied
//! consumers must therefore be async and yield; a consumer that blocks the
//! worker thread cannot be interrupted.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::controller::{EventSender, ExecutionEvent};
use super::outcome::{OutputSnapshot, StreamFailure, StreamKind};

/// A readable stream handed to tasks and consumers
pub type ProcessStream = Box<dyn AsyncRead + Send + Unpin>;

/// A caller-supplied (or child stdin) writable sink
pub type StreamSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed future returned by [`StreamConsumer::consume`]
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Caller-supplied callback that receives the live stream
///
/// The consumer may read as much or as little as it likes; whatever it leaves
/// unread is drained and discarded, so an early return never stops the child. Implemented for any
/// `FnOnce(ProcessStream) -> impl Future<Output = anyhow::Result<()>>`.
pub trait StreamConsumer: Send + 'static {
    fn consume(self: Box<Self>, stream: ProcessStream) -> BoxFuture<anyhow::Result<()>>;
}

impl<F, Fut> StreamConsumer for F
where
    F: FnOnce(ProcessStream) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn consume(self: Box<Self>, stream: ProcessStream) -> BoxFuture<anyhow::Result<()>> {
        Box::pin((*self)(stream))
    }
}

/// How a task handles its stream
pub enum Strategy {
    /// Read to end into a buffer owned by the task
    CaptureToBuffer,
    /// Copy bytes verbatim into `sink`; shut it down afterwards when `close` is set
    CopyToSink { sink: StreamSink, close: bool },
    /// Hand the stream to a caller-supplied consumer
    CallConsumer(Box<dyn StreamConsumer>),
}

impl Strategy {
    /// Copy into a caller-owned sink, leaving it open
    pub fn sink(sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Strategy::CopyToSink {
            sink: Box::new(sink),
            close: false,
        }
    }

    pub fn consumer(consumer: impl StreamConsumer) -> Self {
        Strategy::CallConsumer(Box::new(consumer))
    }

    fn name(&self) -> &'static str {
        match self {
            Strategy::CaptureToBuffer => "capture",
            Strategy::CopyToSink { .. } => "copy",
            Strategy::CallConsumer(_) => "consumer",
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CopyToSink { close, .. } => f
                .debug_struct("CopyToSink")
                .field("close", close)
                .finish_non_exhaustive(),
            other => f.write_str(other.name()),
        }
    }
}

/// What a finished task hands back on `join`
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub stream: StreamKind,
    pub snapshot: OutputSnapshot,
    pub failure: Option<StreamFailure>,
}

/// One running drain or feed unit
#[derive(Debug)]
pub struct ConsumptionTask {
    stream: StreamKind,
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<TaskReport>>,
    report: Option<TaskReport>,
}

impl ConsumptionTask {
    /// Spawn the task immediately
    ///
    /// A `None` source makes the task a no-op; the strategy (and any sink it
    /// owns) is dropped right away, which closes a child stdin pipe.
    pub fn start(
        stream: StreamKind,
        source: Option<ProcessStream>,
        strategy: Strategy,
        events: EventSender,
    ) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tracing::trace!(%stream, strategy = strategy.name(), "starting consumption task");

        let handle = tokio::spawn(async move {
            let run = match source {
                Some(source) => {
                    CatchPanic(Box::pin(run_strategy(stream, source, strategy, cancel_rx))).await
                }
                None => Ok((OutputSnapshot::Consumed, Ok(()))),
            };
            let (snapshot, result) = run.unwrap_or_else(|msg| {
                (
                    OutputSnapshot::Discarded,
                    Err(StreamFailure::new(
                        stream,
                        format!("consumption task panicked: {}", msg),
                    )),
                )
            });

            let failure = result.err();
            if let Some(ref failure) = failure {
                tracing::warn!(%stream, error = %failure, "stream handling failed");
                // Controller may already be gone if it decided on another event
                let _ = events.send(ExecutionEvent::StreamFailure(failure.clone()));
            }

            TaskReport {
                stream,
                snapshot,
                failure,
            }
        });

        Self {
            stream,
            cancel: Some(cancel_tx),
            handle: Some(handle),
            report: None,
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Ask the task to stop; its pending read or write is abandoned
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the task to terminate
    ///
    /// Safe to call again (or after the future was dropped part way).
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let result = handle.await;
            self.handle = None;
            self.report = Some(match result {
                Ok(report) => report,
                Err(e) => TaskReport {
                    stream: self.stream,
                    snapshot: OutputSnapshot::Discarded,
                    failure: Some(StreamFailure::new(
                        self.stream,
                        format!("consumption task did not complete: {}", e),
                    )),
                },
            });
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Report of a joined task
    pub fn report(&self) -> Option<&TaskReport> {
        self.report.as_ref()
    }

    pub fn into_report(self) -> Option<TaskReport> {
        self.report
    }
}

/// Turns a panic inside a strategy into an ordinary failure so it still
/// reaches the controller's event channel
struct CatchPanic<F>(Pin<Box<F>>);

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.0.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_strategy(
    stream: StreamKind,
    mut source: ProcessStream,
    strategy: Strategy,
    mut cancel_rx: oneshot::Receiver<()>,
) -> (OutputSnapshot, Result<(), StreamFailure>) {
    match strategy {
        Strategy::CaptureToBuffer => {
            let mut buf = Vec::new();
            let read = tokio::select! {
                r = source.read_to_end(&mut buf) => Some(r),
                _ = &mut cancel_rx => None,
            };
            match read {
                Some(Ok(_)) => (OutputSnapshot::Captured(buf), Ok(())),
                Some(Err(e)) => (OutputSnapshot::Discarded, Err(StreamFailure::new(stream, e))),
                None => {
                    tracing::debug!(%stream, bytes = buf.len(), "capture cancelled");
                    (OutputSnapshot::Captured(buf), Ok(()))
                }
            }
        }
        Strategy::CopyToSink { mut sink, close } => {
            let copy = async {
                tokio::io::copy(&mut source, &mut sink).await?;
                if close {
                    sink.shutdown().await
                } else {
                    sink.flush().await
                }
            };
            let result = tokio::select! {
                r = copy => r,
                _ = &mut cancel_rx => {
                    tracing::debug!(%stream, "copy cancelled");
                    Ok(())
                }
            };
            (OutputSnapshot::Consumed, copy_result(stream, result))
        }
        Strategy::CallConsumer(consumer) => {
            let result = tokio::select! {
                r = call_consumer(stream, &mut source, consumer) => r,
                _ = &mut cancel_rx => {
                    tracing::debug!(%stream, "consumer cancelled");
                    Ok(())
                }
            };
            (OutputSnapshot::Consumed, result)
        }
    }
}

/// Capacity of the in-memory pipe between a child stream and its consumer
const CONSUMER_PIPE_CAPACITY: usize = 64 * 1024;

/// Run `consumer` against a forwarded copy of `source`
///
/// The task keeps the child's pipe. A consumer that returns before the end
/// of input only drops its side of the forwarding pipe; the rest of the
/// child's output is read and discarded, so the child never sees SIGPIPE.
async fn call_consumer(
    stream: StreamKind,
    source: &mut ProcessStream,
    consumer: Box<dyn StreamConsumer>,
) -> Result<(), StreamFailure> {
    let (forward, handed) = tokio::io::duplex(CONSUMER_PIPE_CAPACITY);
    let mut consume = consumer.consume(Box::new(handed));
    let pump = forward_stream(stream, source, forward);
    tokio::pin!(pump);

    tokio::select! {
        consumed = &mut consume => {
            consumed.map_err(|e| StreamFailure::from_consumer(stream, e))?;
            pump.await.map_err(|e| StreamFailure::new(stream, e))
        }
        pumped = &mut pump => {
            pumped.map_err(|e| StreamFailure::new(stream, e))?;
            consume.await.map_err(|e| StreamFailure::from_consumer(stream, e))
        }
    }
}

/// Copy `source` into `forward` until end of input
///
/// Once the consumer side is gone, remaining bytes are drained and dropped.
/// Returning drops `forward`, which the consumer sees as end of input.
async fn forward_stream(
    stream: StreamKind,
    source: &mut ProcessStream,
    forward: DuplexStream,
) -> io::Result<()> {
    let mut forward = Some(forward);
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if let Some(writer) = forward.as_mut() {
            if writer.write_all(&buf[..n]).await.is_err() {
                tracing::debug!(%stream, "consumer returned early; discarding remaining output");
                forward = None;
            }
        }
    }
}

/// A child that stops reading its stdin early is not a stream failure
fn copy_result(stream: StreamKind, result: io::Result<()>) -> Result<(), StreamFailure> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if stream == StreamKind::Stdin && e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!("child closed stdin before all input was written");
            Ok(())
        }
        Err(e) => Err(StreamFailure::new(stream, e)),
    }
}
