// src/transport/connection.rs

use crate::error::TetherError;
use crate::protocol::amp::AmpFrameCodec;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Weak;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

/// Receives what a connection reads and learns when it ends.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
  /// One complete raw frame arrived.
  fn on_frame(&self, conn_id: usize, frame: Bytes);

  /// The connection stopped. `error` is `None` for EOF or a local `destroy`.
  fn on_terminated(&self, conn_id: usize, error: Option<TetherError>);
}

/// One live TCP connection owned by a socket.
///
/// Writes go into an unbounded buffer drained by the connection task, so
/// `write` never suspends. The peer stays writable until the connection ends.
pub struct ConnectionEndpoint {
  id: usize,
  peer_addr: String,
  /// Endpoint URI this connection was bound or connected under.
  endpoint_uri: String,
  write_tx: async_channel::Sender<Bytes>,
  shutdown: CancellationToken,
  terminated: CancellationToken,
}

impl fmt::Debug for ConnectionEndpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectionEndpoint")
      .field("id", &self.id)
      .field("peer_addr", &self.peer_addr)
      .field("endpoint_uri", &self.endpoint_uri)
      .field("buffered", &self.buffered())
      .finish()
  }
}

/// The not-yet-started half of a connection. Call `spawn` once the endpoint
/// has been registered, so termination can never race registration.
pub(crate) struct ConnectionDriver<S> {
  id: usize,
  stream: S,
  write_rx: async_channel::Receiver<Bytes>,
  shutdown: CancellationToken,
  terminated: CancellationToken,
  handler: Weak<dyn ConnectionHandler>,
}

impl ConnectionEndpoint {
  pub(crate) fn new(
    id: usize,
    stream: TcpStream,
    peer_addr: String,
    endpoint_uri: String,
    handler: Weak<dyn ConnectionHandler>,
  ) -> (std::sync::Arc<Self>, ConnectionDriver<TcpStream>) {
    Self::with_stream(id, stream, peer_addr, endpoint_uri, handler)
  }

  fn with_stream<S>(
    id: usize,
    stream: S,
    peer_addr: String,
    endpoint_uri: String,
    handler: Weak<dyn ConnectionHandler>,
  ) -> (std::sync::Arc<Self>, ConnectionDriver<S>) {
    let (write_tx, write_rx) = async_channel::unbounded();
    let shutdown = CancellationToken::new();
    let terminated = CancellationToken::new();
    let endpoint = std::sync::Arc::new(Self {
      id,
      peer_addr,
      endpoint_uri,
      write_tx,
      shutdown: shutdown.clone(),
      terminated: terminated.clone(),
    });
    let driver = ConnectionDriver {
      id,
      stream,
      write_rx,
      shutdown,
      terminated,
      handler,
    };
    (endpoint, driver)
  }

  pub fn id(&self) -> usize {
    self.id
  }

  pub fn peer_addr(&self) -> &str {
    &self.peer_addr
  }

  pub fn endpoint_uri(&self) -> &str {
    &self.endpoint_uri
  }

  /// True until the connection is destroyed or its task has ended.
  pub fn is_writable(&self) -> bool {
    !self.write_tx.is_closed()
  }

  /// Queues one packed frame. Returns `false` once the connection is closed.
  pub fn write(&self, frame: Bytes) -> bool {
    if self.write_tx.try_send(frame).is_err() {
      tracing::trace!(peer_id = self.id, peer = %self.peer_addr, "write on closed connection");
      return false;
    }
    true
  }

  /// Frames written but not yet handed to the socket.
  pub fn buffered(&self) -> usize {
    self.write_tx.len()
  }

  /// Tears the connection down without flushing buffered frames.
  pub fn destroy(&self) {
    self.write_tx.close();
    self.shutdown.cancel();
  }

  /// Resolves once the connection task has finished and reported.
  pub async fn terminated(&self) {
    self.terminated.cancelled().await
  }

  /// An endpoint with no socket behind it. Frames written to it show up on
  /// the returned receiver.
  #[cfg(test)]
  pub(crate) fn detached(id: usize) -> (std::sync::Arc<Self>, async_channel::Receiver<Bytes>) {
    let (endpoint, driver) = Self::with_stream(
      id,
      (),
      format!("127.0.0.1:{}", 10_000 + id),
      "tcp://127.0.0.1:0".to_string(),
      Weak::<NoopHandler>::new(),
    );
    (endpoint, driver.write_rx)
  }
}

#[cfg(test)]
struct NoopHandler;

#[cfg(test)]
impl ConnectionHandler for NoopHandler {
  fn on_frame(&self, _conn_id: usize, _frame: Bytes) {}
  fn on_terminated(&self, _conn_id: usize, _error: Option<TetherError>) {}
}

impl ConnectionDriver<TcpStream> {
  /// Starts the task that drives both halves of the stream.
  pub(crate) fn spawn(self) -> tokio::task::JoinHandle<()> {
    let ConnectionDriver {
      id,
      stream,
      write_rx,
      shutdown,
      terminated,
      handler,
    } = self;
    let (read_half, write_half) = stream.into_split();
    tokio::spawn(async move {
      tracing::debug!(peer_id = id, "Connection task started");
      let outcome = tokio::select! {
        biased;
        _ = shutdown.cancelled() => Ok(()),
        r = read_loop(id, read_half, handler.clone()) => r,
        w = write_loop(id, write_half, write_rx.clone()) => w,
      };
      write_rx.close();
      if let Err(ref e) = outcome {
        tracing::debug!(peer_id = id, error = %e, "Connection ended with error");
      } else {
        tracing::debug!(peer_id = id, "Connection ended");
      }
      if let Some(handler) = handler.upgrade() {
        handler.on_terminated(id, outcome.err());
      }
      terminated.cancel();
    })
  }
}

async fn read_loop<R>(id: usize, read_half: R, handler: Weak<dyn ConnectionHandler>) -> Result<(), TetherError>
where
  R: AsyncRead + Unpin,
{
  let mut frames = FramedRead::new(read_half, AmpFrameCodec::new());
  while let Some(frame) = frames.next().await {
    let frame = frame?;
    tracing::trace!(peer_id = id, len = frame.len(), "Frame received");
    match handler.upgrade() {
      Some(handler) => handler.on_frame(id, frame),
      None => return Ok(()),
    }
  }
  // EOF
  Ok(())
}

async fn write_loop<W>(id: usize, write_half: W, write_rx: async_channel::Receiver<Bytes>) -> Result<(), TetherError>
where
  W: AsyncWrite + Unpin,
{
  let mut sink = FramedWrite::new(write_half, AmpFrameCodec::new());
  while let Ok(frame) = write_rx.recv().await {
    sink.feed(frame).await?;
    // Drain whatever else is already buffered before paying for a flush.
    while let Ok(next) = write_rx.try_recv() {
      sink.feed(next).await?;
    }
    sink.flush().await?;
  }
  tracing::trace!(peer_id = id, "Write buffer closed");
  // Buffer closed locally; keep the read side alive until the task is cancelled.
  futures::future::pending::<()>().await;
  Ok(())
}
