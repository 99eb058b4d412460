// src/transport/tcp.rs

use crate::error::TetherError;
use crate::socket::core::SocketCore;
use crate::socket::events::SocketEvent;
use crate::transport::backoff::Backoff;
use crate::transport::endpoint::Endpoint;

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const LISTEN_BACKLOG: u32 = 1024;
/// Pause after a recoverable accept error (e.g. out of file descriptors).
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Opens a listening socket with `SO_REUSEADDR` set.
pub(crate) async fn bind_listener(endpoint: &Endpoint) -> io::Result<TcpListener> {
  let addr = tokio::net::lookup_host(endpoint.authority())
    .await?
    .next()
    .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "endpoint resolved to no address"))?;
  let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
  #[cfg(unix)]
  socket.set_reuseaddr(true)?;
  socket.bind(addr)?;
  socket.listen(LISTEN_BACKLOG)
}

/// Accepts connections until `cancel` fires. Dropping the listener on exit releases the port.
pub(crate) async fn run_accept_loop(
  core: Arc<SocketCore>,
  listener: TcpListener,
  endpoint_uri: String,
  cancel: CancellationToken,
) {
  let handle = core.handle;
  tracing::debug!(handle = handle, uri = %endpoint_uri, "TCP accept loop started");
  loop {
    tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      accept_result = listener.accept() => {
        match accept_result {
          Ok((tcp_stream, peer_addr)) => {
            tracing::debug!(handle = handle, peer = %peer_addr, "Accepted new TCP connection");
            core.attach_stream(tcp_stream, &endpoint_uri);
          }
          Err(e) => {
            let fatal = is_fatal_accept_error(&e);
            core.report_error(&endpoint_uri, &TetherError::Io(e));
            if fatal {
              tracing::error!(handle = handle, uri = %endpoint_uri, "Fatal error in TCP accept loop, stopping.");
              break;
            }
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(ACCEPT_ERROR_PAUSE) => {}
            }
          }
        }
      }
    }
  }
  tracing::debug!(handle = handle, uri = %endpoint_uri, "TCP accept loop finished");
}

/// Connects to `endpoint`, holds the connection while it lives, and reconnects
/// with backoff until the socket closes.
pub(crate) async fn run_connecter(core: Arc<SocketCore>, endpoint: Endpoint, cancel: CancellationToken) {
  let handle = core.handle;
  let uri = endpoint.to_string();
  let options = core.options();
  let mut backoff = Backoff::new(options.retry_timeout, options.retry_max_timeout);
  tracing::debug!(handle = handle, uri = %uri, "TCP connecter started");

  loop {
    if cancel.is_cancelled() || core.is_closing() {
      break;
    }

    let attempt = tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      result = TcpStream::connect(endpoint.authority()) => result,
    };

    match attempt {
      Ok(stream) => {
        backoff.reset();
        if let Some(conn) = core.attach_stream(stream, &uri) {
          // close() destroys every peer, so this always resolves.
          conn.terminated().await;
        }
      }
      Err(e) => {
        backoff.record_failure();
        tracing::debug!(handle = handle, uri = %uri, error = %e, failures = backoff.failures(), "Connect attempt failed");
        core.report_error(&uri, &TetherError::Io(e));
      }
    }

    if cancel.is_cancelled() || core.is_closing() {
      break;
    }

    let options = core.options();
    backoff.set_bounds(options.retry_timeout, options.retry_max_timeout);
    let delay = backoff.delay();
    tracing::debug!(handle = handle, uri = %uri, delay = ?delay, "Waiting before reconnect attempt");
    tokio::select! {
      biased;
      _ = cancel.cancelled() => break,
      _ = sleep(delay) => {}
    }
    core.emit(SocketEvent::ReconnectAttempt {
      endpoint: uri.clone(),
      interval: delay,
    });
  }
  tracing::debug!(handle = handle, uri = %uri, "TCP connecter stopped");
}

fn is_fatal_accept_error(e: &io::Error) -> bool {
  matches!(e.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::BrokenPipe)
}
