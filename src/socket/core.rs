// src/socket/core.rs

use crate::context::Context;
use crate::error::{TetherError, TetherResult};
use crate::message::Msg;
use crate::protocol::amp::MAX_PARTS;
use crate::security::{self, IPacker, PlainPacker};
use crate::socket::events::{MonitorReceiver, MonitorSender, SocketEvent};
use crate::socket::options::{OptionValue, SocketOptions};
use crate::socket::peers::PeerSet;
use crate::socket::{ISocket, SocketType};
use crate::transport::endpoint::{BoundAddress, Endpoint};
use crate::transport::tcp;
use crate::transport::{ConnectionEndpoint, ConnectionHandler};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fixed by the first `bind` or `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
  Unset,
  Client,
  Server,
}

#[derive(Debug)]
struct ListenerState {
  local_addr: SocketAddr,
  task: JoinHandle<()>,
}

#[derive(Debug)]
struct CoreState {
  role: Role,
  listener: Option<ListenerState>,
  connecters: Vec<JoinHandle<()>>,
}

/// State and lifecycle shared by every socket pattern.
pub(crate) struct SocketCore {
  pub(crate) handle: usize,
  pub(crate) socket_type: SocketType,
  context: Context,
  options: RwLock<SocketOptions>,
  packer: RwLock<Arc<dyn IPacker>>,
  pub(crate) peers: PeerSet,
  state: Mutex<CoreState>,
  closing: AtomicBool,
  close_emitted: AtomicBool,
  /// Parent of every listener and connecter token. Replaced when a closed socket binds again.
  shutdown: Mutex<CancellationToken>,
  monitor_tx: RwLock<Option<MonitorSender>>,
  inbound_tx: async_channel::Sender<Msg>,
  inbound_rx: async_channel::Receiver<Msg>,
  socket: RwLock<Option<Weak<dyn ISocket>>>,
}

impl std::fmt::Debug for SocketCore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SocketCore")
      .field("handle", &self.handle)
      .field("socket_type", &self.socket_type)
      .field("peers", &self.peers.len())
      .field("closing", &self.is_closing())
      .finish_non_exhaustive()
  }
}

impl SocketCore {
  pub(crate) fn new(handle: usize, socket_type: SocketType, context: Context, options: SocketOptions) -> Arc<Self> {
    let (inbound_tx, inbound_rx) = async_channel::unbounded();
    let packer: Arc<dyn IPacker> = match security::packer_for(&options) {
      Ok(packer) => packer,
      Err(e) => {
        tracing::warn!(handle = handle, error = %e, "Initial security options rejected, using plain framing");
        Arc::new(PlainPacker)
      }
    };
    Arc::new(Self {
      handle,
      socket_type,
      context,
      options: RwLock::new(options),
      packer: RwLock::new(packer),
      peers: PeerSet::new(),
      state: Mutex::new(CoreState {
        role: Role::Unset,
        listener: None,
        connecters: Vec::new(),
      }),
      closing: AtomicBool::new(false),
      close_emitted: AtomicBool::new(false),
      shutdown: Mutex::new(CancellationToken::new()),
      monitor_tx: RwLock::new(None),
      inbound_tx,
      inbound_rx,
      socket: RwLock::new(None),
    })
  }

  /// Links the pattern socket that owns this core.
  pub(crate) fn set_socket(&self, socket: Weak<dyn ISocket>) {
    *self.socket.write() = Some(socket);
  }

  fn socket(&self) -> Option<Arc<dyn ISocket>> {
    self.socket.read().as_ref().and_then(Weak::upgrade)
  }

  pub(crate) fn is_closing(&self) -> bool {
    self.closing.load(Ordering::SeqCst)
  }

  // --- Options ---

  pub(crate) fn set_option(&self, key: &str, value: OptionValue) -> TetherResult<()> {
    let mut options = self.options.write();
    let previous = options.clone();
    let touches_security = options.set(key, value)?;
    if touches_security {
      if let Err(e) = self.reconcile_plugins(&options) {
        *options = previous;
        return Err(e);
      }
    }
    tracing::debug!(handle = self.handle, option = key, "Option set");
    Ok(())
  }

  pub(crate) fn set_options<I, K>(&self, items: I) -> TetherResult<()>
  where
    I: IntoIterator<Item = (K, OptionValue)>,
    K: AsRef<str>,
  {
    for (key, value) in items {
      self.set_option(key.as_ref(), value)?;
    }
    Ok(())
  }

  pub(crate) fn get_option(&self, key: &str) -> Option<OptionValue> {
    self.options.read().get(key)
  }

  pub(crate) fn options(&self) -> SocketOptions {
    self.options.read().clone()
  }

  pub(crate) fn hwm(&self) -> Option<usize> {
    self.options.read().hwm
  }

  /// Installs the packer the options call for. Running it twice is harmless.
  fn reconcile_plugins(&self, options: &SocketOptions) -> TetherResult<()> {
    let packer = security::packer_for(options)?;
    tracing::debug!(handle = self.handle, secure = packer.is_secure(), "Packer installed");
    *self.packer.write() = packer;
    Ok(())
  }

  fn current_packer(&self) -> Arc<dyn IPacker> {
    self.packer.read().clone()
  }

  // --- Framing ---

  /// Rejects messages that can never be framed, before they are queued or routed.
  pub(crate) fn check_msg(&self, msg: &Msg) -> TetherResult<()> {
    if msg.len() > MAX_PARTS {
      return Err(TetherError::InvalidMessage(format!(
        "a message holds at most {} parts, got {}",
        MAX_PARTS,
        msg.len()
      )));
    }
    Ok(())
  }

  pub(crate) fn pack(&self, msg: &Msg) -> TetherResult<Bytes> {
    self.current_packer().pack(msg.parts())
  }

  pub(crate) fn unpack(&self, frame: &[u8]) -> TetherResult<Msg> {
    self.current_packer().unpack(frame).map(Msg::from_parts)
  }

  // --- Events ---

  /// Opens a monitor channel. A later call replaces the earlier monitor.
  pub(crate) fn monitor(&self, capacity: usize) -> MonitorReceiver {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    *self.monitor_tx.write() = Some(tx);
    rx
  }


  pub(crate) fn emit(&self, event: SocketEvent) {
    let guard = self.monitor_tx.read();
    let Some(tx) = guard.as_ref() else {
      return;
    };
    if let Err(e) = tx.try_send(event) {
      tracing::trace!(handle = self.handle, error = %e, "Monitor event not delivered");
    }
  }

  /// Emits `SocketError` plus `IgnoredError` or `Error`, depending on the fault.
  pub(crate) fn report_error(&self, endpoint: &str, error: &TetherError) {
    let error_msg = error.to_string();
    self.emit(SocketEvent::SocketError {
      endpoint: endpoint.to_string(),
      error_msg: error_msg.clone(),
    });
    if is_transient_error(error) {
      tracing::debug!(handle = self.handle, uri = %endpoint, error = %error, "Ignoring transient connection error");
      self.emit(SocketEvent::IgnoredError {
        endpoint: endpoint.to_string(),
        error_msg,
      });
    } else {
      tracing::warn!(handle = self.handle, uri = %endpoint, error = %error, "Connection error");
      self.emit(SocketEvent::Error {
        endpoint: endpoint.to_string(),
        error_msg,
      });
    }
  }

  // --- Inbound ---

  pub(crate) async fn recv(&self) -> TetherResult<Msg> {
    let shutdown = self.shutdown.lock().clone();
    tokio::select! {
      biased;
      msg = self.inbound_rx.recv() => msg.map_err(|_| TetherError::InvalidState("socket is closed")),
      _ = shutdown.cancelled() => {
        // Messages that arrived before close are still handed out.
        self.inbound_rx.try_recv().map_err(|_| TetherError::InvalidState("socket is closed"))
      }
    }
  }

  pub(crate) fn try_recv(&self) -> Option<Msg> {
    self.inbound_rx.try_recv().ok()
  }

  // --- Lifecycle ---

  pub(crate) async fn bind(self: &Arc<Self>, endpoint: Endpoint) -> TetherResult<()> {
    self.check_can_bind()?;

    let uri = endpoint.to_string();
    let listener = tcp::bind_listener(&endpoint)
      .await
      .map_err(|e| TetherError::from_io_endpoint(e, &uri))?;
    let local_addr = listener.local_addr()?;
    let bound_uri = format!("tcp://{}", local_addr);

    let mut state = self.state.lock();
    // Another bind or connect may have won while the listener was opening.
    match state.role {
      Role::Client => return Err(TetherError::InvalidState("cannot bind() after connect()")),
      Role::Server if state.listener.is_some() => return Err(TetherError::InvalidState("cannot bind() multiple times")),
      _ => {}
    }
    state.role = Role::Server;
    self.closing.store(false, Ordering::SeqCst);
    self.close_emitted.store(false, Ordering::SeqCst);
    let cancel = self.fresh_child_token();

    tracing::info!(handle = self.handle, uri = %bound_uri, "Socket bound");
    self.emit(SocketEvent::Bound {
      endpoint: bound_uri.clone(),
    });
    let task = tokio::spawn(tcp::run_accept_loop(self.clone(), listener, bound_uri, cancel));
    state.listener = Some(ListenerState { local_addr, task });
    Ok(())
  }

  fn check_can_bind(&self) -> TetherResult<()> {
    let state = self.state.lock();
    match state.role {
      Role::Client => Err(TetherError::InvalidState("cannot bind() after connect()")),
      Role::Server if state.listener.is_some() => Err(TetherError::InvalidState("cannot bind() multiple times")),
      _ => Ok(()),
    }
  }

  /// Starts a connecter for `endpoint` and returns without waiting for it.
  pub(crate) async fn connect(self: &Arc<Self>, endpoint: Endpoint) -> TetherResult<()> {
    let mut state = self.state.lock();
    if state.role == Role::Server {
      return Err(TetherError::InvalidState("cannot connect() after bind()"));
    }
    if self.is_closing() {
      return Err(TetherError::InvalidState("socket is closed"));
    }
    state.role = Role::Client;
    let cancel = self.shutdown.lock().child_token();
    tracing::debug!(handle = self.handle, uri = %endpoint, "Starting connecter");
    let task = tokio::spawn(tcp::run_connecter(self.clone(), endpoint, cancel));
    state.connecters.retain(|t| !t.is_finished());
    state.connecters.push(task);
    Ok(())
  }

  fn fresh_child_token(&self) -> CancellationToken {
    let mut token = self.shutdown.lock();
    if token.is_cancelled() {
      *token = CancellationToken::new();
    }
    token.child_token()
  }

  /// Registers a freshly opened stream as a peer and starts its connection task.
  ///
  /// Returns `None` if the socket started closing in the meantime; the stream
  /// is dropped in that case.
  pub(crate) fn attach_stream(self: &Arc<Self>, stream: TcpStream, endpoint_uri: &str) -> Option<Arc<ConnectionEndpoint>> {
    if let Err(e) = stream.set_nodelay(true) {
      tracing::warn!(handle = self.handle, uri = %endpoint_uri, error = %e, "Failed to set TCP_NODELAY");
    }
    let peer_addr = stream
      .peer_addr()
      .map(|a| a.to_string())
      .unwrap_or_else(|_| endpoint_uri.to_string());
    if self.is_closing() {
      tracing::debug!(handle = self.handle, peer = %peer_addr, "Socket closing, dropping new connection");
      return None;
    }

    let id = self.context.next_handle();
    let handler: Weak<dyn ConnectionHandler> = Arc::downgrade(self) as Weak<dyn ConnectionHandler>;
    let (conn, driver) = ConnectionEndpoint::new(id, stream, peer_addr.clone(), endpoint_uri.to_string(), handler);
    self.peers.add(conn.clone());
    driver.spawn();

    // close() sets the flag before it snapshots peers, so one side always sees the other.
    if self.is_closing() {
      self.peers.remove(id);
      conn.destroy();
      return None;
    }

    tracing::info!(handle = self.handle, peer_id = id, peer = %peer_addr, uri = %endpoint_uri, "Peer connected");
    self.emit(SocketEvent::Connected {
      endpoint: endpoint_uri.to_string(),
      peer_addr,
    });
    if let Some(socket) = self.socket() {
      socket.on_peer_attached();
    }
    Some(conn)
  }

  /// Best-effort shutdown for a socket dropped without `close()`. Cancels
  /// every task and destroys the peers without waiting for them.
  pub(crate) fn abort(&self) {
    if self.closing.swap(true, Ordering::SeqCst) {
      return;
    }
    tracing::debug!(handle = self.handle, "Socket dropped without close, aborting");
    self.shutdown.lock().cancel();
    for peer in self.peers.snapshot() {
      peer.destroy();
    }
    if !self.close_emitted.swap(true, Ordering::SeqCst) {
      self.emit(SocketEvent::Closed);
    }
    self.context.unregister_socket(self.handle);
  }

  /// Shuts everything down. Safe to call more than once.
  pub(crate) async fn close(&self) -> TetherResult<()> {
    if self.closing.swap(true, Ordering::SeqCst) {
      tracing::debug!(handle = self.handle, "Close already in progress or done");
      return Ok(());
    }
    tracing::debug!(handle = self.handle, "Closing socket");
    self.shutdown.lock().cancel();

    let peers = self.peers.snapshot();
    for peer in &peers {
      peer.destroy();
    }
    for peer in &peers {
      peer.terminated().await;
    }

    let (listener, connecters) = {
      let mut state = self.state.lock();
      (state.listener.take(), std::mem::take(&mut state.connecters))
    };
    if let Some(listener) = listener {
      if let Err(e) = listener.task.await {
        tracing::warn!(handle = self.handle, error = %e, "Accept loop ended abnormally");
      }
      tracing::debug!(handle = self.handle, addr = %listener.local_addr, "Listener released");
    }
    for connecter in connecters {
      if let Err(e) = connecter.await {
        tracing::warn!(handle = self.handle, error = %e, "Connecter ended abnormally");
      }
    }

    if !self.close_emitted.swap(true, Ordering::SeqCst) {
      self.emit(SocketEvent::Closed);
    }
    self.context.unregister_socket(self.handle);
    tracing::info!(handle = self.handle, "Socket closed");
    Ok(())
  }

  pub(crate) fn address(&self) -> Option<BoundAddress> {
    self
      .state
      .lock()
      .listener
      .as_ref()
      .map(|l| BoundAddress::from(l.local_addr))
  }
}

impl ConnectionHandler for SocketCore {
  fn on_frame(&self, conn_id: usize, frame: Bytes) {
    match self.unpack(&frame) {
      Ok(msg) => {
        if self.inbound_tx.try_send(msg).is_err() {
          tracing::trace!(handle = self.handle, peer_id = conn_id, "Inbound channel closed, dropping message");
        }
      }
      Err(e) => {
        let endpoint = self
          .peers
          .get(conn_id)
          .map(|p| p.endpoint_uri().to_string())
          .unwrap_or_default();
        tracing::warn!(handle = self.handle, peer_id = conn_id, error = %e, "Failed to unpack inbound frame");
        self.emit(SocketEvent::Error {
          endpoint,
          error_msg: e.to_string(),
        });
      }
    }
  }

  fn on_terminated(&self, conn_id: usize, error: Option<TetherError>) {
    let removed = self.peers.remove(conn_id);
    let (endpoint, peer_addr) = match &removed {
      Some(peer) => (peer.endpoint_uri().to_string(), peer.peer_addr().to_string()),
      None => (String::new(), String::new()),
    };
    if let Some(e) = error {
      self.report_error(&endpoint, &e);
    }
    if removed.is_some() {
      tracing::debug!(handle = self.handle, peer_id = conn_id, peer = %peer_addr, "Peer disconnected");
      self.emit(SocketEvent::Disconnected { endpoint, peer_addr });
    }
  }
}

/// Network faults a socket recovers from on its own.
pub(crate) fn is_transient_error(error: &TetherError) -> bool {
  match error {
    TetherError::Io(e) => is_transient_io_error(e),
    TetherError::Timeout => true,
    _ => false,
  }
}

fn is_transient_io_error(e: &io::Error) -> bool {
  if let Some(code) = e.raw_os_error() {
    return matches!(
      code,
      libc::ECONNREFUSED
        | libc::ECONNRESET
        | libc::ETIMEDOUT
        | libc::EHOSTUNREACH
        | libc::ENETUNREACH
        | libc::ENETDOWN
        | libc::EPIPE
        | libc::ENOENT
    );
  }
  matches!(
    e.kind(),
    io::ErrorKind::ConnectionRefused
      | io::ErrorKind::ConnectionReset
      | io::ErrorKind::ConnectionAborted
      | io::ErrorKind::TimedOut
      | io::ErrorKind::BrokenPipe
      | io::ErrorKind::NotFound
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transient_errors_by_os_code() {
    for code in [libc::ECONNREFUSED, libc::ECONNRESET, libc::EPIPE, libc::ENETDOWN, libc::ENOENT] {
      let err = TetherError::Io(io::Error::from_raw_os_error(code));
      assert!(is_transient_error(&err), "code {} should be transient", code);
    }
    let err = TetherError::Io(io::Error::from_raw_os_error(libc::EACCES));
    assert!(!is_transient_error(&err));
  }

  #[test]
  fn transient_errors_by_kind() {
    let err = TetherError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
    assert!(is_transient_error(&err));
    let err = TetherError::Io(io::Error::new(io::ErrorKind::InvalidData, "bad"));
    assert!(!is_transient_error(&err));
    assert!(!is_transient_error(&TetherError::ProtocolViolation("x".into())));
  }
}
