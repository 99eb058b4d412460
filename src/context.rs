// src/context.rs

use crate::error::TetherError;
use crate::socket::{self, ISocket, Socket, SocketType};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Holds the internal state shared by multiple Context handles.
pub(crate) struct ContextInner {
  /// Next available unique handle ID for sockets and connections.
  next_handle: AtomicUsize,
  /// Live sockets created by this context. Weak, so dropping the last
  /// `Socket` handle still tears the socket down.
  sockets: Mutex<HashMap<usize, Weak<dyn ISocket>>>,
  shutdown_initiated: AtomicBool,
}

impl ContextInner {
  fn new() -> Self {
    Self {
      next_handle: AtomicUsize::new(1),
      sockets: Mutex::new(HashMap::new()),
      shutdown_initiated: AtomicBool::new(false),
    }
  }
}

/// A handle to a context, which creates sockets and shuts them down together.
/// Contexts are cloneable and thread-safe.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// Creates a new, independent context.
  pub fn new() -> Result<Self, TetherError> {
    tracing::debug!("Creating new tether Context");
    Ok(Self {
      inner: Arc::new(ContextInner::new()),
    })
  }

  /// Creates a socket of the specified type associated with this context.
  pub fn socket(&self, socket_type: SocketType) -> Result<Socket, TetherError> {
    if self.inner.shutdown_initiated.load(Ordering::Acquire) {
      return Err(TetherError::InvalidState("context is terminated"));
    }
    let handle = self.next_handle();
    tracing::debug!(socket_type = ?socket_type, handle = handle, "Creating socket");
    let socket_impl = socket::create_socket(handle, self.clone(), socket_type);
    self.inner.sockets.lock().insert(handle, Arc::downgrade(&socket_impl));
    Ok(Socket::new(socket_impl))
  }

  /// Closes every socket created by this context and waits for each to finish.
  pub async fn term(self) -> Result<(), TetherError> {
    if self
      .inner
      .shutdown_initiated
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      tracing::debug!("Context termination already initiated.");
    }
    let sockets: Vec<Arc<dyn ISocket>> = self.inner.sockets.lock().values().filter_map(Weak::upgrade).collect();
    tracing::info!(sockets = sockets.len(), "Context terminating");
    for socket in sockets {
      if let Err(e) = socket.close().await {
        tracing::warn!(handle = socket.core().handle, error = %e, "Socket failed to close during term");
      }
    }
    self.inner.sockets.lock().clear();
    tracing::info!("Context termination complete.");
    Ok(())
  }

  /// Number of sockets that have not been closed yet.
  pub fn active_sockets(&self) -> usize {
    self.inner.sockets.lock().values().filter(|s| s.strong_count() > 0).count()
  }

  // --- Internal Methods ---

  pub(crate) fn next_handle(&self) -> usize {
    self.inner.next_handle.fetch_add(1, Ordering::Relaxed)
  }

  pub(crate) fn unregister_socket(&self, handle: usize) {
    if self.inner.sockets.lock().remove(&handle).is_some() {
      tracing::debug!(socket_handle = handle, "Socket unregistered");
    }
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("active_sockets", &self.active_sockets())
      .finish_non_exhaustive()
  }
}

/// Creates a new library context.
pub fn context() -> Result<Context, TetherError> {
  Context::new()
}
