// tests/common.rs
#![allow(dead_code)]

use tether::socket::{MonitorReceiver, SocketEvent};
use tether::{Context, Msg, Socket, TetherError};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::sync::Once;
use std::time::Duration;

use tokio::time::timeout;

static TRACING_INIT: Once = Once::new();

fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Overridable with RUST_LOG
    let default_filter = "tether=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}

pub fn test_context() -> Context {
  setup_tracing();
  tether::Context::new().expect("Failed to create test context")
}

pub async fn recv_timeout(socket: &Socket, duration: Duration) -> Result<Msg, TetherError> {
  match timeout(duration, socket.recv()).await {
    Ok(Ok(msg)) => Ok(msg),
    Ok(Err(e)) => Err(e),
    Err(_) => Err(TetherError::Timeout),
  }
}

/// Receives until `duration` passes without a message.
pub async fn drain(socket: &Socket, duration: Duration) -> Vec<Msg> {
  let mut msgs = Vec::new();
  while let Ok(msg) = recv_timeout(socket, duration).await {
    msgs.push(msg);
  }
  msgs
}

pub async fn wait_for_monitor_event(
  monitor_rx: &MonitorReceiver,
  timeout: Duration,
  check_event: impl Fn(&SocketEvent) -> bool,
) -> Result<SocketEvent, String> {
  let deadline = tokio::time::Instant::now() + timeout;
  loop {
    match tokio::time::timeout_at(deadline, monitor_rx.recv()).await {
      Ok(Ok(event)) => {
        println!("Monitor received: {:?}", event);
        if check_event(&event) {
          return Ok(event);
        }
      }
      Ok(Err(_)) => return Err("Monitor channel closed unexpectedly".to_string()),
      Err(_) => {
        return Err(format!(
          "Timeout waiting for specific monitor event after {:?}",
          timeout
        ))
      }
    }
  }
}

/// Waits until `count` `Connected` events were seen.
pub async fn wait_for_connections(monitor_rx: &MonitorReceiver, count: usize, timeout: Duration) -> Result<(), String> {
  for _ in 0..count {
    wait_for_monitor_event(monitor_rx, timeout, |e| matches!(e, SocketEvent::Connected { .. })).await?;
  }
  Ok(())
}

/// Everything already sitting in the monitor channel, plus whatever arrives within `quiet`.
pub async fn collect_events(monitor_rx: &MonitorReceiver, quiet: Duration) -> Vec<SocketEvent> {
  let mut events = Vec::new();
  while let Ok(Ok(event)) = tokio::time::timeout(quiet, monitor_rx.recv()).await {
    events.push(event);
  }
  events
}
