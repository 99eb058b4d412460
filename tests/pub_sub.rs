// tests/pub_sub.rs

use serial_test::serial;
use tether::{Msg, SocketType};
use std::time::Duration;
mod common;

const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
const LONG_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
#[serial]
async fn test_pub_reaches_every_connected_peer() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let pub_monitor = publisher.monitor_default();
  publisher.bind("tcp://127.0.0.1:5770").await?;

  let mut subscribers = Vec::new();
  for _ in 0..3 {
    let sub = ctx.socket(SocketType::Pull)?;
    sub.connect("tcp://127.0.0.1:5770").await?;
    subscribers.push(sub);
  }
  common::wait_for_connections(&pub_monitor, 3, LONG_TIMEOUT).await.map_err(anyhow::Error::msg)?;

  publisher.send(Msg::from("news").with_part("flash"))?;
  publisher.send("weather")?;

  for sub in &subscribers {
    let first = common::recv_timeout(sub, LONG_TIMEOUT).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(first.data().unwrap(), b"news");
    let second = common::recv_timeout(sub, LONG_TIMEOUT).await?;
    assert_eq!(second.data().unwrap(), b"weather");
  }

  ctx.term().await?;
  Ok(())
}

#[tokio::test]
#[serial]
async fn test_pub_without_peers_discards() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let pub_monitor = publisher.monitor_default();
  publisher.bind((5771, "127.0.0.1")).await?;

  // Nothing is queued for later subscribers.
  publisher.send("lost")?;

  let sub = ctx.socket(SocketType::Pull)?;
  sub.connect((5771, "127.0.0.1")).await?;
  common::wait_for_connections(&pub_monitor, 1, LONG_TIMEOUT).await.map_err(anyhow::Error::msg)?;
  assert!(common::recv_timeout(&sub, SHORT_TIMEOUT).await.is_err());

  publisher.send("seen")?;
  let msg = common::recv_timeout(&sub, LONG_TIMEOUT).await?;
  assert_eq!(msg.data().unwrap(), b"seen");

  ctx.term().await?;
  Ok(())
}

#[tokio::test]
#[serial]
async fn test_connected_pub_broadcasts_to_bound_puller() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let pull = ctx.socket(SocketType::Pull)?;
  let pull_monitor = pull.monitor_default();
  pull.bind((5772, "127.0.0.1")).await?;

  let publisher = ctx.socket(SocketType::Pub)?;
  publisher.connect((5772, "127.0.0.1")).await?;
  common::wait_for_connections(&pull_monitor, 1, LONG_TIMEOUT).await.map_err(anyhow::Error::msg)?;
  // The pub side registers its peer once its own connect completes.
  tokio::time::sleep(Duration::from_millis(50)).await;

  publisher.send("hello")?;
  let msg = common::recv_timeout(&pull, LONG_TIMEOUT).await?;
  assert_eq!(msg.data().unwrap(), b"hello");

  ctx.term().await?;
  Ok(())
}
