// benches/push_pull_throughput.rs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tether::{
  socket::{options, MonitorReceiver, SocketEvent},
  Context, Msg, Socket, SocketType, TetherError,
};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::time::timeout;

const NUM_MESSAGES: usize = 10_000;
const BIND_ADDR: &str = "tcp://127.0.0.1:5680";
const SETUP_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_RECV_TIMEOUT: Duration = Duration::from_secs(4);

async fn wait_for_event(
  monitor_rx: &MonitorReceiver,
  check_event: impl Fn(&SocketEvent) -> bool,
) -> Result<SocketEvent, String> {
  let deadline = tokio::time::Instant::now() + EVENT_RECV_TIMEOUT;
  loop {
    match tokio::time::timeout_at(deadline, monitor_rx.recv()).await {
      Ok(Ok(event)) if check_event(&event) => return Ok(event),
      Ok(Ok(_)) => {}
      Ok(Err(_)) => return Err("Monitor channel closed unexpectedly".to_string()),
      Err(_) => return Err(format!("Timeout after {:?}", EVENT_RECV_TIMEOUT)),
    }
  }
}

async fn setup_push_pull(ctx: &Context, secure: bool) -> anyhow::Result<(Socket, Socket)> {
  let push = ctx.socket(SocketType::Push)?;
  let pull = ctx.socket(SocketType::Pull)?;
  if secure {
    for socket in [&push, &pull] {
      socket.set_option(options::SECRET, "bench secret")?;
      socket.set_option(options::SECURE, true)?;
    }
  }

  let pull_monitor = pull.monitor_default();
  pull.bind(BIND_ADDR).await?;
  push.connect(BIND_ADDR).await?;
  wait_for_event(&pull_monitor, |e| matches!(e, SocketEvent::Connected { .. }))
    .await
    .map_err(|e| anyhow::anyhow!("PULL connection event error: {}", e))?;
  Ok((push, pull))
}

fn push_pull_tcp_throughput(c: &mut Criterion) {
  let rt = Runtime::new().expect("Failed to create Tokio runtime");
  let mut group = c.benchmark_group("PUSH_PULL_TCP_Throughput");

  for secure in [false, true] {
    for size in [16usize, 1024, 16384] {
      group.throughput(Throughput::Bytes((NUM_MESSAGES * size) as u64));
      let label = if secure { "secure" } else { "plain" };
      let bench_id = BenchmarkId::new(label, format!("{}B", size));

      group.bench_with_input(bench_id, &size, |b, &msg_size| {
        b.to_async(&rt).iter_custom(|iters| async move {
          let mut total = Duration::ZERO;
          for _ in 0..iters {
            let ctx = Context::new().expect("Bench context creation failed");
            let (push, pull) = match timeout(SETUP_TIMEOUT, setup_push_pull(&ctx, secure)).await {
              Ok(Ok(sockets)) => sockets,
              Ok(Err(e)) => panic!("Bench socket setup failed: {}", e),
              Err(_) => panic!("Bench socket setup timed out overall"),
            };
            let payload = vec![0u8; msg_size];

            let start = Instant::now();
            let receiver = tokio::spawn(async move {
              for _ in 0..NUM_MESSAGES {
                let msg = pull.recv().await?;
                black_box(msg.data());
              }
              Ok::<_, TetherError>(())
            });
            for _ in 0..NUM_MESSAGES {
              push
                .send(Msg::from_vec(black_box(payload.clone())))
                .expect("send failed");
            }
            receiver
              .await
              .expect("Receiver task panicked")
              .expect("Receiver failed");
            total += start.elapsed();

            ctx.term().await.expect("Context termination failed");
          }
          total
        });
      });
    }
  }
  group.finish();
}

criterion_group!(benches, push_pull_tcp_throughput);
criterion_main!(benches);
