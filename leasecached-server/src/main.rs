#[cfg(feature = "alloc_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::net::UdpSocket;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use leasecached_server::config::Config;
use leasecached_server::metrics::Metrics;
use leasecached_server::net::{self, UdpSender};
use leasecached_server::processor::Processor;
use leasecached_server::queue::{self, CommandQueue};
use leasecached_server::receiver::Receiver;
use leasecached_server::store::lease::Cache;
use leasecached_server::time::SystemClock;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env();
    run(cfg)
}

fn run(cfg: Config) -> anyhow::Result<()> {
    tracing::info!("starting leasecached server on {}", cfg.bind_addr);

    let socket = UdpSocket::bind(&cfg.bind_addr)?;
    let sender = Arc::new(UdpSender::new(socket.try_clone()?));

    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(Cache::new(
        cfg.num_buckets,
        cfg.lease_list_size,
        cfg.lease_timeout_secs,
        cfg.num_value_segments,
        cfg.segment_capacity_bytes,
        Arc::new(SystemClock),
    ));

    let processors: Vec<Arc<Processor>> = (0..cfg.num_processors)
        .map(|_| {
            let queue = Arc::new(CommandQueue::new(cfg.buffer_size));
            Arc::new(Processor::new(
                queue,
                cache.clone(),
                sender.clone() as Arc<dyn net::ResponseSender>,
                metrics.clone(),
                cfg.max_result_package_size,
            ))
        })
        .collect();

    let receiver = Arc::new(Receiver::new(
        processors,
        cfg.big_command_store_size,
        cfg.max_batch_size as u32,
        metrics.clone(),
    ));
    receiver.run_in_background();

    let shutdown_receiver = receiver.clone();
    ctrlc_shutdown(move || shutdown_receiver.shutdown());

    let mut packet = vec![0u8; 1 << 16];
    loop {
        let (size, peer) = match socket.recv_from(&mut packet) {
            Ok(v) => v,
            Err(err) => {
                tracing::error!("udp recv error: {}", err);
                return Err(err.into());
            }
        };

        let addr = match peer.ip() {
            std::net::IpAddr::V4(ip) => queue::ClientAddress { ip: ip.octets(), port: peer.port() },
            std::net::IpAddr::V6(_) => {
                tracing::warn!("dropping datagram from unsupported IPv6 peer {}", peer);
                continue;
            }
        };

        receiver.recv(addr, &packet[..size]);
    }
}

/// Installs a `ctrl_c` handler that runs `on_shutdown` once, then lets
/// the process exit normally once the UDP read loop notices.
fn ctrlc_shutdown(on_shutdown: impl FnOnce() + Send + 'static) {
    let mut on_shutdown = Some(on_shutdown);
    let _ = ctrlc::set_handler(move || {
        if let Some(cb) = on_shutdown.take() {
            cb();
        }
        std::process::exit(0);
    });
}
