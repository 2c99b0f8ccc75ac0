// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;
use std::thread;

use structopt::StructOpt;
use tracing::{debug, debug_span, error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

use canvas_v6::broadcaster::Broadcaster;
use canvas_v6::decoder;
use canvas_v6::grid::PixelGrid;
use canvas_v6::http::{self, AppState};
use canvas_v6::pool::BufferPool;
use canvas_v6::settings::Args;
use canvas_v6::subscriber::SubscriberSet;
use canvas_v6::tun;

#[tokio::main]
async fn main() {
    let fmt_sub = tracing_fmt::Layer::default().with_thread_names(true);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("'info' was not recognized as a valid log filter");
    Registry::default().with(fmt_sub).with(env_filter).init();

    if let Err(err) = run().await {
        error!("{:?}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let span = debug_span!("setup");
    let _enter = span.enter();

    let args = Args::from_args();
    debug!(?args, "parsed configuration");

    if args.io_uring && !cfg!(feature = "io_uring") {
        anyhow::bail!("--io-uring requires this binary to be built with the `io_uring` feature");
    }

    let device = tun::device::open(&args.interface)?;

    let grid = Arc::new(PixelGrid::new());
    let pool = Arc::new(BufferPool::new());
    let (ingress_tx, ingress_rx) = crossbeam_channel::bounded(tun::INGRESS_QUEUE_CAPACITY);

    let worker_count = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    info!(worker_count, "starting decoder pool");
    let _decoders = decoder::spawn(worker_count, ingress_rx, Arc::clone(&grid), Arc::clone(&pool));

    drop(_enter);
    spawn_reader(device, args.io_uring, ingress_tx, Arc::clone(&pool));

    let subscribers = Arc::new(SubscriberSet::new());
    let broadcaster = Broadcaster::new(Arc::clone(&grid), Arc::clone(&subscribers));
    let state = Arc::new(AppState {
        grid,
        subscribers,
        broadcaster,
        interface_name: args.interface.clone(),
    });

    let routes = http::routes(state);
    info!(address = %args.listen_address, port = args.listen_port, "starting HTTP server");
    warp::serve(routes)
        .run((args.listen_address, args.listen_port))
        .await;
    Ok(())
}

/// Spawn the TUN reader on its own OS thread, using the batched io_uring
/// path when requested and built in, the blocking path otherwise.
fn spawn_reader(
    device: ::tun::platform::Device,
    use_io_uring: bool,
    tx: crossbeam_channel::Sender<bytes::BytesMut>,
    pool: Arc<BufferPool>,
) {
    #[cfg(feature = "io_uring")]
    if use_io_uring {
        use std::os::unix::io::AsRawFd;
        let fd = device.as_raw_fd();
        thread::Builder::new()
            .name("tun-reader".to_string())
            .spawn(move || {
                // Keep the device alive for the lifetime of the raw fd.
                let _device = device;
                if let Err(err) = tun::io_uring::run(fd, tx, pool) {
                    error!(%err, "io_uring TUN reader stopped");
                }
            })
            .expect("failed to spawn TUN reader thread");
        return;
    }
    #[cfg(not(feature = "io_uring"))]
    let _ = use_io_uring;

    thread::Builder::new()
        .name("tun-reader".to_string())
        .spawn(move || {
            if let Err(err) = tun::blocking::run(device, tx, pool) {
                error!(%err, "blocking TUN reader stopped");
            }
        })
        .expect("failed to spawn TUN reader thread");
}
