//! Точка входа `miner-client`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка списка ригов
//! - по потоку опроса на каждый риг
//! - печать результатов в stdout, по JSON-строке на опрос
//! - корректная остановка по `Ctrl+C` (прерывает и опросы в полёте)

mod cli;
mod poller;
mod rigs;

use std::io;
use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};

use anyhow::{Context, bail};
use clap::Parser;
use log::info;
use miner_client::MinerClient;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug
    env_logger::init();

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => shutdown=true; этот же флаг отменяет дедлайны опросов
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let args = cli::Args::parse();
    args.validate()?;

    let rigs = rigs::load_rigs(&args)?;

    info!(
        "Starting miner-client: rigs={}, interval={}s, timeout={}s, once={}, format={:?}",
        rigs.len(),
        args.interval_secs,
        args.timeout_secs,
        args.once,
        args.format
    );

    let clients = rigs
        .into_iter()
        .map(|rig| {
            let name = rig.to_string();
            MinerClient::new(rig)
                .map(|c| c.with_timeout(args.timeout()))
                .with_context(|| format!("failed to create client for {name}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let total = clients.len();

    let cfg = poller::PollerConfig {
        interval: args.interval(),
        timeout: args.timeout(),
        once: args.once,
        format: args.format,
    };

    let tally = poller::run(clients, cfg, shutdown.clone(), &mut io::stdout().lock())?;
    info!("done: ok={}, failed={}", tally.ok, tally.failed);

    if args.once && tally.failed > 0 && !shutdown.load(Ordering::Relaxed) {
        bail!("{} of {} polls failed", tally.failed, total);
    }

    Ok(())
}
