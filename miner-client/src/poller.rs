//! Периодический опрос ригов: поток на риг, результаты по каналу
//! в главный поток, который печатает их в stdout.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, info, warn};
use miner_client::transport::TICK;
use miner_client::{CancelToken, Deadline, MinerClient, PollError, TransportError};
use miner_core::{UnifiedStats, VendorRecord};
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PollerConfig {
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) once: bool,
    pub(crate) format: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Output {
    Unified(UnifiedStats),
    Formatted(VendorRecord),
}

/// Результат одного опроса одного рига
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) rig: String,
    pub(crate) result: Result<Output, PollError>,
}

#[derive(Serialize)]
struct Line<'a> {
    rig: &'a str,
    stats: &'a Output,
}

/// Итог работы поллера
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) ok: usize,
    pub(crate) failed: usize,
}

/// Запускает потоки опроса и печатает результаты, пока все потоки
/// не завершатся (`--once`) или не придёт shutdown.
pub(crate) fn run(
    clients: Vec<MinerClient>,
    cfg: PollerConfig,
    shutdown: Arc<AtomicBool>,
    out: &mut impl Write,
) -> anyhow::Result<Tally> {
    let (tx, rx) = crossbeam_channel::unbounded::<Report>();

    let mut handles = Vec::with_capacity(clients.len());
    for client in clients {
        handles.push(spawn_poller(client, cfg, shutdown.clone(), tx.clone())?);
    }
    // иначе rx никогда не увидит Disconnected
    drop(tx);

    let mut tally = Tally::default();
    loop {
        match rx.recv_timeout(TICK) {
            Ok(report) => handle_report(report, &shutdown, &mut tally, out)?,
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    debug!("waiting for pollers to stop...");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for h in handles {
        if h.join().is_err() {
            warn!("poller thread panicked");
        }
    }

    Ok(tally)
}

fn spawn_poller(
    client: MinerClient,
    cfg: PollerConfig,
    shutdown: Arc<AtomicBool>,
    tx: Sender<Report>,
) -> anyhow::Result<JoinHandle<()>> {
    let name = format!("poll {}", client.rig());
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_rig(client, cfg, shutdown, tx))
        .with_context(|| format!("failed to spawn thread `{name}`"))
}

fn run_rig(client: MinerClient, cfg: PollerConfig, shutdown: Arc<AtomicBool>, tx: Sender<Report>) {
    let rig = client.rig().to_string();
    info!("polling {rig} every {}s", cfg.interval.as_secs());

    while !shutdown.load(Ordering::Relaxed) {
        let started = Instant::now();
        let deadline = Deadline::with_cancel(cfg.timeout, CancelToken::from_flag(shutdown.clone()));
        let result = poll_once(&client, cfg.format, &deadline);

        if tx
            .send(Report {
                rig: rig.clone(),
                result,
            })
            .is_err()
        {
            // приёмник ушёл
            break;
        }

        if cfg.once {
            break;
        }

        sleep_until(started + cfg.interval, &shutdown);
    }

    debug!("poller for {rig} stopped");
}

fn poll_once(client: &MinerClient, format: OutputFormat, deadline: &Deadline) -> Result<Output, PollError> {
    match format {
        OutputFormat::Unified => client.poll_until(deadline).map(Output::Unified),
        OutputFormat::Formatted => client.formatted_stats_until(deadline).map(Output::Formatted),
    }
}

// сон тиками, чтобы Ctrl+C не ждал конца интервала
fn sleep_until(at: Instant, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        let Some(left) = at.checked_duration_since(Instant::now()) else {
            return;
        };
        thread::sleep(left.min(TICK));
    }
}

fn handle_report(
    report: Report,
    shutdown: &AtomicBool,
    tally: &mut Tally,
    out: &mut impl Write,
) -> io::Result<()> {
    match report.result {
        Ok(stats) => {
            tally.ok += 1;
            let line = Line {
                rig: &report.rig,
                stats: &stats,
            };
            serde_json::to_writer(&mut *out, &line)?;
            writeln!(out)?;
            out.flush()?;
        }
        Err(PollError::Transport(TransportError::Cancelled)) if shutdown.load(Ordering::Relaxed) => {
            debug!("{}: poll cancelled", report.rig);
        }
        Err(e) if e.is_recoverable() => {
            tally.failed += 1;
            info!("{}: skipped poll: {e}", report.rig);
        }
        Err(e) => {
            tally.failed += 1;
            warn!("{}: poll failed: {e}", report.rig);
        }
    }
    Ok(())
}
