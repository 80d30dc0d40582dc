use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, ValueEnum};
use miner_core::{POLL_INTERVAL, REQUEST_TIMEOUT};

/// Что печатать в stdout
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// единая схема для всех майнеров
    #[default]
    Unified,
    /// ответ майнера как есть, по протоколам
    Formatted,
}

/// Miner Client - опрос статистики майнинг-ригов.
///
/// Каждый риг опрашивается в своём потоке; результат печатается в stdout
/// одной JSON-строкой на опрос.
#[derive(Parser, Debug, Clone)]
#[command(name = "miner-client", version, about)]
#[command(
    group(
        ArgGroup::new("rigs_source")
            .required(true)
            .multiple(true)
            .args(["rigs_file", "rig"])
    )
)]
pub(crate) struct Args {
    /// Риг строкой, например "claymore 10.0.0.5:3333 password=pw".
    /// Можно указывать несколько раз
    #[arg(long, value_name = "LINE")]
    pub(crate) rig: Vec<String>,

    /// Файл ригов (по одному на строку, `#` - комментарий)
    #[arg(long)]
    pub(crate) rigs_file: Option<PathBuf>,

    /// Интервал опроса, секунды
    #[arg(
        long,
        default_value_t = POLL_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) interval_secs: u64,

    /// Срок одного опроса, секунды
    #[arg(
        long,
        default_value_t = REQUEST_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) timeout_secs: u64,

    /// Опросить каждый риг один раз и выйти
    #[arg(long)]
    pub(crate) once: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Unified)]
    pub(crate) format: OutputFormat,
}

impl Args {
    /// Проверки, которые clap сам не делает
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(path) = &self.rigs_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("rigs file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--rigs-file must point to a file: {:?}", path);
            }
        }

        if self.rig.iter().any(|r| r.trim().is_empty()) {
            bail!("--rig value is empty");
        }

        // опрос не должен наползать на следующий
        if !self.once && self.timeout_secs > self.interval_secs {
            bail!(
                "--timeout-secs ({}) must not exceed --interval-secs ({})",
                self.timeout_secs,
                self.interval_secs
            );
        }

        Ok(())
    }

    pub(crate) fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
