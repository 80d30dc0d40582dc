//! # miner-core
//!
//! Декодирование и нормализация статистики майнеров разных вендоров.
//!
//! Этот крейт содержит:
//!
//! - [`protocol`] - формирование запросов (JSON-RPC Claymore, команды SGMiner)
//! - [`positional`] - позиционный протокол Claymore / Ethminer
//! - [`command`] - командный протокол SGMiner / TeamRedMiner
//! - [`http_json`] - HTTP JSON API XMRig / XMRStak
//! - [`normalize`] - приведение к единой схеме [`UnifiedStats`]
//! - [`rigs`] - чтение списка ригов из текста/файла
//! - [`wire`] - сырой ответ майнера
//! - [`types`] - доменные типы
//! - [`error`] - типы ошибок, которые возвращают компоненты `miner-core`
//!
//! ## Быстрый пример: ответ Claymore
//!
//! ```rust
//! use miner_core::positional::{decode_fields, ScaleConvention};
//! use miner_core::normalize::VendorRecord;
//! use miner_core::CoinSelect;
//!
//! let result = [
//!     "0.14.0", "306", "44414;174;2", "14573;15036;14805", "off;off;off",
//!     "off;off;off", "41;11;51;21;61;31", "us1.ethermine.org:5551", "11;22;0;0",
//! ];
//! let stats = decode_fields(&result, ScaleConvention::Modern).unwrap();
//! assert_eq!(stats.uptime_hhmm(), "05:06");
//! assert_eq!(stats.devices[1].secondary_hashrate, -1.0);
//!
//! let record = VendorRecord::Claymore {
//!     primary_coin: "ETH".into(),
//!     secondary_coin: "DCR".into(),
//!     stats,
//! };
//! let unified = record.normalize(CoinSelect::Primary);
//! assert_eq!(unified.total_hashrate, 44_414_000.0);
//! ```
//!
//! ## Пример: запрос команды SGMiner
//!
//! ```rust
//! use miner_core::protocol::{format_command_line, SgCommand};
//!
//! assert_eq!(format_command_line(SgCommand::Devs), "{\"command\":\"devs\"}\n");
//! ```
//!
//! ## Пример: список ригов
//!
//! ```rust
//! use miner_core::rigs::read_rigs;
//! use std::io::Cursor;
//!
//! let input = "claymore 10.0.0.5:3333\n# comment\n xmrig 10.0.0.7:8080 token=abc \n";
//! let rigs = read_rigs(Cursor::new(input)).unwrap();
//! assert_eq!(rigs.len(), 2);
//! ```
//!
//! ## Дизайн
//!
//! `miner-core` - чистые типы, парсинг и нормализация, без сети и без
//! runtime. Транспорт (TCP/HTTP) живёт в `miner-client` и отдаёт сюда
//! только [`RawFrame`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Формирование запросов к майнерам.
pub mod protocol;

/// Claymore / Ethminer.
pub mod positional;

/// SGMiner / TeamRedMiner.
pub mod command;

/// XMRig / XMRStak.
pub mod http_json;

/// Единая схема статистики.
pub mod normalize;

/// Чтение/разбор списка ригов из текста и файлов.
pub mod rigs;

/// Доменные типы.
pub mod types;

/// Сырой ответ майнера.
pub mod wire;

/// Ошибки `miner-core`.
pub mod error;

/// Общие константы
mod constants;
pub use constants::{MAX_FRAME_LEN, POLL_INTERVAL, REQUEST_TIMEOUT};

// --- Re-exports (публичный фасад API) ---

pub use crate::error::{DecodeError, RigListError, RigSpecError};
pub use crate::normalize::VendorRecord;
pub use crate::positional::ScaleConvention;
pub use crate::rigs::{ProtocolKind, RigSpec};
pub use crate::types::{CoinSelect, Shares, UnifiedDevice, UnifiedStats};
pub use crate::wire::RawFrame;
