//! Приведение любого вендорского ответа к [`UnifiedStats`].
//!
//! Единица хешрейта на выходе - H/s. Множитель зависит от протокола:
//!
//! | протокол | родная единица | множитель |
//! |----------|----------------|-----------|
//! | Claymore / Ethminer | масштабируется при декодировании ([`ScaleConvention`]) | 1 |
//! | SGMiner / TeamRedMiner | kH/s | 1000 |
//! | XMRStak / XMRig | H/s | 1 |
//!
//! [`ScaleConvention`]: crate::positional::ScaleConvention

use serde::Serialize;

use crate::command::SgMinerStats;
use crate::http_json::{XmrStakStats, XmrigSummary};
use crate::positional::ClaymoreStats;
use crate::types::{
    CoinSelect, DISABLED, DISABLED_RATE, Shares, UnifiedDevice, UnifiedStats,
};

/// kH/s -> H/s
pub const SGMINER_SCALE: f64 = 1000.0;

/// Структурированный ответ одного из поддерживаемых протоколов
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum VendorRecord {
    Claymore {
        primary_coin: String,
        secondary_coin: String,
        stats: ClaymoreStats,
    },
    SgMiner {
        coin: String,
        stats: SgMinerStats,
    },
    XmrStak {
        coin: String,
        stats: XmrStakStats,
    },
    Xmrig {
        stats: XmrigSummary,
    },
}

impl VendorRecord {
    /// Умеет ли протокол отдавать вторую монету
    pub fn is_dual(&self) -> bool {
        matches!(self, VendorRecord::Claymore { .. })
    }

    pub fn normalize(&self, coin: CoinSelect) -> UnifiedStats {
        normalize(self, coin)
    }
}

/// Выбирает ровно один поток хешрейта (основная или вторая монета)
/// и переименовывает его в `hashrate`.
pub fn normalize(record: &VendorRecord, coin: CoinSelect) -> UnifiedStats {
    match record {
        VendorRecord::Claymore {
            primary_coin,
            secondary_coin,
            stats,
        } => normalize_claymore(primary_coin, secondary_coin, stats, coin),
        VendorRecord::SgMiner { coin: name, stats } => {
            let unified = normalize_sgminer(name, stats);
            single_coin(unified, coin)
        }
        VendorRecord::XmrStak { coin: name, stats } => {
            let unified = normalize_xmrstak(name, stats);
            single_coin(unified, coin)
        }
        VendorRecord::Xmrig { stats } => single_coin(normalize_xmrig(stats), coin),
    }
}

fn normalize_claymore(
    primary_coin: &str,
    secondary_coin: &str,
    stats: &ClaymoreStats,
    coin: CoinSelect,
) -> UnifiedStats {
    let (name, pool) = match coin {
        CoinSelect::Primary => (primary_coin, &stats.primary),
        CoinSelect::Secondary => (secondary_coin, &stats.secondary),
    };

    let devices = stats
        .devices
        .iter()
        .enumerate()
        .map(|(index, d)| UnifiedDevice {
            index,
            hashrate: match coin {
                CoinSelect::Primary => d.hashrate,
                CoinSelect::Secondary => d.secondary_hashrate,
            },
            temp: Some(d.temp as f64),
            fan: Some(d.fan as f64),
        })
        .collect();

    UnifiedStats {
        coin: name.to_string(),
        total_hashrate: pool.total_hashrate,
        shares: Shares {
            accepted: pool.accepted,
            rejected: pool.rejected,
            invalid: Some(pool.invalid),
        },
        uptime_minutes: stats.uptime_minutes(),
        version: stats.version.clone(),
        devices,
    }
}

fn normalize_sgminer(coin: &str, stats: &SgMinerStats) -> UnifiedStats {
    let s = &stats.summary;

    let devices = stats
        .devs
        .iter()
        .enumerate()
        .map(|(index, d)| UnifiedDevice {
            index,
            hashrate: d.hashrate_khs * SGMINER_SCALE,
            temp: Some(d.temperature),
            fan: Some(d.fan_percent),
        })
        .collect();

    UnifiedStats {
        coin: coin.to_string(),
        total_hashrate: s.hashrate_khs * SGMINER_SCALE,
        shares: Shares {
            accepted: s.accepted,
            rejected: s.rejected,
            invalid: Some(s.discarded + s.stale),
        },
        uptime_minutes: s.elapsed / 60,
        version: stats.version.clone(),
        devices,
    }
}

fn normalize_xmrstak(coin: &str, stats: &XmrStakStats) -> UnifiedStats {
    UnifiedStats {
        coin: coin.to_string(),
        total_hashrate: stats.total_hashrate,
        shares: Shares {
            accepted: stats.accepted,
            rejected: stats.rejected,
            invalid: Some(stats.invalid),
        },
        uptime_minutes: stats.uptime_minutes,
        version: stats.version.clone(),
        devices: thread_devices(&stats.threads),
    }
}

fn normalize_xmrig(stats: &XmrigSummary) -> UnifiedStats {
    UnifiedStats {
        coin: stats.algo.clone(),
        total_hashrate: stats.total_hashrate,
        shares: Shares {
            accepted: stats.accepted,
            rejected: stats.rejected,
            invalid: None,
        },
        uptime_minutes: stats.uptime_minutes,
        version: stats.version.clone(),
        devices: thread_devices(&stats.threads),
    }
}

fn thread_devices(threads: &[f64]) -> Vec<UnifiedDevice> {
    threads
        .iter()
        .enumerate()
        .map(|(index, &hashrate)| UnifiedDevice {
            index,
            hashrate,
            temp: None,
            fan: None,
        })
        .collect()
}

// у однопоточных протоколов второй монеты нет: отдаём выключенный поток
fn single_coin(mut unified: UnifiedStats, coin: CoinSelect) -> UnifiedStats {
    if coin == CoinSelect::Secondary {
        unified.total_hashrate = DISABLED_RATE;
        unified.shares = Shares {
            accepted: DISABLED,
            rejected: DISABLED,
            invalid: None,
        };
        for d in &mut unified.devices {
            d.hashrate = DISABLED_RATE;
        }
    }
    unified
}
