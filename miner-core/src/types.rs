use std::fmt;

use serde::Serialize;

/// Значение метрики, которую майнер прислал как `"off"` (функция выключена).
/// Не путать с 0: ноль значит "включено, но ничего нет".
pub const DISABLED: i64 = -1;

/// То же для хешрейтов
pub const DISABLED_RATE: f64 = -1.0;

/// Какую монету (поток хешрейта) отдавать в unified-схеме
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinSelect {
    #[default]
    Primary,
    Secondary,
}

/// Одна видеокарта. Индекс - позиция в массиве ответа, не аппаратный id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStat {
    pub hashrate: f64,
    /// `DISABLED_RATE`, если вторая монета выключена
    pub secondary_hashrate: f64,
    pub temp: i64,
    pub fan: i64,
}

/// Статистика пула по одной монете
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStat {
    pub pool: String,
    pub pool_switches: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub invalid: i64,
    pub total_hashrate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shares {
    pub accepted: i64,
    pub rejected: i64,
    /// `None`, если протокол такого счётчика не отдаёт
    pub invalid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedDevice {
    pub index: usize,
    /// H/s выбранной монеты
    pub hashrate: f64,
    pub temp: Option<f64>,
    pub fan: Option<f64>,
}

/// Нормализованная статистика, одинаковая для всех протоколов
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedStats {
    pub coin: String,
    /// H/s
    pub total_hashrate: f64,
    pub shares: Shares,
    pub uptime_minutes: u64,
    pub version: String,
    pub devices: Vec<UnifiedDevice>,
}

impl UnifiedStats {
    pub fn uptime_hhmm(&self) -> String {
        format_hhmm(self.uptime_minutes)
    }
}

impl fmt::Display for UnifiedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "coin={} hashrate={} H/s accepted={} rejected={} uptime={} devices={} version={}",
            self.coin,
            self.total_hashrate,
            self.shares.accepted,
            self.shares.rejected,
            self.uptime_hhmm(),
            self.devices.len(),
            self.version
        )
    }
}

/// Минуты -> "HH:MM"
pub fn format_hhmm(minutes: u64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
