//! Позиционный протокол Claymore / Ethminer (`miner_getstat1` / `miner_getstats1`).
//!
//! Ответ - JSON-RPC, где `result` это массив ровно из 9 строк:
//!
//! | idx | содержимое |
//! |-----|------------|
//! | 0 | версия майнера |
//! | 1 | аптайм в минутах |
//! | 2 | `total_khs;accepted;rejected` основной монеты |
//! | 3 | хешрейт основной монеты по картам, `;` |
//! | 4 | `total_khs;accepted;rejected` второй монеты, каждое может быть `off` |
//! | 5 | хешрейт второй монеты по картам, может быть `off` |
//! | 6 | `temp;fan;temp;fan;...` по картам |
//! | 7 | пул |
//! | 8 | `invalid;switches;invalid2;switches2` |

use serde::Serialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::protocol::RpcMethod;
use crate::types::{DISABLED, DeviceStat, PoolStat, format_hhmm};
use crate::wire::RawFrame;

const FIELD_COUNT: usize = 9;
const OFF: &str = "off";

/// Во что превращать "родные" kH/s майнера.
///
/// Разные поколения протокола расходятся в направлении масштаба,
/// поэтому это настройка декодера, а не константа.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleConvention {
    /// `miner_getstat1`: kH/s / 1000
    Legacy,
    /// `miner_getstats1`: kH/s * 1000 = H/s
    #[default]
    Modern,
}

impl ScaleConvention {
    pub fn for_method(method: RpcMethod) -> Self {
        match method {
            RpcMethod::GetStat1 => ScaleConvention::Legacy,
            _ => ScaleConvention::Modern,
        }
    }

    /// Масштабирует значение; отрицательный сентинел `off` не трогаем
    pub fn apply(&self, native: f64) -> f64 {
        if native < 0.0 {
            return native;
        }
        match self {
            ScaleConvention::Legacy => native / 1000.0,
            ScaleConvention::Modern => native * 1000.0,
        }
    }
}

/// Разобранный ответ Claymore / Ethminer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaymoreStats {
    pub version: String,
    uptime_minutes: u64,
    pub scale: ScaleConvention,
    pub primary: PoolStat,
    pub secondary: PoolStat,
    pub devices: Vec<DeviceStat>,
}

impl ClaymoreStats {
    /// Аптайм как есть, в минутах
    pub fn uptime_minutes(&self) -> u64 {
        self.uptime_minutes
    }

    /// Аптайм в виде "HH:MM"
    pub fn uptime_hhmm(&self) -> String {
        format_hhmm(self.uptime_minutes)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

/// Декодирует сырой ответ целиком (JSON-RPC конверт + позиционный массив)
pub fn decode_frame(frame: &RawFrame, scale: ScaleConvention) -> Result<ClaymoreStats, DecodeError> {
    let v = frame.json()?;

    if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
        return Err(rpc_error(err));
    }

    let result = v
        .get("result")
        .ok_or_else(|| DecodeError::missing("result"))?
        .as_array()
        .ok_or_else(|| DecodeError::malformed("result", "expected array"))?;

    let fields = result
        .iter()
        .enumerate()
        .map(|(i, f)| {
            f.as_str()
                .ok_or_else(|| DecodeError::malformed(format!("result[{i}]"), "expected string"))
        })
        .collect::<Result<Vec<&str>, _>>()?;

    decode_fields(&fields, scale)
}

/// Ответ на служебный метод (`miner_ping`, `miner_getstatdetail`, ...):
/// проверяет `error` и отдаёт `result` как есть
pub fn decode_reply(frame: &RawFrame) -> Result<Value, DecodeError> {
    let mut v = frame.json()?;

    if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
        return Err(rpc_error(err));
    }

    v.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| DecodeError::missing("result"))
}

/// Декодирует уже извлечённый массив `result`
pub fn decode_fields(fields: &[&str], scale: ScaleConvention) -> Result<ClaymoreStats, DecodeError> {
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::malformed(
            "result",
            format!("expected {FIELD_COUNT} elements, got {}", fields.len()),
        ));
    }

    let version = fields[0].to_string();

    let uptime_minutes: u64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| DecodeError::malformed("result[1]", format!("not an integer: {:?}", fields[1])))?;

    let [total, accepted, rejected] = exact::<3>(2, fields[2])?;
    let total = parse_count(2, total)?;
    let accepted = parse_count(2, accepted)?;
    let rejected = parse_count(2, rejected)?;

    let rates = split_list(fields[3])
        .map(|s| parse_rate_or_off(3, s).map(|r| scale.apply(r)))
        .collect::<Result<Vec<_>, _>>()?;

    let [total2, accepted2, rejected2] = exact::<3>(4, fields[4])?;
    let total2 = parse_count_or_off(4, total2)?;
    let accepted2 = parse_count_or_off(4, accepted2)?;
    let rejected2 = parse_count_or_off(4, rejected2)?;

    let rates2 = split_list(fields[5])
        .map(|s| parse_rate_or_off(5, s).map(|r| scale.apply(r)))
        .collect::<Result<Vec<_>, _>>()?;

    let temps_fans = parse_temps_fans(fields[6])?;

    let pool = fields[7].to_string();

    let [invalid, switches, invalid2, switches2] = exact::<4>(8, fields[8])?;
    let invalid = parse_count_or_off(8, invalid)?;
    let switches = parse_count_or_off(8, switches)?;
    let invalid2 = parse_count_or_off(8, invalid2)?;
    let switches2 = parse_count_or_off(8, switches2)?;

    if rates.len() != rates2.len() || rates.len() != temps_fans.len() {
        return Err(DecodeError::DeviceCountMismatch {
            primary: rates.len(),
            secondary: rates2.len(),
            temps_fans: temps_fans.len(),
        });
    }

    let devices = rates
        .into_iter()
        .zip(rates2)
        .zip(temps_fans)
        .map(|((hashrate, secondary_hashrate), (temp, fan))| DeviceStat {
            hashrate,
            secondary_hashrate,
            temp,
            fan,
        })
        .collect();

    Ok(ClaymoreStats {
        version,
        uptime_minutes,
        scale,
        primary: PoolStat {
            pool: pool.clone(),
            pool_switches: switches,
            accepted,
            rejected,
            invalid,
            total_hashrate: scale.apply(total as f64),
        },
        secondary: PoolStat {
            pool,
            pool_switches: switches2,
            accepted: accepted2,
            rejected: rejected2,
            invalid: invalid2,
            total_hashrate: scale.apply(total2 as f64),
        },
        devices,
    })
}

fn rpc_error(err: &Value) -> DecodeError {
    let code = err
        .get("code")
        .map(|c| c.to_string())
        .unwrap_or_else(|| "error".to_string());
    let msg = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    DecodeError::ProtocolStatus { code, msg }
}

// "54;33; 58;35" - пробелы после `;` встречаются у реальных майнеров
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(';').map(str::trim)
}

fn exact<const N: usize>(idx: usize, raw: &str) -> Result<[&str; N], DecodeError> {
    let parts: Vec<&str> = split_list(raw).collect();
    let n = parts.len();
    parts.try_into().map_err(|_| {
        DecodeError::malformed(
            format!("result[{idx}]"),
            format!("expected {N} values, got {n}: {raw:?}"),
        )
    })
}

fn parse_int(idx: usize, s: &str) -> Result<i64, DecodeError> {
    s.parse()
        .map_err(|_| DecodeError::malformed(format!("result[{idx}]"), format!("not an integer: {s:?}")))
}

// счётчики и суммарный хешрейт: -1 допустим только как литерал `off`
fn parse_count(idx: usize, s: &str) -> Result<i64, DecodeError> {
    match parse_int(idx, s)? {
        v if v < 0 => Err(DecodeError::malformed(
            format!("result[{idx}]"),
            format!("negative value: {s:?}"),
        )),
        v => Ok(v),
    }
}

fn parse_count_or_off(idx: usize, s: &str) -> Result<i64, DecodeError> {
    if s == OFF {
        return Ok(DISABLED);
    }
    parse_count(idx, s)
}

fn parse_rate_or_off(idx: usize, s: &str) -> Result<f64, DecodeError> {
    if s == OFF {
        return Ok(DISABLED as f64);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(DecodeError::malformed(
            format!("result[{idx}]"),
            format!("not a hashrate: {s:?}"),
        )),
    }
}

fn parse_temps_fans(raw: &str) -> Result<Vec<(i64, i64)>, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::malformed("result[6]", "empty temperature/fan list"));
    }

    let values = split_list(raw)
        .map(|s| parse_int(6, s))
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() % 2 != 0 {
        return Err(DecodeError::malformed(
            "result[6]",
            format!("odd number of temperature/fan values: {}", values.len()),
        ));
    }

    Ok(values.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}
