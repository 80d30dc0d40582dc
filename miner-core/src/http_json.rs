//! HTTP JSON API XMRStak (`GET /api.json`) и XMRig (`GET /1/summary`).
//!
//! Хешрейт там уже в H/s и лежит во вложенных массивах скользящих средних:
//! `hashrate.total[0]` и `hashrate.threads[i][0]` (окно 10 с).
//! Аптайм приходит в секундах.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::wire::RawFrame;

#[derive(Debug, Deserialize)]
struct HashrateBlock {
    total: Vec<Option<f64>>,
    threads: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct Results {
    shares_good: i64,
    shares_total: i64,
}

#[derive(Debug, Deserialize)]
struct Connection {
    pool: String,
    uptime: u64,
}

#[derive(Debug, Deserialize)]
struct XmrStakApi {
    version: String,
    hashrate: HashrateBlock,
    results: Results,
    connection: Connection,
}

#[derive(Debug, Deserialize)]
struct XmrigApi {
    version: String,
    algo: String,
    uptime: u64,
    hashrate: HashrateBlock,
    results: Results,
}

/// Ответ XMRStak `/api.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmrStakStats {
    pub version: String,
    pub uptime_minutes: u64,
    pub pool: String,
    /// H/s
    pub total_hashrate: f64,
    pub accepted: i64,
    pub rejected: i64,
    /// у XMRStak это копия rejected
    pub invalid: i64,
    /// H/s по потокам
    pub threads: Vec<f64>,
}

/// Ответ XMRig `/1/summary`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmrigSummary {
    pub version: String,
    pub algo: String,
    pub uptime_minutes: u64,
    /// H/s
    pub total_hashrate: f64,
    pub accepted: i64,
    pub rejected: i64,
    pub threads: Vec<f64>,
}

pub fn decode_xmrstak(frame: &RawFrame) -> Result<XmrStakStats, DecodeError> {
    let api: XmrStakApi = parse_body(frame)?;
    let (total_hashrate, threads) = hashrates(&api.hashrate)?;
    let rejected = rejected_shares(&api.results)?;

    Ok(XmrStakStats {
        version: api.version,
        uptime_minutes: api.connection.uptime / 60,
        pool: api.connection.pool,
        total_hashrate,
        accepted: api.results.shares_good,
        rejected,
        invalid: rejected,
        threads,
    })
}

pub fn decode_xmrig_summary(frame: &RawFrame) -> Result<XmrigSummary, DecodeError> {
    let api: XmrigApi = parse_body(frame)?;
    let (total_hashrate, threads) = hashrates(&api.hashrate)?;
    let rejected = rejected_shares(&api.results)?;

    Ok(XmrigSummary {
        version: api.version,
        algo: api.algo,
        uptime_minutes: api.uptime / 60,
        total_hashrate,
        accepted: api.results.shares_good,
        rejected,
        threads,
    })
}

fn parse_body<T: DeserializeOwned>(frame: &RawFrame) -> Result<T, DecodeError> {
    let v = frame.json()?;
    serde_json::from_value(v).map_err(|e| DecodeError::malformed("body", e.to_string()))
}

fn hashrates(block: &HashrateBlock) -> Result<(f64, Vec<f64>), DecodeError> {
    let total = first_sample("hashrate.total", &block.total)?;
    let threads = block
        .threads
        .iter()
        .enumerate()
        .map(|(i, t)| first_sample(&format!("hashrate.threads[{i}]"), t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((total, threads))
}

// null = окно усреднения ещё не набралось; нулём это не считаем
fn first_sample(path: &str, samples: &[Option<f64>]) -> Result<f64, DecodeError> {
    match samples.first() {
        None => Err(DecodeError::malformed(path, "empty")),
        Some(None) => Err(DecodeError::malformed(path, "sample not yet available (null)")),
        Some(Some(v)) => Ok(*v),
    }
}

fn rejected_shares(r: &Results) -> Result<i64, DecodeError> {
    if r.shares_total < r.shares_good {
        return Err(DecodeError::malformed(
            "results",
            format!(
                "shares_total ({}) is less than shares_good ({})",
                r.shares_total, r.shares_good
            ),
        ));
    }
    Ok(r.shares_total - r.shares_good)
}
