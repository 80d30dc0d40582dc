//! Командный протокол SGMiner / TeamRedMiner.
//!
//! Ответ на любую команду:
//! `{"STATUS":[{"STATUS":"S","Msg":"...","When":1700000000}], "SUMMARY":[{...}]}`.
//! Поля именованные, поэтому парсим через serde.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::protocol::SgCommand;
use crate::wire::RawFrame;

/// Код статуса в конверте
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Info,
    Warning,
    Error,
    Fatal,
    Unknown(String),
}

impl StatusCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "S" => StatusCode::Success,
            "I" => StatusCode::Info,
            "W" => StatusCode::Warning,
            "E" => StatusCode::Error,
            "F" => StatusCode::Fatal,
            other => StatusCode::Unknown(other.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StatusCode::Error | StatusCode::Fatal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(rename = "STATUS")]
    pub code: String,
    #[serde(rename = "Msg", default)]
    pub msg: String,
    /// unix-время ответа
    #[serde(rename = "When", default)]
    pub when: i64,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Разобранный конверт: статус + всё остальное
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub status: StatusEntry,
    body: Map<String, Value>,
}

impl CommandResponse {
    /// Первый элемент массива под ключом `key`
    pub fn first<T: DeserializeOwned>(&self, key: &str) -> Result<T, DecodeError> {
        let item = self
            .array(key)?
            .first()
            .ok_or_else(|| DecodeError::malformed(key, "empty array"))?;
        from_value(key, item.clone())
    }

    /// Все элементы массива под ключом `key`
    pub fn all<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, DecodeError> {
        self.array(key)?
            .iter()
            .map(|item| from_value(key, item.clone()))
            .collect()
    }

    fn array(&self, key: &str) -> Result<&Vec<Value>, DecodeError> {
        self.body
            .get(key)
            .ok_or_else(|| DecodeError::missing(key))?
            .as_array()
            .ok_or_else(|| DecodeError::malformed(key, "expected array"))
    }
}

/// Разбирает конверт и проверяет статус.
///
/// `E`/`F` - ошибка с сообщением майнера. Любой другой код, кроме `S`,
/// только логируем: данные всё равно возвращаются.
pub fn decode_envelope(frame: &RawFrame) -> Result<CommandResponse, DecodeError> {
    let v = frame.json()?;
    let Value::Object(mut body) = v else {
        return Err(DecodeError::malformed("response", "expected object"));
    };

    let status_list = body
        .remove("STATUS")
        .ok_or_else(|| DecodeError::missing("STATUS"))?;
    let first = status_list
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .ok_or_else(|| DecodeError::malformed("STATUS", "expected non-empty array"))?;
    let status: StatusEntry = from_value("STATUS", first)?;

    match StatusCode::from_code(&status.code) {
        StatusCode::Success => debug!("status S: {}", status.msg),
        code if code.is_failure() => {
            return Err(DecodeError::ProtocolStatus {
                code: status.code,
                msg: status.msg,
            });
        }
        _ => warn!("unusual status flag received: {:?}", status),
    }

    Ok(CommandResponse { status, body })
}

#[derive(Debug, Deserialize)]
struct SummaryWire {
    #[serde(rename = "Elapsed")]
    elapsed: u64,
    #[serde(rename = "KHS av", default)]
    khs_av: Option<f64>,
    #[serde(rename = "MHS av", default)]
    mhs_av: Option<f64>,
    #[serde(rename = "Accepted")]
    accepted: i64,
    #[serde(rename = "Rejected")]
    rejected: i64,
    #[serde(rename = "Discarded")]
    discarded: i64,
    #[serde(rename = "Stale")]
    stale: i64,
}

/// Ответ `summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SummaryWire")]
pub struct Summary {
    /// секунды
    pub elapsed: u64,
    /// средний хешрейт, kH/s
    pub hashrate_khs: f64,
    pub accepted: i64,
    pub rejected: i64,
    pub discarded: i64,
    pub stale: i64,
}

impl TryFrom<SummaryWire> for Summary {
    type Error = String;

    fn try_from(w: SummaryWire) -> Result<Self, Self::Error> {
        Ok(Summary {
            elapsed: w.elapsed,
            hashrate_khs: average_khs(w.khs_av, w.mhs_av)?,
            accepted: w.accepted,
            rejected: w.rejected,
            discarded: w.discarded,
            stale: w.stale,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DevWire {
    #[serde(rename = "GPU")]
    gpu: u32,
    #[serde(rename = "KHS av", default)]
    khs_av: Option<f64>,
    #[serde(rename = "MHS av", default)]
    mhs_av: Option<f64>,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Fan Percent")]
    fan_percent: f64,
    #[serde(rename = "Status", default)]
    status: Option<String>,
}

/// Одно устройство из `devs` / `gpu`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DevWire")]
pub struct Dev {
    pub gpu: u32,
    /// kH/s
    pub hashrate_khs: f64,
    pub temperature: f64,
    pub fan_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TryFrom<DevWire> for Dev {
    type Error = String;

    fn try_from(w: DevWire) -> Result<Self, Self::Error> {
        Ok(Dev {
            gpu: w.gpu,
            hashrate_khs: average_khs(w.khs_av, w.mhs_av)?,
            temperature: w.temperature,
            fan_percent: w.fan_percent,
            status: w.status,
        })
    }
}

/// Всё, что нужно для unified-схемы: `summary` + `devs` + `version`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SgMinerStats {
    pub summary: Summary,
    pub devs: Vec<Dev>,
    pub version: String,
}

/// Ответ `version`. Ключ с именем майнера у форков разный.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionInfo(pub Map<String, Value>);

impl VersionInfo {
    const MINER_KEYS: [&'static str; 4] = ["Miner", "SGMiner", "TeamRedMiner", "CGMiner"];

    pub fn miner(&self) -> Result<&str, DecodeError> {
        Self::MINER_KEYS
            .iter()
            .find_map(|k| self.0.get(*k).and_then(Value::as_str))
            .ok_or_else(|| DecodeError::missing("VERSION.Miner"))
    }

    pub fn api(&self) -> Option<&str> {
        self.0.get("API").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Count {
    #[serde(rename = "Count")]
    count: u32,
}

pub fn decode_summary(frame: &RawFrame) -> Result<Summary, DecodeError> {
    decode_envelope(frame)?.first(SgCommand::Summary.response_key())
}

pub fn decode_devs(frame: &RawFrame) -> Result<Vec<Dev>, DecodeError> {
    decode_dev_list(frame, SgCommand::Devs)
}

pub fn decode_gpu(frame: &RawFrame, number: u32) -> Result<Vec<Dev>, DecodeError> {
    decode_dev_list(frame, SgCommand::Gpu(number))
}

pub fn decode_version(frame: &RawFrame) -> Result<VersionInfo, DecodeError> {
    let version: VersionInfo = decode_envelope(frame)?.first(SgCommand::Version.response_key())?;
    version.miner()?;
    Ok(version)
}

pub fn decode_config(frame: &RawFrame) -> Result<Map<String, Value>, DecodeError> {
    decode_envelope(frame)?.first(SgCommand::Config.response_key())
}

/// `gpucount` / `pgacount`
pub fn decode_count(frame: &RawFrame, cmd: SgCommand) -> Result<u32, DecodeError> {
    let c: Count = decode_envelope(frame)?.first(cmd.response_key())?;
    Ok(c.count)
}

/// `pga` - у PGA-устройств набор полей произвольный, отдаём как есть
pub fn decode_pga(frame: &RawFrame, number: u32) -> Result<Vec<Value>, DecodeError> {
    decode_envelope(frame)?.all(SgCommand::Pga(number).response_key())
}

fn decode_dev_list(frame: &RawFrame, cmd: SgCommand) -> Result<Vec<Dev>, DecodeError> {
    decode_envelope(frame)?.all(cmd.response_key())
}

fn average_khs(khs: Option<f64>, mhs: Option<f64>) -> Result<f64, String> {
    match (khs, mhs) {
        (Some(k), _) => Ok(k),
        (None, Some(m)) => Ok(m * 1000.0),
        (None, None) => Err("neither `KHS av` nor `MHS av` present".to_string()),
    }
}

fn from_value<T: DeserializeOwned>(key: &str, v: Value) -> Result<T, DecodeError> {
    serde_json::from_value(v).map_err(|e| DecodeError::malformed(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(status: &str, tail: &str) -> RawFrame {
        RawFrame::new(format!(
            r#"{{"STATUS":[{{"STATUS":"{status}","When":1528213457,"Code":11,"Msg":"Summary","Description":"sgminer 5.6.1"}}]{tail}}}"#
        ).into_bytes())
    }

    const SUMMARY: &str = r#","SUMMARY":[{"Elapsed":18360,"KHS av":31.5,"Accepted":120,"Rejected":3,"Discarded":7,"Stale":1}]"#;

    const DEVS: &str = r#","DEVS":[
        {"GPU":0,"Status":"Alive","Temperature":65.0,"Fan Percent":40,"KHS av":15.25},
        {"GPU":1,"Status":"Alive","Temperature":70.0,"Fan Percent":55,"KHS av":16.25}
    ]"#;

    #[test]
    fn decodes_summary_with_success_status() {
        let s = decode_summary(&frame("S", SUMMARY)).unwrap();
        assert_eq!(s.elapsed, 18360);
        assert_eq!(s.hashrate_khs, 31.5);
        assert_eq!(s.accepted, 120);
        assert_eq!(s.rejected, 3);
        assert_eq!(s.discarded, 7);
        assert_eq!(s.stale, 1);
    }

    #[test]
    fn trailing_nul_is_ignored() {
        let mut bytes = frame("S", SUMMARY).as_bytes().to_vec();
        bytes.push(0);
        assert!(decode_summary(&RawFrame::new(bytes)).is_ok());
    }

    #[test]
    fn decodes_all_devs_in_order() {
        let devs = decode_devs(&frame("S", DEVS)).unwrap();
        assert_eq!(devs.len(), 2);
        assert_eq!(devs[0].gpu, 0);
        assert_eq!(devs[1].hashrate_khs, 16.25);
        assert_eq!(devs[1].fan_percent, 55.0);
        assert_eq!(devs[0].status.as_deref(), Some("Alive"));
    }

    #[test]
    fn error_and_fatal_status_fail_with_vendor_message() {
        for code in ["E", "F"] {
            let f = RawFrame::new(format!(
                r#"{{"STATUS":[{{"STATUS":"{code}","When":1,"Code":14,"Msg":"Invalid command"}}],"id":1}}"#
            ).into_bytes());
            match decode_summary(&f) {
                Err(DecodeError::ProtocolStatus { code: c, msg }) => {
                    assert_eq!(c, code);
                    assert_eq!(msg, "Invalid command");
                }
                other => panic!("expected ProtocolStatus, got {other:?}"),
            }
        }
    }

    #[test]
    fn unusual_status_still_returns_payload() {
        let s = decode_summary(&frame("X", SUMMARY)).unwrap();
        assert_eq!(s.accepted, 120);

        let resp = decode_envelope(&frame("W", SUMMARY)).unwrap();
        assert_eq!(resp.status.code, "W");
    }

    #[test]
    fn missing_command_key_is_malformed() {
        let err = decode_summary(&frame("S", "")).unwrap_err();
        assert!(matches!(&err, DecodeError::MalformedField { field, .. } if field == "SUMMARY"));
    }

    #[test]
    fn missing_status_is_malformed() {
        let f = RawFrame::from(r#"{"SUMMARY":[]}"#);
        assert!(matches!(
            decode_envelope(&f),
            Err(DecodeError::MalformedField { .. })
        ));
    }

    #[test]
    fn mhs_is_accepted_when_khs_absent() {
        let f = frame(
            "S",
            r#","SUMMARY":[{"Elapsed":60,"MHS av":1.5,"Accepted":1,"Rejected":0,"Discarded":0,"Stale":0}]"#,
        );
        assert_eq!(decode_summary(&f).unwrap().hashrate_khs, 1500.0);
    }

    #[test]
    fn summary_without_any_hashrate_is_malformed() {
        let f = frame(
            "S",
            r#","SUMMARY":[{"Elapsed":60,"Accepted":1,"Rejected":0,"Discarded":0,"Stale":0}]"#,
        );
        assert!(matches!(
            decode_summary(&f),
            Err(DecodeError::MalformedField { .. })
        ));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let f = frame(
            "S",
            r#","SUMMARY":[{"Elapsed":"long","KHS av":1.0,"Accepted":1,"Rejected":0,"Discarded":0,"Stale":0}]"#,
        );
        assert!(matches!(
            decode_summary(&f),
            Err(DecodeError::MalformedField { .. })
        ));
    }

    #[test]
    fn version_finds_miner_name_across_forks() {
        let v = decode_version(&frame("S", r#","VERSION":[{"Miner":"TeamRedMiner 0.8.1","API":"3.7"}]"#))
            .unwrap();
        assert_eq!(v.miner().unwrap(), "TeamRedMiner 0.8.1");
        assert_eq!(v.api(), Some("3.7"));

        let v = decode_version(&frame("S", r#","VERSION":[{"SGMiner":"5.6.1","API":"3.1"}]"#)).unwrap();
        assert_eq!(v.miner().unwrap(), "5.6.1");

        assert!(decode_version(&frame("S", r#","VERSION":[{"API":"3.1"}]"#)).is_err());
    }

    #[test]
    fn counts_and_raw_payloads() {
        assert_eq!(
            decode_count(&frame("S", r#","GPUS":[{"Count":4}]"#), SgCommand::GpuCount).unwrap(),
            4
        );
        assert_eq!(
            decode_count(&frame("S", r#","PGAS":[{"Count":0}]"#), SgCommand::PgaCount).unwrap(),
            0
        );

        let pga = decode_pga(&frame("S", r#","PGA":[{"PGA":0,"Name":"ICA"}]"#), 0).unwrap();
        assert_eq!(pga[0]["Name"], "ICA");

        let cfg = decode_config(&frame("S", r#","CONFIG":[{"GPU Count":2,"Strategy":"Failover"}]"#)).unwrap();
        assert_eq!(cfg["GPU Count"], 2);
    }

    #[test]
    fn gpu_command_uses_gpu_key() {
        let f = frame(
            "S",
            r#","GPU":[{"GPU":1,"Temperature":70.0,"Fan Percent":55,"KHS av":16.25}]"#,
        );
        let devs = decode_gpu(&f, 1).unwrap();
        assert_eq!(devs[0].gpu, 1);
    }
}
