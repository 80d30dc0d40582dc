use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::RigSpecError;

/// Методы JSON-RPC Claymore / Ethminer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    /// статистика "старого" поколения (kH/s делим на 1000)
    GetStat1,
    /// статистика "нового" поколения (kH/s умножаем на 1000)
    GetStats1,
    GetStatDetail,
    GetStatHr,
    Restart,
    Reboot,
    Ping,
    Authorize,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::GetStat1 => "miner_getstat1",
            RpcMethod::GetStats1 => "miner_getstats1",
            RpcMethod::GetStatDetail => "miner_getstatdetail",
            RpcMethod::GetStatHr => "miner_getstathr",
            RpcMethod::Restart => "miner_restart",
            RpcMethod::Reboot => "miner_reboot",
            RpcMethod::Ping => "miner_ping",
            RpcMethod::Authorize => "api_authorize",
        }
    }

    /// Возвращает ли метод позиционный массив статистики
    pub fn is_stat_query(&self) -> bool {
        matches!(self, RpcMethod::GetStat1 | RpcMethod::GetStats1)
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcMethod {
    type Err = RigSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let m = match s {
            "miner_getstat1" => RpcMethod::GetStat1,
            "miner_getstats1" => RpcMethod::GetStats1,
            "miner_getstatdetail" => RpcMethod::GetStatDetail,
            "miner_getstathr" => RpcMethod::GetStatHr,
            "miner_restart" => RpcMethod::Restart,
            "miner_reboot" => RpcMethod::Reboot,
            "miner_ping" => RpcMethod::Ping,
            "api_authorize" => RpcMethod::Authorize,
            other => {
                return Err(RigSpecError::InvalidValue {
                    key: "method".into(),
                    value: other.into(),
                });
            }
        };
        Ok(m)
    }
}

/// Формирует строку запроса:
/// `{"id":0,"jsonrpc":"2.0","method":"miner_getstat1"}\n`
pub fn format_rpc_request_line(method: RpcMethod, password: Option<&str>) -> String {
    let mut req = json!({
        "id": 0,
        "jsonrpc": "2.0",
        "method": method.as_str(),
    });

    if let Some(psw) = password {
        req["params"] = json!({ "psw": psw });
    }

    format!("{req}\n")
}

/// Команды SGMiner / TeamRedMiner API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SgCommand {
    Summary,
    Devs,
    Version,
    Config,
    Gpu(u32),
    GpuCount,
    Pga(u32),
    PgaCount,
}

impl SgCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SgCommand::Summary => "summary",
            SgCommand::Devs => "devs",
            SgCommand::Version => "version",
            SgCommand::Config => "config",
            SgCommand::Gpu(_) => "gpu",
            SgCommand::GpuCount => "gpucount",
            SgCommand::Pga(_) => "pga",
            SgCommand::PgaCount => "pgacount",
        }
    }

    /// Ключ, под которым майнер кладёт ответ на команду
    pub fn response_key(&self) -> &'static str {
        match self {
            SgCommand::Summary => "SUMMARY",
            SgCommand::Devs => "DEVS",
            SgCommand::Version => "VERSION",
            SgCommand::Config => "CONFIG",
            SgCommand::Gpu(_) => "GPU",
            SgCommand::GpuCount => "GPUS",
            SgCommand::Pga(_) => "PGA",
            SgCommand::PgaCount => "PGAS",
        }
    }

    fn parameter(&self) -> Option<u32> {
        match self {
            SgCommand::Gpu(n) | SgCommand::Pga(n) => Some(*n),
            _ => None,
        }
    }
}

/// Формирует строку команды:
/// `{"command":"gpu","parameter":0}\n`
pub fn format_command_line(cmd: SgCommand) -> String {
    let mut req = json!({ "command": cmd.name() });

    if let Some(p) = cmd.parameter() {
        req["parameter"] = Value::from(p);
    }

    format!("{req}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_request_without_password() {
        let line = format_rpc_request_line(RpcMethod::GetStat1, None);
        assert_eq!(
            line,
            "{\"id\":0,\"jsonrpc\":\"2.0\",\"method\":\"miner_getstat1\"}\n"
        );
    }

    #[test]
    fn rpc_request_with_password_adds_params() {
        let line = format_rpc_request_line(RpcMethod::Restart, Some("secret"));
        assert!(line.ends_with('\n'));

        let v: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(v["method"], "miner_restart");
        assert_eq!(v["params"]["psw"], "secret");
    }

    #[test]
    fn rpc_method_parses_back_from_wire_name() {
        for m in [
            RpcMethod::GetStat1,
            RpcMethod::GetStats1,
            RpcMethod::GetStatDetail,
            RpcMethod::GetStatHr,
            RpcMethod::Restart,
            RpcMethod::Reboot,
            RpcMethod::Ping,
            RpcMethod::Authorize,
        ] {
            assert_eq!(m.as_str().parse::<RpcMethod>().unwrap(), m);
        }
        assert!("miner_dance".parse::<RpcMethod>().is_err());
    }

    #[test]
    fn command_line_without_parameter() {
        assert_eq!(
            format_command_line(SgCommand::Summary),
            "{\"command\":\"summary\"}\n"
        );
    }

    #[test]
    fn command_line_with_parameter() {
        assert_eq!(
            format_command_line(SgCommand::Gpu(2)),
            "{\"command\":\"gpu\",\"parameter\":2}\n"
        );
        assert_eq!(SgCommand::Gpu(2).response_key(), "GPU");
        assert_eq!(SgCommand::PgaCount.response_key(), "PGAS");
    }
}
