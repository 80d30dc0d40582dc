//! Клиенты конкретных майнеров и общий фасад [`MinerClient`].
//!
//! Каждый опрос: соединение → запрос → ответ → декодер → закрытие.
//! Кэша нет, каждый вызов ходит к майнеру заново.

use std::time::Duration;

use log::debug;
use miner_core::command::{self, Dev, SgMinerStats, VersionInfo};
use miner_core::http_json::{self, XmrStakStats, XmrigSummary};
use miner_core::positional::{self, ClaymoreStats};
use miner_core::protocol::{RpcMethod, SgCommand, format_command_line, format_rpc_request_line};
use miner_core::{
    CoinSelect, ProtocolKind, REQUEST_TIMEOUT, RawFrame, RigSpec, ScaleConvention, UnifiedStats,
    VendorRecord,
};
use serde_json::{Map, Value};

use crate::error::PollError;
use crate::http::HttpJsonClient;
use crate::transport::{Connector, Deadline, TcpConnector};
use crate::wire::WireClient;

/// Монеты Claymore по умолчанию
pub const DEFAULT_PRIMARY_COIN: &str = "ETH";
pub const DEFAULT_SECONDARY_COIN: &str = "DCR";
/// SGMiner не сообщает, что он майнит
pub const DEFAULT_SGMINER_COIN: &str = "Unknown";
pub const DEFAULT_XMRSTAK_COIN: &str = "cryptonight";

/// Claymore / Ethminer: позиционный JSON-RPC по TCP
#[derive(Debug, Clone)]
pub struct ClaymoreClient<C = TcpConnector> {
    wire: WireClient<C>,
    method: RpcMethod,
    scale: ScaleConvention,
    password: Option<String>,
    primary_coin: String,
    secondary_coin: String,
}

impl<C: Connector> ClaymoreClient<C> {
    /// `miner_getstats1` + [`ScaleConvention::Modern`]
    pub fn new(wire: WireClient<C>) -> Self {
        Self {
            wire,
            method: RpcMethod::GetStats1,
            scale: ScaleConvention::Modern,
            password: None,
            primary_coin: DEFAULT_PRIMARY_COIN.to_string(),
            secondary_coin: DEFAULT_SECONDARY_COIN.to_string(),
        }
    }

    /// Метод статистики; масштаб подстраивается под поколение метода
    pub fn with_method(mut self, method: RpcMethod) -> Self {
        self.method = method;
        self.scale = ScaleConvention::for_method(method);
        self
    }

    /// Явный масштаб (для форков, которые отвечают не по своему поколению)
    pub fn with_scale(mut self, scale: ScaleConvention) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_coins(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.primary_coin = primary.into();
        self.secondary_coin = secondary.into();
        self
    }

    pub fn method(&self) -> RpcMethod {
        self.method
    }

    pub fn scale(&self) -> ScaleConvention {
        self.scale
    }

    fn request(&self, method: RpcMethod) -> String {
        format_rpc_request_line(method, self.password.as_deref())
    }

    fn call(&self, method: RpcMethod, deadline: &Deadline) -> Result<RawFrame, PollError> {
        self.wire.send(self.request(method).as_bytes(), deadline)
    }

    pub fn stats(&self, deadline: &Deadline) -> Result<ClaymoreStats, PollError> {
        let frame = self.call(self.method, deadline)?;
        Ok(positional::decode_frame(&frame, self.scale)?)
    }

    pub fn formatted_stats(&self, deadline: &Deadline) -> Result<VendorRecord, PollError> {
        Ok(VendorRecord::Claymore {
            primary_coin: self.primary_coin.clone(),
            secondary_coin: self.secondary_coin.clone(),
            stats: self.stats(deadline)?,
        })
    }

    /// `miner_ping`: `true`, если майнер ответил `"pong"`
    pub fn ping(&self, deadline: &Deadline) -> Result<bool, PollError> {
        let frame = self.call(RpcMethod::Ping, deadline)?;
        let reply = positional::decode_reply(&frame)?;
        Ok(reply.as_str() == Some("pong"))
    }

    /// `miner_getstatdetail` как есть
    pub fn stat_detail(&self, deadline: &Deadline) -> Result<Value, PollError> {
        let frame = self.call(RpcMethod::GetStatDetail, deadline)?;
        Ok(positional::decode_reply(&frame)?)
    }

    /// Перезапуск майнера. Майнер не отвечает, поэтому ответ не ждём.
    pub fn restart(&self, deadline: &Deadline) -> Result<(), PollError> {
        self.wire.send_only(self.request(RpcMethod::Restart).as_bytes(), deadline)
    }

    /// Перезагрузка рига (`reboot.bat` / `reboot.sh` на стороне майнера)
    pub fn reboot(&self, deadline: &Deadline) -> Result<(), PollError> {
        self.wire.send_only(self.request(RpcMethod::Reboot).as_bytes(), deadline)
    }
}

/// SGMiner / TeamRedMiner: командный протокол по TCP
#[derive(Debug, Clone)]
pub struct SgMinerClient<C = TcpConnector> {
    wire: WireClient<C>,
    coin: String,
}

impl<C: Connector> SgMinerClient<C> {
    pub fn new(wire: WireClient<C>) -> Self {
        Self {
            wire,
            coin: DEFAULT_SGMINER_COIN.to_string(),
        }
    }

    pub fn with_coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = coin.into();
        self
    }

    /// Одна команда = одно соединение
    pub fn command(&self, cmd: SgCommand, deadline: &Deadline) -> Result<RawFrame, PollError> {
        self.wire.send(format_command_line(cmd).as_bytes(), deadline)
    }

    pub fn summary(&self, deadline: &Deadline) -> Result<command::Summary, PollError> {
        Ok(command::decode_summary(&self.command(SgCommand::Summary, deadline)?)?)
    }

    pub fn devs(&self, deadline: &Deadline) -> Result<Vec<Dev>, PollError> {
        Ok(command::decode_devs(&self.command(SgCommand::Devs, deadline)?)?)
    }

    pub fn version(&self, deadline: &Deadline) -> Result<VersionInfo, PollError> {
        Ok(command::decode_version(&self.command(SgCommand::Version, deadline)?)?)
    }

    pub fn config(&self, deadline: &Deadline) -> Result<Map<String, Value>, PollError> {
        Ok(command::decode_config(&self.command(SgCommand::Config, deadline)?)?)
    }

    pub fn gpu(&self, number: u32, deadline: &Deadline) -> Result<Vec<Dev>, PollError> {
        let frame = self.command(SgCommand::Gpu(number), deadline)?;
        Ok(command::decode_gpu(&frame, number)?)
    }

    pub fn gpucount(&self, deadline: &Deadline) -> Result<u32, PollError> {
        let frame = self.command(SgCommand::GpuCount, deadline)?;
        Ok(command::decode_count(&frame, SgCommand::GpuCount)?)
    }

    pub fn pga(&self, number: u32, deadline: &Deadline) -> Result<Vec<Value>, PollError> {
        let frame = self.command(SgCommand::Pga(number), deadline)?;
        Ok(command::decode_pga(&frame, number)?)
    }

    pub fn pgacount(&self, deadline: &Deadline) -> Result<u32, PollError> {
        let frame = self.command(SgCommand::PgaCount, deadline)?;
        Ok(command::decode_count(&frame, SgCommand::PgaCount)?)
    }

    /// `summary` + `devs` + `version`: три отдельных соединения
    pub fn stats(&self, deadline: &Deadline) -> Result<SgMinerStats, PollError> {
        let summary = self.summary(deadline)?;
        let devs = self.devs(deadline)?;
        let version = self.version(deadline)?;

        Ok(SgMinerStats {
            summary,
            devs,
            version: version.miner()?.to_string(),
        })
    }

    pub fn formatted_stats(&self, deadline: &Deadline) -> Result<VendorRecord, PollError> {
        Ok(VendorRecord::SgMiner {
            coin: self.coin.clone(),
            stats: self.stats(deadline)?,
        })
    }
}

/// XMRStak: `GET /api.json`
#[derive(Debug, Clone)]
pub struct XmrStakClient {
    http: HttpJsonClient,
    coin: String,
}

impl XmrStakClient {
    pub fn new(http: HttpJsonClient) -> Self {
        Self {
            http,
            coin: DEFAULT_XMRSTAK_COIN.to_string(),
        }
    }

    pub fn with_coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = coin.into();
        self
    }

    pub fn stats(&self, deadline: &Deadline) -> Result<XmrStakStats, PollError> {
        let frame = self.http.get("/api.json", deadline)?;
        Ok(http_json::decode_xmrstak(&frame)?)
    }

    pub fn formatted_stats(&self, deadline: &Deadline) -> Result<VendorRecord, PollError> {
        Ok(VendorRecord::XmrStak {
            coin: self.coin.clone(),
            stats: self.stats(deadline)?,
        })
    }
}

/// XMRig HTTP API v1
#[derive(Debug, Clone)]
pub struct XmrigClient {
    http: HttpJsonClient,
}

impl XmrigClient {
    pub fn new(http: HttpJsonClient) -> Self {
        Self { http }
    }

    pub fn summary(&self, deadline: &Deadline) -> Result<XmrigSummary, PollError> {
        let frame = self.http.get("/1/summary", deadline)?;
        Ok(http_json::decode_xmrig_summary(&frame)?)
    }

    pub fn threads(&self, deadline: &Deadline) -> Result<Value, PollError> {
        Ok(self.http.get("/1/threads", deadline)?.json()?)
    }

    /// `GET /1/config`, нужен токен
    pub fn config(&self, deadline: &Deadline) -> Result<Value, PollError> {
        self.require_token("GET /1/config")?;
        Ok(self.http.get("/1/config", deadline)?.json()?)
    }

    /// `PUT /1/config`, нужен токен
    pub fn put_config(&self, config: &Value, deadline: &Deadline) -> Result<(), PollError> {
        self.require_token("PUT /1/config")?;
        self.http.put_json("/1/config", config, deadline)?;
        Ok(())
    }

    pub fn formatted_stats(&self, deadline: &Deadline) -> Result<VendorRecord, PollError> {
        Ok(VendorRecord::Xmrig {
            stats: self.summary(deadline)?,
        })
    }

    fn require_token(&self, operation: &'static str) -> Result<(), PollError> {
        if self.http.has_token() {
            Ok(())
        } else {
            Err(PollError::TokenRequired(operation))
        }
    }
}

/// Конкретный клиент за [`MinerClient`]
#[derive(Debug, Clone)]
pub enum Backend {
    Claymore(ClaymoreClient),
    SgMiner(SgMinerClient),
    XmrStak(XmrStakClient),
    Xmrig(XmrigClient),
}

/// Клиент одного рига, выбирает бэкенд по протоколу
#[derive(Debug, Clone)]
pub struct MinerClient {
    rig: RigSpec,
    backend: Backend,
    timeout: Duration,
}

impl MinerClient {
    pub fn new(rig: RigSpec) -> Result<Self, PollError> {
        let backend = match rig.protocol {
            ProtocolKind::Claymore => {
                let mut client = ClaymoreClient::new(WireClient::tcp(rig.address()))
                    .with_password(rig.password.clone());
                if let Some(method) = rig.method {
                    client = client.with_method(method);
                }
                if let Some(coin) = &rig.coin {
                    client = client.with_coins(coin.clone(), DEFAULT_SECONDARY_COIN);
                }
                Backend::Claymore(client)
            }
            ProtocolKind::SgMiner | ProtocolKind::TeamRedMiner => {
                let client = SgMinerClient::new(WireClient::tcp(rig.address()));
                Backend::SgMiner(match &rig.coin {
                    Some(coin) => client.with_coin(coin.clone()),
                    None => client,
                })
            }
            ProtocolKind::XmrStak => {
                let client = XmrStakClient::new(http_client(&rig)?);
                Backend::XmrStak(match &rig.coin {
                    Some(coin) => client.with_coin(coin.clone()),
                    None => client,
                })
            }
            ProtocolKind::Xmrig => Backend::Xmrig(XmrigClient::new(http_client(&rig)?)),
        };

        Ok(Self {
            rig,
            backend,
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Срок одного опроса по умолчанию
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rig(&self) -> &RigSpec {
        &self.rig
    }

    /// Доступ к командам конкретного майнера (restart, config, ...)
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    pub fn formatted_stats(&self) -> Result<VendorRecord, PollError> {
        self.formatted_stats_until(&self.deadline())
    }

    pub fn formatted_stats_until(&self, deadline: &Deadline) -> Result<VendorRecord, PollError> {
        let record = match &self.backend {
            Backend::Claymore(c) => c.formatted_stats(deadline),
            Backend::SgMiner(c) => c.formatted_stats(deadline),
            Backend::XmrStak(c) => c.formatted_stats(deadline),
            Backend::Xmrig(c) => c.formatted_stats(deadline),
        };

        if let Err(e) = &record {
            debug!("{}: poll failed: {e}", self.rig);
        }
        record
    }

    pub fn unified_stats(&self, coin: CoinSelect) -> Result<UnifiedStats, PollError> {
        self.unified_stats_until(coin, &self.deadline())
    }

    pub fn unified_stats_until(&self, coin: CoinSelect, deadline: &Deadline) -> Result<UnifiedStats, PollError> {
        let record = self.formatted_stats_until(deadline)?;
        Ok(record.normalize(coin))
    }

    /// Unified-статистика для монеты из конфигурации рига
    pub fn poll(&self) -> Result<UnifiedStats, PollError> {
        self.poll_until(&self.deadline())
    }

    pub fn poll_until(&self, deadline: &Deadline) -> Result<UnifiedStats, PollError> {
        self.unified_stats_until(self.rig.coin_select, deadline)
    }
}

fn http_client(rig: &RigSpec) -> Result<HttpJsonClient, PollError> {
    let base = format!("http://{}", rig.address());
    Ok(HttpJsonClient::new(base, rig.token.clone())?)
}
