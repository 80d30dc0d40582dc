use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{RigListError, RigSpecError};
use crate::protocol::RpcMethod;
use crate::types::CoinSelect;

/// Протокол статистики рига
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// Claymore / Ethminer, позиционный JSON-RPC по TCP
    Claymore,
    SgMiner,
    TeamRedMiner,
    XmrStak,
    Xmrig,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Claymore => "claymore",
            ProtocolKind::SgMiner => "sgminer",
            ProtocolKind::TeamRedMiner => "teamredminer",
            ProtocolKind::XmrStak => "xmrstak",
            ProtocolKind::Xmrig => "xmrig",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = RigSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claymore" | "ethminer" => Ok(ProtocolKind::Claymore),
            "sgminer" => Ok(ProtocolKind::SgMiner),
            "teamredminer" | "trm" => Ok(ProtocolKind::TeamRedMiner),
            "xmrstak" | "xmr-stak" => Ok(ProtocolKind::XmrStak),
            "xmrig" => Ok(ProtocolKind::Xmrig),
            _ => Err(RigSpecError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Один риг: протокол, адрес и опции
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigSpec {
    pub protocol: ProtocolKind,
    pub host: String,
    pub port: u16,
    /// пароль Claymore API (`params.psw`)
    pub password: Option<String>,
    /// Bearer-токен XMRig
    pub token: Option<String>,
    /// имя монеты для unified-схемы
    pub coin: Option<String>,
    pub coin_select: CoinSelect,
    /// метод статистики Claymore
    pub method: Option<RpcMethod>,
}

impl RigSpec {
    pub fn new(protocol: ProtocolKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            password: None,
            token: None,
            coin: None,
            coin_select: CoinSelect::Primary,
            method: None,
        }
    }

    /// "HOST:PORT"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// секреты в логи не пишем
impl fmt::Display for RigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.address())
    }
}

impl FromStr for RigSpec {
    type Err = RigSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rig_line(s)
    }
}

/// Парсит строку вида:
/// "claymore 10.0.0.5:3333 password=secret secondary=true"
pub fn parse_rig_line(line: &str) -> Result<RigSpec, RigSpecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(RigSpecError::Empty);
    }

    let mut parts = line.split_whitespace();
    let protocol: ProtocolKind = parts.next().ok_or(RigSpecError::Empty)?.parse()?;
    let addr = parts.next().ok_or(RigSpecError::MissingAddress)?;
    let (host, port) = parse_address(addr)?;

    let mut rig = RigSpec::new(protocol, host, port);

    for opt in parts {
        let (key, value) = opt
            .split_once('=')
            .ok_or_else(|| RigSpecError::BadOption(opt.to_string()))?;

        if !option_applies(protocol, key) {
            return Err(invalid(key, value));
        }

        match key {
            "password" => rig.password = Some(value.to_string()),
            "token" => rig.token = Some(value.to_string()),
            "coin" => rig.coin = Some(value.to_string()),
            "secondary" => {
                rig.coin_select = match value {
                    "true" | "yes" | "1" => CoinSelect::Secondary,
                    "false" | "no" | "0" => CoinSelect::Primary,
                    _ => return Err(invalid(key, value)),
                }
            }
            "method" => {
                let method: RpcMethod = value.parse()?;
                if !method.is_stat_query() {
                    return Err(invalid(key, value));
                }
                rig.method = Some(method);
            }
            other => return Err(RigSpecError::UnknownOption(other.to_string())),
        }
    }

    Ok(rig)
}

// опции, которые протокол действительно использует
fn option_applies(protocol: ProtocolKind, key: &str) -> bool {
    match key {
        "password" | "method" => protocol == ProtocolKind::Claymore,
        "token" => matches!(protocol, ProtocolKind::XmrStak | ProtocolKind::Xmrig),
        "coin" => protocol != ProtocolKind::Xmrig,
        _ => true,
    }
}

fn parse_address(addr: &str) -> Result<(&str, u16), RigSpecError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| RigSpecError::BadAddress(addr.to_string()))?;
    if host.is_empty() {
        return Err(RigSpecError::BadAddress(addr.to_string()));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| RigSpecError::BadAddress(addr.to_string()))?;
    Ok((host, port))
}

fn invalid(key: &str, value: &str) -> RigSpecError {
    RigSpecError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Чтение списка ригов, по одному на строку
pub fn read_rigs<R: io::Read>(reader: R) -> Result<Vec<RigSpec>, RigListError> {
    let mut rigs = Vec::new();
    let buf = BufReader::new(reader);

    for (i, line) in buf.lines().enumerate() {
        let line = line?;
        if let Some(l) = normalize_line(&line) {
            let rig = parse_rig_line(l).map_err(|source| RigListError::Line { line: i + 1, source })?;
            rigs.push(rig);
        }
    }

    Ok(rigs)
}

/// Чтение списка ригов из файла
pub fn read_rigs_from_path(path: impl AsRef<Path>) -> Result<Vec<RigSpec>, RigListError> {
    let f = File::open(path)?;
    read_rigs(f)
}

fn normalize_line(line: &str) -> Option<&str> {
    // Поддержка inline-комментариев: "xmrig host:80 # comment"
    let s = line.split('#').next().unwrap_or("").trim();
    if s.is_empty() {
        return None;
    }
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn parses_minimal_line() {
        let rig = parse_rig_line("claymore 10.0.0.5:3333").unwrap();
        assert_eq!(rig.protocol, ProtocolKind::Claymore);
        assert_eq!(rig.host, "10.0.0.5");
        assert_eq!(rig.port, 3333);
        assert_eq!(rig.coin_select, CoinSelect::Primary);
        assert_eq!(rig.address(), "10.0.0.5:3333");
    }

    #[test]
    fn parses_options() {
        let rig = parse_rig_line(
            "  ethminer rig1.lan:3333 password=pw secondary=true coin=ETC method=miner_getstat1 ",
        )
        .unwrap();
        assert_eq!(rig.protocol, ProtocolKind::Claymore);
        assert_eq!(rig.password.as_deref(), Some("pw"));
        assert_eq!(rig.coin.as_deref(), Some("ETC"));
        assert_eq!(rig.coin_select, CoinSelect::Secondary);
        assert_eq!(rig.method, Some(RpcMethod::GetStat1));

        let rig = parse_rig_line("xmrig 127.0.0.1:8080 token=abc").unwrap();
        assert_eq!(rig.token.as_deref(), Some("abc"));
    }

    #[test]
    fn protocol_aliases() {
        assert_eq!("TRM".parse::<ProtocolKind>().unwrap(), ProtocolKind::TeamRedMiner);
        assert_eq!("xmr-stak".parse::<ProtocolKind>().unwrap(), ProtocolKind::XmrStak);
        assert_eq!("SGMiner".parse::<ProtocolKind>().unwrap(), ProtocolKind::SgMiner);
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(parse_rig_line("   "), Err(RigSpecError::Empty));
        assert_eq!(parse_rig_line("claymore"), Err(RigSpecError::MissingAddress));
        assert_eq!(
            parse_rig_line("antminer 1.2.3.4:4028"),
            Err(RigSpecError::UnknownProtocol("antminer".into()))
        );
        assert_eq!(
            parse_rig_line("xmrig localhost"),
            Err(RigSpecError::BadAddress("localhost".into()))
        );
        assert_eq!(
            parse_rig_line("xmrig localhost:0"),
            Err(RigSpecError::BadAddress("localhost:0".into()))
        );
        assert_eq!(
            parse_rig_line("xmrig :80"),
            Err(RigSpecError::BadAddress(":80".into()))
        );
        assert_eq!(
            parse_rig_line("xmrig h:80 token"),
            Err(RigSpecError::BadOption("token".into()))
        );
        assert_eq!(
            parse_rig_line("xmrig h:80 color=red"),
            Err(RigSpecError::UnknownOption("color".into()))
        );
        assert!(matches!(
            parse_rig_line("claymore h:1 method=miner_reboot"),
            Err(RigSpecError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_rig_line("claymore h:1 secondary=maybe"),
            Err(RigSpecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_options_foreign_to_protocol() {
        for line in [
            "xmrig h:80 method=miner_getstats1",
            "sgminer h:4028 password=pw",
            "claymore h:3333 token=abc",
            "teamredminer h:4028 token=abc",
            "xmrig h:80 coin=XMR",
        ] {
            let key = line.split_whitespace().nth(2).and_then(|o| o.split_once('=')).unwrap().0;
            assert!(
                matches!(parse_rig_line(line), Err(RigSpecError::InvalidValue { key: k, .. }) if k == key),
                "{line}"
            );
        }

        assert!(parse_rig_line("xmr-stak h:80 token=abc coin=AEON").is_ok());
        assert!(parse_rig_line("sgminer h:4028 coin=LBC secondary=true").is_ok());
    }

    #[test]
    fn display_hides_secrets() {
        let rig = parse_rig_line("claymore h:3333 password=topsecret").unwrap();
        assert_eq!(rig.to_string(), "claymore h:3333");
    }

    #[test]
    fn read_rigs_skips_blank_lines_and_comments() {
        let input = "\
# rigs
claymore 10.0.0.5:3333   # garage

  sgminer 10.0.0.6:4028
#xmrig 10.0.0.7:80
";
        let rigs = read_rigs(Cursor::new(input)).unwrap();
        assert_eq!(rigs.len(), 2);
        assert_eq!(rigs[1].protocol, ProtocolKind::SgMiner);
    }

    #[test]
    fn read_rigs_reports_line_number() {
        let input = "claymore 10.0.0.5:3333\n\nbogus 1.1.1.1:1\n";
        match read_rigs(Cursor::new(input)).unwrap_err() {
            RigListError::Line { line, source } => {
                assert_eq!(line, 3);
                assert_eq!(source, RigSpecError::UnknownProtocol("bogus".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn read_rigs_propagates_read_error() {
        struct FailingReader;

        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("boom"))
            }
        }

        let err = read_rigs(FailingReader).unwrap_err();
        assert!(matches!(err, RigListError::Io(_)));
        assert!(err.to_string().contains("boom"));
    }
}
