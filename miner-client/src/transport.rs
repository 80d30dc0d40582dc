//! Минимальный транспортный слой: открыть соединение, писать, читать, закрыть.
//!
//! Все операции выполняются под [`Deadline`]: абсолютный срок + флаг отмены.
//! Сокетные таймауты короткие ([`TICK`]), между тиками проверяем срок и флаг,
//! поэтому зависший майнер не держит опрос дольше срока, а Ctrl+C прерывает
//! даже висящее чтение.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::TransportError;

/// Период проверки срока/отмены во время блокирующих операций
pub const TICK: Duration = Duration::from_millis(200);

/// Флаг отмены, общий для нескольких опросов
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Обёртка над уже существующим флагом (например, shutdown по Ctrl+C)
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Срок одного опроса
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    cancel: CancelToken,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self::with_cancel(timeout, CancelToken::new())
    }

    pub fn with_cancel(timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            at: Instant::now() + timeout,
            cancel,
        }
    }

    /// Оставшееся время; ошибка, если срок вышел или опрос отменён
    pub fn remaining(&self) -> Result<Duration, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        match self.at.checked_duration_since(Instant::now()) {
            Some(d) if !d.is_zero() => Ok(d),
            _ => Err(TransportError::DeadlineExceeded),
        }
    }

    /// Таймаут для следующей блокирующей операции: не больше [`TICK`]
    pub fn tick(&self) -> Result<Duration, TransportError> {
        self.remaining().map(|d| d.min(TICK))
    }
}

/// Открытое соединение с майнером
pub trait Connection {
    /// Таймаут следующих read/write
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Закрывает соединение. Повторный вызов безопасен.
    fn close(&mut self);
}

/// Открывает новые соединения
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, deadline: &Deadline) -> Result<Self::Conn, TransportError>;

    /// Куда подключаемся (для логов)
    fn describe(&self) -> String;
}

/// TCP до `HOST:PORT`
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    type Conn = TcpConnection;

    fn connect(&self, deadline: &Deadline) -> Result<TcpConnection, TransportError> {
        let addrs: Vec<_> = self
            .addr
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                addr: self.addr.clone(),
                source,
            })?
            .collect();

        let mut last_err =
            io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");

        for sa in addrs {
            let timeout = deadline.remaining()?;
            match TcpStream::connect_timeout(&sa, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    debug!("connected to {} ({sa})", self.addr);
                    return Ok(TcpConnection { stream, closed: false });
                }
                Err(e) => last_err = e,
            }
        }

        Err(TransportError::Connect {
            addr: self.addr.clone(),
            source: last_err,
        })
    }

    fn describe(&self) -> String {
        self.addr.clone()
    }
}

#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    closed: bool,
}

impl Connection for TcpConnection {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn close(&mut self) {
        if !self.closed {
            self.stream.shutdown(Shutdown::Both).ok();
            self.closed = true;
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}
