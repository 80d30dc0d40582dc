use std::io;

use miner_core::DecodeError;
use thiserror::Error;

/// Ошибки транспорта (TCP / HTTP). Фатальны для текущего опроса.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// ответ не уложился в лимит
    #[error("response exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    /// HTTP-ответ не 200
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Ошибка одного опроса рига
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Соединение закрыто/сброшено до получения данных.
    /// Не нарушение протокола: просто пропущенный опрос.
    #[error("empty response (connection closed or reset by peer)")]
    EmptyResponse,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Метод требует Bearer-токен
    #[error("{0} requires token authorization")]
    TokenRequired(&'static str),
}

impl PollError {
    /// Можно ли просто подождать следующего интервала опроса
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PollError::EmptyResponse)
    }
}
