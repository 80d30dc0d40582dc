use thiserror::Error;

/// Ошибки декодирования
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON есть, но поле не соответствует своему контракту
    /// (неверное число элементов, не число там, где нужно число и т.п.)
    #[error("malformed field `{field}`: {reason}")]
    MalformedField { field: String, reason: String },

    /// Число устройств в позиционных массивах не совпадает
    #[error(
        "device count mismatch: primary hashrate={primary}, secondary hashrate={secondary}, temp/fan pairs={temps_fans}"
    )]
    DeviceCountMismatch {
        primary: usize,
        secondary: usize,
        temps_fans: usize,
    },

    /// Майнер явно сообщил об ошибке
    #[error("miner reported status {code}: {msg}")]
    ProtocolStatus { code: String, msg: String },

    /// Ответ вообще не JSON (или не той формы)
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::malformed(field, "missing")
    }
}

/// Ошибки разбора строки рига
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RigSpecError {
    /// пустая строка
    #[error("empty rig line")]
    Empty,

    /// Нет адреса
    #[error("missing rig address")]
    MissingAddress,

    /// Неизвестный протокол
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Адрес не в формате HOST:PORT
    #[error("rig address must look like HOST:PORT (got: {0})")]
    BadAddress(String),

    /// Опция не в формате key=value
    #[error("option must look like key=value (got: {0})")]
    BadOption(String),

    /// Неизвестная опция
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// Недопустимое значение опции
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Ошибки чтения списка ригов
#[derive(Debug, Error)]
pub enum RigListError {
    #[error("failed to read rig list: {0}")]
    Io(#[from] std::io::Error),

    /// строка `line` (с 1) не разобрана
    #[error("rig list line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: RigSpecError,
    },
}
