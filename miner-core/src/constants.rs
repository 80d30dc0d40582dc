use std::time::Duration;

/// время, за которое должен завершиться один опрос рига
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Интервал опроса
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Максимальный размер одного ответа майнера
pub const MAX_FRAME_LEN: usize = 64 * 1024;
