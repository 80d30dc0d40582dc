//! Один запрос = одно соединение.
//!
//! Майнеры (Claymore, SGMiner) держат на API-порту максимум одного клиента
//! и часто сами рвут соединение после ответа, поэтому соединение живёт ровно
//! один опрос и закрывается на любом пути выхода.

use std::io;
use std::ops::{Deref, DerefMut};

use log::{debug, trace};
use miner_core::wire::FRAME_TERMINATORS;
use miner_core::{MAX_FRAME_LEN, RawFrame};
use serde::de::IgnoredAny;

use crate::error::{PollError, TransportError};
use crate::transport::{Connection, Connector, Deadline, TcpConnector};

const READ_CHUNK: usize = 4096;

/// Клиент "запрос-ответ" поверх [`Connector`]
#[derive(Debug, Clone)]
pub struct WireClient<C = TcpConnector> {
    connector: C,
    max_frame: usize,
}

impl WireClient<TcpConnector> {
    /// TCP-клиент до `HOST:PORT`
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(TcpConnector::new(addr))
    }
}

impl<C: Connector> WireClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            max_frame: MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Отправляет запрос и читает ровно один ответ.
    ///
    /// Ответ заканчивается на первом `\n` или `\0`, на EOF, либо когда
    /// накопленные байты уже образуют законченный JSON (Claymore не всегда
    /// ставит перевод строки и не закрывает сокет).
    pub fn send(&self, request: &[u8], deadline: &Deadline) -> Result<RawFrame, PollError> {
        let mut conn = Guard(self.connector.connect(deadline)?);
        debug!(
            "-> {}: {}",
            self.connector.describe(),
            String::from_utf8_lossy(request).trim_end()
        );

        write_request(&mut *conn, request, deadline)?;
        let frame = read_frame(&mut *conn, deadline, self.max_frame)?;

        debug!("<- {}: {} bytes", self.connector.describe(), frame.len());
        trace!("<- {}", String::from_utf8_lossy(frame.payload()));
        Ok(frame)
    }

    /// Отправляет запрос и закрывает соединение, не дожидаясь ответа
    /// (`miner_restart` / `miner_reboot`)
    pub fn send_only(&self, request: &[u8], deadline: &Deadline) -> Result<(), PollError> {
        let mut conn = Guard(self.connector.connect(deadline)?);
        debug!(
            "-> {} (no reply): {}",
            self.connector.describe(),
            String::from_utf8_lossy(request).trim_end()
        );
        write_request(&mut *conn, request, deadline)?;
        Ok(())
    }
}

/// Закрывает соединение при выходе из области видимости
struct Guard<T: Connection>(T);

impl<T: Connection> Deref for Guard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Connection> DerefMut for Guard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Connection> Drop for Guard<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn write_request<T: Connection>(
    conn: &mut T,
    request: &[u8],
    deadline: &Deadline,
) -> Result<(), TransportError> {
    // запросы крошечные: пишем одним куском с таймаутом на весь остаток срока
    conn.set_io_timeout(deadline.remaining()?)
        .map_err(TransportError::Write)?;

    match conn.write_all(request) {
        Ok(()) => Ok(()),
        Err(e) if is_timeout(&e) => {
            deadline.remaining()?;
            Err(TransportError::DeadlineExceeded)
        }
        Err(e) => Err(TransportError::Write(e)),
    }
}

fn read_frame<T: Connection>(
    conn: &mut T,
    deadline: &Deadline,
    max_frame: usize,
) -> Result<RawFrame, PollError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let tick = deadline.tick()?;
        conn.set_io_timeout(tick).map_err(TransportError::Read)?;

        let n = match conn.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
            // сброс посреди ответа = данных нет
            Err(e) if is_reset(&e) => {
                debug!("connection reset by peer after {} bytes", buf.len());
                return Err(PollError::EmptyResponse);
            }
            Err(e) => return Err(TransportError::Read(e).into()),
        };

        let data = &chunk[..n];
        if let Some(pos) = data.iter().position(|b| FRAME_TERMINATORS.contains(b)) {
            buf.extend_from_slice(&data[..=pos]);
            check_len(&buf, max_frame)?;
            break;
        }

        buf.extend_from_slice(data);
        check_len(&buf, max_frame)?;

        if is_complete_json(&buf) {
            break;
        }
    }

    // один терминатор без тела - тоже пустой ответ
    let frame = RawFrame::new(buf);
    if frame.payload().is_empty() {
        return Err(PollError::EmptyResponse);
    }

    Ok(frame)
}

fn check_len(buf: &[u8], max_frame: usize) -> Result<(), TransportError> {
    if buf.len() > max_frame {
        return Err(TransportError::FrameTooLarge { limit: max_frame });
    }
    Ok(())
}

fn is_complete_json(buf: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(buf).is_ok()
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn is_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::CancelToken;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Шаг сценария чтения
    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        Data(Vec<u8>),
        Fail(io::ErrorKind),
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockState {
        pub closed: AtomicBool,
        pub connects: AtomicUsize,
        pub written: Mutex<Vec<u8>>,
    }

    /// Соединение по сценарию; после конца сценария отдаёт EOF
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockConnector {
        pub reads: Vec<Step>,
        pub fail_write: Option<io::ErrorKind>,
        pub state: Arc<MockState>,
    }

    impl MockConnector {
        pub fn replying(reads: Vec<Step>) -> Self {
            Self {
                reads,
                ..Self::default()
            }
        }

        pub fn closed(&self) -> bool {
            self.state.closed.load(Ordering::SeqCst)
        }

        pub fn written(&self) -> Vec<u8> {
            self.state.written.lock().unwrap().clone()
        }
    }

    pub(crate) struct MockConn {
        reads: std::vec::IntoIter<Step>,
        fail_write: Option<io::ErrorKind>,
        state: Arc<MockState>,
    }

    impl Connector for MockConnector {
        type Conn = MockConn;

        fn connect(&self, deadline: &Deadline) -> Result<MockConn, TransportError> {
            deadline.remaining()?;
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            self.state.closed.store(false, Ordering::SeqCst);
            Ok(MockConn {
                reads: self.reads.clone().into_iter(),
                fail_write: self.fail_write,
                state: self.state.clone(),
            })
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    impl Connection for MockConn {
        fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            if let Some(kind) = self.fail_write {
                return Err(kind.into());
            }
            self.state.written.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.next() {
                Some(Step::Data(d)) => {
                    buf[..d.len()].copy_from_slice(&d);
                    Ok(d.len())
                }
                Some(Step::Fail(kind)) => {
                    if matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(kind.into())
                }
                None => Ok(0),
            }
        }

        fn close(&mut self) {
            self.state.closed.store(true, Ordering::SeqCst);
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn data(s: &str) -> Step {
        Step::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn reset_by_peer_is_empty_response_and_closes() {
        let mock = MockConnector::replying(vec![Step::Fail(io::ErrorKind::ConnectionReset)]);
        let client = WireClient::new(mock.clone());

        let err = client.send(b"{\"command\":\"summary\"}\n", &deadline()).unwrap_err();

        assert!(matches!(err, PollError::EmptyResponse), "got {err:?}");
        assert!(err.is_recoverable());
        assert!(mock.closed());
    }

    #[test]
    fn reset_after_partial_data_is_empty_response() {
        let mock = MockConnector::replying(vec![
            data("{\"id\":0,"),
            Step::Fail(io::ErrorKind::ConnectionAborted),
        ]);
        let err = WireClient::new(mock.clone()).send(b"x\n", &deadline()).unwrap_err();
        assert!(matches!(err, PollError::EmptyResponse));
        assert!(mock.closed());
    }

    #[test]
    fn eof_without_data_is_empty_response() {
        let mock = MockConnector::replying(vec![]);
        let err = WireClient::new(mock.clone()).send(b"x\n", &deadline()).unwrap_err();
        assert!(matches!(err, PollError::EmptyResponse));
        assert!(mock.closed());
    }

    #[test]
    fn bare_terminator_is_empty_response() {
        for reply in ["\0", "\n", "\r\n"] {
            let mock = MockConnector::replying(vec![data(reply)]);
            let err = WireClient::new(mock.clone()).send(b"x\n", &deadline()).unwrap_err();
            assert!(matches!(err, PollError::EmptyResponse), "{reply:?}: got {err:?}");
            assert!(mock.closed());
        }
    }

    #[test]
    fn reads_until_newline_and_closes() {
        let mock = MockConnector::replying(vec![
            data("{\"id\":0,"),
            data("\"result\":[]}\n{\"junk\""),
        ]);
        let client = WireClient::new(mock.clone());

        let frame = client.send(b"{\"id\":0}\n", &deadline()).unwrap();

        assert_eq!(frame.as_bytes(), b"{\"id\":0,\"result\":[]}\n");
        assert_eq!(mock.written(), b"{\"id\":0}\n");
        assert!(mock.closed());
    }

    #[test]
    fn nul_terminates_frame() {
        let mock = MockConnector::replying(vec![data("{\"STATUS\":[]}\0")]);
        let frame = WireClient::new(mock).send(b"x\n", &deadline()).unwrap();
        assert_eq!(frame.payload(), b"{\"STATUS\":[]}");
    }

    #[test]
    fn eof_ends_frame() {
        let mock = MockConnector::replying(vec![data("{\"a\":"), data("1")]);
        // "{\"a\":1" так и не стал законченным JSON, но EOF закрывает кадр
        let frame = WireClient::new(mock).send(b"x\n", &deadline()).unwrap();
        assert_eq!(frame.as_bytes(), b"{\"a\":1");
    }

    #[test]
    fn complete_json_without_terminator_ends_frame() {
        // после JSON сокет молчит; без детекта висели бы до дедлайна
        let mut reads = vec![data("{\"result\":"), data("[\"1\"]}")];
        reads.extend(std::iter::repeat_n(Step::Fail(io::ErrorKind::WouldBlock), 1000));
        let mock = MockConnector::replying(reads);

        let frame = WireClient::new(mock).send(b"x\n", &deadline()).unwrap();
        assert_eq!(frame.as_bytes(), b"{\"result\":[\"1\"]}");
    }

    #[test]
    fn read_ticks_are_retried() {
        let mock = MockConnector::replying(vec![
            Step::Fail(io::ErrorKind::WouldBlock),
            Step::Fail(io::ErrorKind::Interrupted),
            Step::Fail(io::ErrorKind::TimedOut),
            data("{}\n"),
        ]);
        let frame = WireClient::new(mock).send(b"x\n", &deadline()).unwrap();
        assert_eq!(frame.payload(), b"{}");
    }

    #[test]
    fn hung_peer_hits_deadline_and_closes() {
        let reads = std::iter::repeat_n(Step::Fail(io::ErrorKind::WouldBlock), 10_000).collect();
        let mock = MockConnector::replying(reads);

        let err = WireClient::new(mock.clone())
            .send(b"x\n", &Deadline::after(Duration::from_millis(50)))
            .unwrap_err();

        assert!(
            matches!(err, PollError::Transport(TransportError::DeadlineExceeded)),
            "got {err:?}"
        );
        assert!(!err.is_recoverable());
        assert!(mock.closed());
    }

    #[test]
    fn cancel_interrupts_hung_read() {
        let reads = std::iter::repeat_n(Step::Fail(io::ErrorKind::WouldBlock), 10_000).collect();
        let mock = MockConnector::replying(reads);
        let token = CancelToken::new();
        let d = Deadline::with_cancel(Duration::from_secs(30), token.clone());

        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                token.cancel();
            })
        };

        let err = WireClient::new(mock.clone()).send(b"x\n", &d).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, PollError::Transport(TransportError::Cancelled)), "got {err:?}");
        assert!(mock.closed());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mock = MockConnector::replying(vec![data("[1,2,3,4,5,"), data("6,7,8,9,10,")]);
        let err = WireClient::new(mock.clone())
            .with_max_frame(16)
            .send(b"x\n", &deadline())
            .unwrap_err();

        assert!(matches!(
            err,
            PollError::Transport(TransportError::FrameTooLarge { limit: 16 })
        ));
        assert!(mock.closed());
    }

    #[test]
    fn write_failure_closes_connection() {
        let mock = MockConnector {
            fail_write: Some(io::ErrorKind::BrokenPipe),
            ..MockConnector::default()
        };
        let err = WireClient::new(mock.clone()).send(b"x\n", &deadline()).unwrap_err();

        assert!(matches!(err, PollError::Transport(TransportError::Write(_))));
        assert!(mock.closed());
    }

    #[test]
    fn send_only_writes_and_closes_without_reading() {
        let mock = MockConnector::replying(vec![Step::Fail(io::ErrorKind::ConnectionReset)]);
        WireClient::new(mock.clone())
            .send_only(b"{\"method\":\"miner_restart\"}\n", &deadline())
            .unwrap();

        assert_eq!(mock.written(), b"{\"method\":\"miner_restart\"}\n");
        assert!(mock.closed());
    }

    #[test]
    fn every_send_opens_fresh_connection() {
        let mock = MockConnector::replying(vec![data("{}\n")]);
        let client = WireClient::new(mock.clone());
        client.send(b"a\n", &deadline()).unwrap();
        client.send(b"b\n", &deadline()).unwrap();
        assert_eq!(mock.state.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tcp_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut w = stream;
            w.write_all(b"{\"STATUS\":[{\"STATUS\":\"S\"}]}\0").unwrap();
            line
        });

        let frame = WireClient::tcp(addr.to_string())
            .send(b"{\"command\":\"summary\"}\n", &deadline())
            .unwrap();

        assert_eq!(server.join().unwrap(), "{\"command\":\"summary\"}\n");
        assert_eq!(frame.payload(), b"{\"STATUS\":[{\"STATUS\":\"S\"}]}");
    }

    #[test]
    fn tcp_peer_closing_without_reply_is_empty_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(&stream).read_line(&mut line).unwrap();
            drop(stream);
        });

        let err = WireClient::tcp(addr.to_string())
            .send(b"{\"command\":\"summary\"}\n", &deadline())
            .unwrap_err();
        server.join().unwrap();

        assert!(err.is_recoverable(), "got {err:?}");
    }
}
