use crate::error::{Error, Result, TransportError};
use crate::transport::{ConnectionState, Transport};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    state: ConnectionState,
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let mut transport = Self::new();
        transport.set_timeout(Some(timeout));
        transport
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    fn open_stream(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        Ok(stream)
    }

    fn missing_stream(&self) -> Error {
        match self.state {
            ConnectionState::Closed => {
                Error::transport(TransportError::ConnectionClosed, "socket was closed")
            }
            _ => Error::transport(TransportError::NotConnected, "socket was never opened"),
        }
    }
}

pub(crate) fn classify_connect_error(err: &io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::ConnectTimeout,
        ErrorKind::ConnectionRefused => TransportError::ConnectRefused,
        _ => TransportError::SocketConnectFailure,
    }
}

fn classify_read_error(err: &io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::Interrupted => TransportError::Interrupted,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::ReadTimeout,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::UnexpectedEof => {
            TransportError::ConnectionClosed
        }
        _ => TransportError::SocketReadFailure,
    }
}

fn classify_write_error(err: &io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::Interrupted => TransportError::Interrupted,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::WriteTimeout,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            TransportError::ConnectionClosed
        }
        _ => TransportError::SocketWriteFailure,
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        match self.state {
            ConnectionState::Unopened => {}
            ConnectionState::Open => {
                return Err(Error::transport(
                    TransportError::SocketConnectFailure,
                    "socket is already connected",
                ));
            }
            ConnectionState::Closed => {
                return Err(Error::transport(
                    TransportError::ConnectionClosed,
                    "socket was closed and cannot be reused",
                ));
            }
        }

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::transport(TransportError::DnsFailure, e.to_string()))?;

        let mut last_err = None;
        for addr in addrs {
            match self.open_stream(&addr) {
                Ok(stream) => {
                    tracing::info!(%addr, timeout = ?self.timeout, "connected");
                    self.stream = Some(stream);
                    self.state = ConnectionState::Open;
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(Error::transport(classify_connect_error(&e), e.to_string())),
            None => Err(Error::transport(
                TransportError::DnsFailure,
                format!("no addresses found for {host}"),
            )),
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if let Some(stream) = &mut self.stream {
            stream
                .write(buf)
                .map_err(|e| Error::transport(classify_write_error(&e), e.to_string()))
        } else {
            Err(self.missing_stream())
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(stream) = &mut self.stream {
            let bytes_read = stream
                .read(buf)
                .map_err(|e| Error::transport(classify_read_error(&e), e.to_string()))?;
            if bytes_read == 0 && !buf.is_empty() {
                return Err(Error::transport(
                    TransportError::ConnectionClosed,
                    "peer closed the connection",
                ));
            }
            Ok(bytes_read)
        } else {
            Err(self.missing_stream())
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Unopened => Err(Error::transport(
                TransportError::NotConnected,
                "close called before connect",
            )),
            ConnectionState::Closed => Ok(()),
            ConnectionState::Open => {
                self.state = ConnectionState::Closed;
                if let Some(stream) = self.stream.take() {
                    match stream.shutdown(Shutdown::Both) {
                        // The peer may already have torn the connection down.
                        Err(e) if e.kind() != ErrorKind::NotConnected => {
                            return Err(Error::transport(
                                TransportError::SocketCloseFailure,
                                e.to_string(),
                            ));
                        }
                        _ => {}
                    }
                }
                tracing::info!("connection closed");
                Ok(())
            }
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::AsRawFd;
    use std::thread;

    fn setup_test_server<F>(server_logic: F) -> (std::net::SocketAddr, thread::JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let local_addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                server_logic(stream);
            }
        });

        (local_addr, handle)
    }

    fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn construction_starts_unopened() {
        let transport = TcpTransport::new();
        assert!(transport.stream.is_none());
        assert_eq!(transport.state(), ConnectionState::Unopened);
    }

    #[test]
    fn connect_succeeds() {
        let (addr, server_handle) = setup_test_server(|_stream| {});

        let mut transport = TcpTransport::with_timeout(Duration::from_secs(5));
        let result = transport.connect(&addr.ip().to_string(), addr.port());

        assert!(result.is_ok());
        assert_eq!(transport.state(), ConnectionState::Open);
        assert_eq!(transport.peer_addr(), Some(addr));

        server_handle.join().unwrap();
    }

    #[test]
    fn write_all_delivers_every_byte() {
        let (tx, rx) = std::sync::mpsc::channel();
        let message_to_send = vec![b'x'; 256 * 1024];
        let expected = message_to_send.clone();

        let (addr, server_handle) = setup_test_server(move |mut stream| {
            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer).unwrap();
            tx.send(buffer).unwrap();
        });

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        transport.write_all(&message_to_send).unwrap();
        transport.close().unwrap();

        let captured = rx.recv().unwrap();
        assert_eq!(captured, expected);

        server_handle.join().unwrap();
    }

    #[test]
    fn read_succeeds() {
        let message_from_server = "512.0";
        let (addr, server_handle) = setup_test_server(move |mut stream| {
            stream.write_all(message_from_server.as_bytes()).unwrap();
        });

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        let mut read_buffer = [0u8; 1024];
        let bytes_read = transport.read(&mut read_buffer).unwrap();

        assert_eq!(&read_buffer[..bytes_read], message_from_server.as_bytes());

        server_handle.join().unwrap();
    }

    #[test]
    fn close_is_idempotent_once_open() {
        let (addr, server_handle) = setup_test_server(|_stream| {});

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        assert!(transport.close().is_ok());
        assert!(transport.close().is_ok());
        assert_eq!(transport.state(), ConnectionState::Closed);

        server_handle.join().unwrap();
    }

    #[test]
    fn close_before_connect_fails() {
        let mut transport = TcpTransport::new();
        let result = transport.close();
        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::NotConnected));
    }

    #[test]
    fn closed_transport_cannot_be_reused() {
        let (addr, server_handle) = setup_test_server(|_stream| {});

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();
        transport.close().unwrap();
        server_handle.join().unwrap();

        let result = transport.connect(&addr.ip().to_string(), addr.port());
        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::ConnectionClosed));

        let mut read_buffer = [0u8; 16];
        let result = transport.read(&mut read_buffer);
        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::ConnectionClosed));
    }

    #[test]
    fn read_before_connect_fails() {
        let mut transport = TcpTransport::new();
        let mut read_buffer = [0u8; 16];
        let result = transport.read(&mut read_buffer);
        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::NotConnected));
    }

    #[test]
    fn connect_fails_on_refused_port() {
        let mut transport = TcpTransport::with_timeout(Duration::from_secs(5));
        let result = transport.connect("127.0.0.1", unused_port());

        let err = result.unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportError::ConnectRefused));
        assert!(!err.is_timeout());
        assert_eq!(transport.state(), ConnectionState::Unopened);
    }

    #[test]
    fn connect_fails_on_dns_failure() {
        let mut transport = TcpTransport::new();
        let invalid_host = "this-is-not-a-real-domain.invalid";

        let result = transport.connect(invalid_host, 3500);

        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::DnsFailure));
    }

    #[test]
    fn connect_errors_are_classified() {
        let timed_out = io::Error::from(ErrorKind::TimedOut);
        let refused = io::Error::from(ErrorKind::ConnectionRefused);
        let unreachable = io::Error::other("network is unreachable");

        assert_eq!(classify_connect_error(&timed_out), TransportError::ConnectTimeout);
        assert_eq!(classify_connect_error(&refused), TransportError::ConnectRefused);
        assert_eq!(classify_connect_error(&unreachable), TransportError::SocketConnectFailure);
    }

    #[test]
    fn interrupted_calls_are_classified_for_retry() {
        let interrupted = io::Error::from(ErrorKind::Interrupted);
        assert_eq!(classify_read_error(&interrupted), TransportError::Interrupted);
        assert_eq!(classify_write_error(&interrupted), TransportError::Interrupted);
    }

    #[test]
    fn zero_timeout_means_blocking() {
        let mut transport = TcpTransport::new();
        transport.set_timeout(Some(Duration::ZERO));
        assert_eq!(transport.timeout, None);
    }

    #[test]
    fn read_times_out_on_silent_peer() {
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let (addr, server_handle) = setup_test_server(move |_stream| {
            let _ = done_rx.recv();
        });

        let mut transport = TcpTransport::with_timeout(Duration::from_millis(100));
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        let mut read_buffer = [0u8; 16];
        let result = transport.read(&mut read_buffer);
        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::ReadTimeout));

        done_tx.send(()).unwrap();
        server_handle.join().unwrap();
    }

    #[test]
    fn write_fails_on_reset_connection() {
        let (addr, server_handle) = setup_test_server(|stream| {
            let linger = libc::linger {
                l_onoff: 1,
                l_linger: 0,
            };
            let fd = stream.as_raw_fd();
            unsafe {
                libc::setsockopt(
                    fd,
                    libc::SOL_SOCKET,
                    libc::SO_LINGER,
                    &linger as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::linger>() as u32,
                );
            }
        });

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        server_handle.join().unwrap();

        thread::sleep(Duration::from_millis(50));

        let result = transport.write(b"GetDAQ:WattStopper.HS1--4126F--Light Level-1");

        assert!(matches!(
            result.unwrap_err(),
            Error::Transport(TransportError::ConnectionClosed, _)
        ));
    }

    #[test]
    fn read_fails_on_peer_shutdown() {
        let (addr, server_handle) = setup_test_server(|_stream| {});

        let mut transport = TcpTransport::new();
        transport.connect(&addr.ip().to_string(), addr.port()).unwrap();

        server_handle.join().unwrap();

        let mut read_buffer = [0u8; 1024];
        let result = transport.read(&mut read_buffer);

        assert_eq!(result.unwrap_err().transport_kind(), Some(TransportError::ConnectionClosed));
    }
}
