use std::cmp::{max, min};
use std::ops::Range;
use std::thread;
use std::time::Duration;

use crate::echo_framing::EchoFraming;
use crate::error::{Error, ProtocolError, Result, SessionError};
use crate::framing::{Framing, MAX_RESPONSE_LEN};
use crate::length_prefixed::LengthPrefixedFraming;
use crate::transport::{ConnectionState, Transport};

pub const SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeout: Option<Duration>,
    pub settle_delay: Option<Duration>,
    pub max_response_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            settle_delay: None,
            max_response_len: MAX_RESPONSE_LEN,
        }
    }
}

impl SessionConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct CommandSession<F: Framing, T: Transport> {
    framing: F,
    transport: T,
    config: SessionConfig,
    buffer: Vec<u8>,
}

impl<F: Framing + Default, T: Transport + Default> Default for CommandSession<F, T> {
    fn default() -> Self {
        Self::new(F::default(), T::default(), SessionConfig::default())
    }
}

impl<T: Transport> CommandSession<LengthPrefixedFraming, T> {
    pub fn length_prefixed(transport: T) -> Self {
        Self::new(LengthPrefixedFraming::new(), transport, SessionConfig::default())
    }
}

impl<T: Transport> CommandSession<EchoFraming, T> {
    pub fn echo(transport: T) -> Self {
        let config = SessionConfig::default().with_settle_delay(SETTLE_DELAY);
        Self::new(EchoFraming, transport, config)
    }
}

impl<F: Framing, T: Transport> CommandSession<F, T> {
    pub fn new(framing: F, transport: T, config: SessionConfig) -> Self {
        Self {
            framing,
            transport,
            config,
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn open(&mut self, host: &str, port: u16) -> Result<()> {
        match self.state() {
            ConnectionState::Unopened => {}
            ConnectionState::Open => return Err(SessionError::AlreadyOpen.into()),
            ConnectionState::Closed => return Err(SessionError::Closed.into()),
        }
        self.transport.set_timeout(self.config.timeout);
        self.transport.connect(host, port)
    }

    pub fn close(&mut self) -> Result<()> {
        match self.state() {
            ConnectionState::Unopened => Err(SessionError::NotOpen.into()),
            _ => self.transport.close(),
        }
    }

    pub fn cmd(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.cmd_view(command).map(<[u8]>::to_vec)
    }

    pub fn cmd_view(&mut self, command: &[u8]) -> Result<&[u8]> {
        self.ensure_open()?;

        self.buffer.clear();
        self.framing.encode(command, &mut self.buffer)?;

        match self.exchange(command) {
            Ok(payload) => Ok(&self.buffer[payload]),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Unopened => Err(SessionError::NotOpen.into()),
            ConnectionState::Closed => Err(SessionError::Closed.into()),
        }
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Range<usize>> {
        self.transport.write_all(&self.buffer)?;
        tracing::debug!(sent = self.buffer.len(), "command sent");

        if let Some(delay) = self.config.settle_delay {
            thread::sleep(delay);
        }

        self.read_response(command)
    }

    fn read_response(&mut self, command: &[u8]) -> Result<Range<usize>> {
        self.buffer.clear();

        loop {
            let remaining = self.config.max_response_len.saturating_sub(self.buffer.len());
            if remaining == 0 {
                return Err(ProtocolError::ResponseTooLarge(self.config.max_response_len).into());
            }

            let available_capacity = self.buffer.capacity() - self.buffer.len();
            let read_amount = min(max(available_capacity, READ_CHUNK), remaining);
            let old_len = self.buffer.len();
            self.buffer.resize(old_len + read_amount, 0);

            let bytes_read = match self.transport.read(&mut self.buffer[old_len..]) {
                Ok(n) => n,
                Err(e) if e.is_interrupted() => {
                    self.buffer.truncate(old_len);
                    continue;
                }
                Err(e) => {
                    self.buffer.truncate(old_len);
                    return Err(e);
                }
            };
            self.buffer.truncate(old_len + bytes_read);

            if let Some(frame) = self.framing.decode(&self.buffer, command)? {
                let trailing = self.buffer.len() - frame.consumed;
                if trailing > 0 {
                    tracing::warn!(trailing, "discarding bytes past the end of the response");
                }
                tracing::debug!(
                    received = frame.consumed,
                    payload = frame.payload.len(),
                    "response received"
                );
                return Ok(frame.payload);
            }
        }
    }

    fn abort(&mut self, err: &Error) {
        tracing::warn!(error = %err, "exchange failed, closing connection");
        if let Err(close_err) = self.transport.close() {
            tracing::debug!(error = %close_err, "close after failed exchange");
        }
    }
}

impl<F: Framing, T: Transport> Drop for CommandSession<F, T> {
    fn drop(&mut self) {
        if self.transport.state() == ConnectionState::Open {
            if let Err(e) = self.transport.close() {
                tracing::warn!(error = %e, "failed to close connection on drop");
            }
        }
    }
}
