use std::time::Duration;

use crate::error::{Error, Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unopened,
    Open,
    Closed,
}

pub trait Transport {
    fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    // Applies to connect, read and write. `None` or a zero duration blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn close(&mut self) -> Result<()>;

    fn state(&self) -> ConnectionState;

    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let written = match self.write(buf) {
                Ok(n) => n,
                Err(e) if e.is_interrupted() => continue,
                Err(e) => return Err(e),
            };
            if written == 0 {
                return Err(Error::transport(
                    TransportError::ConnectionClosed,
                    "peer stopped accepting data",
                ));
            }
            buf = &buf[written..];
        }
        Ok(())
    }
}
