use crate::error::{ProtocolError, Result};
use crate::framing::{Frame, Framing};

// Complete once the echo plus one answer byte is buffered; needs a settle delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoFraming;

impl Framing for EchoFraming {
    fn encode(&self, command: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(command);
        Ok(())
    }

    fn decode(&self, raw: &[u8], command: &[u8]) -> Result<Option<Frame>> {
        let echoed = raw.len().min(command.len());
        if raw[..echoed] != command[..echoed] {
            return Err(ProtocolError::EchoMismatch.into());
        }
        if raw.len() <= command.len() {
            return Ok(None);
        }
        Ok(Some(Frame {
            payload: command.len()..raw.len(),
            consumed: raw.len(),
        }))
    }
}
