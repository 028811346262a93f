use crate::error::{ProtocolError, Result};
use crate::framing::{Frame, Framing, MAX_RESPONSE_LEN};

pub const PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefixedFraming {
    max_payload_len: usize,
}

impl Default for LengthPrefixedFraming {
    fn default() -> Self {
        Self {
            max_payload_len: MAX_RESPONSE_LEN - PREFIX_LEN,
        }
    }
}

impl LengthPrefixedFraming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_payload_len(max_payload_len: usize) -> Self {
        Self { max_payload_len }
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }
}

impl Framing for LengthPrefixedFraming {
    fn encode(&self, command: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let len = u32::try_from(command.len())
            .map_err(|_| ProtocolError::CommandTooLarge(command.len()))?;
        out.reserve(PREFIX_LEN + command.len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(command);
        Ok(())
    }

    fn decode(&self, raw: &[u8], _command: &[u8]) -> Result<Option<Frame>> {
        let Some(header) = raw.first_chunk::<PREFIX_LEN>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes(*header) as usize;
        if len > self.max_payload_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_payload_len,
            }
            .into());
        }

        let end = PREFIX_LEN + len;
        if raw.len() < end {
            return Ok(None);
        }
        Ok(Some(Frame {
            payload: PREFIX_LEN..end,
            consumed: end,
        }))
    }
}
