use std::ops::Range;

use crate::error::Result;

pub const MAX_RESPONSE_LEN: usize = 6_553_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Range<usize>,
    pub consumed: usize,
}

pub trait Framing {
    fn encode(&self, command: &[u8], out: &mut Vec<u8>) -> Result<()>;

    // Ok(None) until a full response is buffered.
    fn decode(&self, raw: &[u8], command: &[u8]) -> Result<Option<Frame>>;
}
