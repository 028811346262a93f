use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum TransportError {
    #[error("host name could not be resolved")]
    DnsFailure,
    #[error("connection could not be established due to timeout")]
    ConnectTimeout,
    #[error("connection could not be established, peer refused")]
    ConnectRefused,
    #[error("connection could not be established")]
    SocketConnectFailure,
    #[error("socket write failed")]
    SocketWriteFailure,
    #[error("socket read failed")]
    SocketReadFailure,
    #[error("socket write timed out")]
    WriteTimeout,
    #[error("socket read timed out")]
    ReadTimeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("socket close failed")]
    SocketCloseFailure,
    #[error("socket is not connected")]
    NotConnected,
    #[error("socket call interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ProtocolError {
    #[error("command of {0} bytes does not fit a frame")]
    CommandTooLarge(usize),
    #[error("peer announced a {len} byte frame, limit is {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("response exceeded {0} bytes without completing")]
    ResponseTooLarge(usize),
    #[error("peer did not echo the command")]
    EchoMismatch,
    #[error("field {0:?} contains the ':' separator")]
    InvalidField(String),
    #[error("response {0:?} is not a numeric value")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum SessionError {
    #[error("session is not open")]
    NotOpen,
    #[error("session is already open")]
    AlreadyOpen,
    #[error("session is closed and cannot be reused")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("{0}: {1}")]
    Transport(TransportError, String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    pub fn transport(kind: TransportError, detail: impl Into<String>) -> Self {
        Error::Transport(kind, detail.into())
    }

    pub fn transport_kind(&self) -> Option<TransportError> {
        match self {
            Error::Transport(kind, _) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.transport_kind() == Some(TransportError::Interrupted)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.transport_kind(),
            Some(TransportError::ConnectTimeout | TransportError::ReadTimeout | TransportError::WriteTimeout)
        )
    }
}
