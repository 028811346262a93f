pub mod error;
pub mod transport;
pub mod tcp_transport;
pub mod framing;
pub mod length_prefixed;
pub mod echo_framing;
pub mod session;
pub mod flexlab;

pub use error::{Error, ProtocolError, Result, SessionError, TransportError};
pub use transport::{ConnectionState, Transport};
pub use tcp_transport::TcpTransport;
pub use framing::{Frame, Framing, MAX_RESPONSE_LEN};
pub use length_prefixed::LengthPrefixedFraming;
pub use echo_framing::EchoFraming;
pub use session::{CommandSession, SessionConfig, DEFAULT_TIMEOUT, SETTLE_DELAY};
pub use flexlab::{Credentials, DaqCommand, FlexlabClient, LoginResponse, DEFAULT_PORT};
