use std::fmt;
use std::time::Duration;

use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::length_prefixed::LengthPrefixedFraming;
use crate::session::{CommandSession, DEFAULT_TIMEOUT, SessionConfig};
use crate::tcp_transport::TcpTransport;
use crate::transport::{ConnectionState, Transport};

pub const DEFAULT_PORT: u16 = 3500;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaqVerb {
    Get,
    Set,
}

impl DaqVerb {
    fn as_str(self) -> &'static str {
        match self {
            DaqVerb::Get => "GetDAQ",
            DaqVerb::Set => "SETDAQ",
        }
    }
}

// <VERB>:<TargetId>[:<value>][:<user>:<password>]
#[derive(Debug, Clone, PartialEq)]
pub struct DaqCommand<'a> {
    verb: DaqVerb,
    target: &'a str,
    value: Option<f64>,
    credentials: Option<&'a Credentials>,
}

impl<'a> DaqCommand<'a> {
    pub fn get(target: &'a str) -> Self {
        Self {
            verb: DaqVerb::Get,
            target,
            value: None,
            credentials: None,
        }
    }

    pub fn set(target: &'a str, value: f64) -> Self {
        Self {
            verb: DaqVerb::Set,
            target,
            value: Some(value),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: &'a Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn render(&self) -> Result<String> {
        let mut fields = vec![self.verb.as_str().to_string(), checked_field(self.target)?];
        if let Some(value) = self.value {
            if !value.is_finite() {
                return Err(ProtocolError::InvalidValue(value.to_string()).into());
            }
            // Debug keeps the decimal point on whole numbers ("40.0").
            fields.push(format!("{value:?}"));
        }
        if let Some(credentials) = self.credentials {
            fields.push(checked_field(&credentials.user)?);
            fields.push(checked_field(&credentials.password)?);
        }
        Ok(fields.join(":"))
    }
}

fn checked_field(field: &str) -> Result<String> {
    if field.contains(':') {
        return Err(ProtocolError::InvalidField(field.to_string()).into());
    }
    Ok(field.to_string())
}

fn login_command(credentials: &Credentials) -> Result<String> {
    Ok(format!(
        "LOGIN:{}:{}",
        checked_field(&credentials.user)?,
        checked_field(&credentials.password)?
    ))
}

// A failed login exchange is reported the same way as a failed connect.
fn as_open_failure(err: Error) -> Error {
    match err {
        Error::Transport(
            TransportError::ConnectTimeout | TransportError::ReadTimeout | TransportError::WriteTimeout,
            detail,
        ) => Error::Transport(TransportError::ConnectTimeout, detail),
        Error::Transport(_, detail) => Error::Transport(TransportError::SocketConnectFailure, detail),
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse(pub Vec<u8>);

impl fmt::Display for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Success:\n{}", String::from_utf8_lossy(&self.0))
    }
}

pub struct FlexlabClient<T: Transport = TcpTransport> {
    session: CommandSession<LengthPrefixedFraming, T>,
}

impl<T: Transport + Default> FlexlabClient<T> {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_transport(T::default(), timeout)
    }
}

impl<T: Transport + Default> Default for FlexlabClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> FlexlabClient<T> {
    pub fn with_transport(transport: T, timeout: Duration) -> Self {
        let config = SessionConfig::default().with_timeout(Some(timeout));
        Self {
            session: CommandSession::new(LengthPrefixedFraming::new(), transport, config),
        }
    }

    pub fn open(&mut self, host: &str, port: u16, credentials: &Credentials) -> Result<LoginResponse> {
        let login = login_command(credentials)?;
        self.session.open(host, port)?;
        let response = self.session.cmd(login.as_bytes()).map_err(as_open_failure)?;
        tracing::info!(host, port, user = %credentials.user, "logged in");
        Ok(LoginResponse(response))
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn cmd(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.session.cmd(command)
    }

    pub fn get_daq(&mut self, target: &str, credentials: &Credentials) -> Result<Vec<u8>> {
        let command = DaqCommand::get(target).with_credentials(credentials).render()?;
        self.session.cmd(command.as_bytes())
    }

    pub fn set_daq(&mut self, target: &str, value: f64, credentials: &Credentials) -> Result<Vec<u8>> {
        let command = DaqCommand::set(target, value)
            .with_credentials(credentials)
            .render()?;
        self.session.cmd(command.as_bytes())
    }

    pub fn read_level(&mut self, target: &str, credentials: &Credentials) -> Result<f64> {
        let command = DaqCommand::get(target).with_credentials(credentials).render()?;
        let response = self.session.cmd_view(command.as_bytes())?;
        parse_level(response)
    }
}

fn parse_level(response: &[u8]) -> Result<f64> {
    std::str::from_utf8(response)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| ProtocolError::InvalidValue(String::from_utf8_lossy(response).into_owned()).into())
}
