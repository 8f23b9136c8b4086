use std::fmt;
use std::io;

use textbridge_bridge::BridgeError;
use textbridge_envelope::EnvelopeError;
use textbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::MessageTooLarge { .. } | TransportError::EmbeddedNewline => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn envelope_error(context: &str, err: EnvelopeError) -> CliError {
    match err {
        EnvelopeError::RecvTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        EnvelopeError::PortClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        EnvelopeError::Serialize(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Transport(err) => transport_error(context, err),
        BridgeError::Envelope(err) => envelope_error(context, err),
        BridgeError::UnknownChannel(_) => CliError::new(USAGE, format!("{context}: {err}")),
        BridgeError::ContextClosed | BridgeError::ChannelClosed(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = bridge_error(
            "wait",
            BridgeError::Envelope(EnvelopeError::RecvTimeout(Duration::from_secs(1))),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn refused_connection_is_a_plain_failure() {
        let err = transport_error(
            "connect",
            TransportError::Connect {
                addr: "/tmp/none.sock".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect: "));
    }

    #[test]
    fn bad_wire_data_is_data_invalid() {
        let err = envelope_error("decode", EnvelopeError::UnknownTransferable("x".into()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
