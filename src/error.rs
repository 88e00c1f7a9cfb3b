use std::error::Error as StdError;
use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    SerialPortNotFound,
    SerialPortConfigFailed,
    BaudRateDetectionFailed,
    ReadTimeout,
    ProducerStopped,
    Transport { kind: io::ErrorKind, reason: String },
    Config(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        *self == Error::ReadTimeout
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport {
            kind: e.kind(),
            reason: e.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SerialPortNotFound => f.write_str("serial port not found"),
            Error::SerialPortConfigFailed => f.write_str("failed to configure serial port"),
            Error::BaudRateDetectionFailed => f.write_str("failed to detect current baudrate"),
            Error::ReadTimeout => f.write_str("read timed out"),
            Error::ProducerStopped => f.write_str("reader thread stopped"),
            Error::Transport { reason, .. } => write!(f, "transport error: {}", reason),
            Error::Config(reason) => write!(f, "configuration error: {}", reason),
        }
    }
}

impl StdError for Error {}
