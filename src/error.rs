use std::convert::From;
use std::error::Error as StdError;
use std::fmt;
use std::net::AddrParseError;

#[derive(Debug)]
pub struct ShardError {
    pub kind: ShardErrorKind,
    pub message: String,
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum ShardErrorKind {
    Format,
    Config,
    InputExtension,
    Io,
    Csv,
}

impl ShardError {
    pub fn new(kind: ShardErrorKind, message: impl Into<String>) -> ShardError {
        ShardError {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> ShardError {
        ShardError::new(ShardErrorKind::Config, message)
    }
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ShardError {:?} {}", self.kind, self.message)
    }
}

impl StdError for ShardError {}

impl From<AddrParseError> for ShardError {
    fn from(error: AddrParseError) -> Self {
        ShardError {
            kind: ShardErrorKind::Format,
            message: format!("Cannot parse address: {}", error),
        }
    }
}

impl From<ipnet::PrefixLenError> for ShardError {
    fn from(error: ipnet::PrefixLenError) -> Self {
        ShardError {
            kind: ShardErrorKind::Config,
            message: format!("Bad mask width: {}", error),
        }
    }
}

impl From<std::io::Error> for ShardError {
    fn from(error: std::io::Error) -> Self {
        ShardError {
            kind: ShardErrorKind::Io,
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for ShardError {
    fn from(error: csv::Error) -> Self {
        ShardError {
            kind: ShardErrorKind::Csv,
            message: error.to_string(),
        }
    }
}
