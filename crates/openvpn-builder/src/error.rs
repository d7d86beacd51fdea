use std::fmt;

/// Failure classes the orchestrator reasons about when a stage aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required host tool is missing.
    Environment,
    /// The download could not be completed or returned a non-success status.
    Transport,
    /// Downloaded content did not match the expected digest.
    Integrity,
    /// An external process failed to start or exited non-zero.
    Process,
    /// Stat/open/copy/remove failures.
    Filesystem,
    /// Invalid or unreadable configuration.
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Environment => "environment",
            ErrorKind::Transport => "transport",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Process => "process",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Config => "config",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    pub fn new<M: Into<String>>(kind: ErrorKind, msg: M) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn environment<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Environment, msg)
    }

    pub fn transport<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Transport, msg)
    }

    pub fn integrity<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Integrity, msg)
    }

    pub fn process<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Process, msg)
    }

    pub fn fs<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Filesystem, msg)
    }

    pub fn config<M: Into<String>>(msg: M) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Prefix the message while keeping the kind.
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            msg: format!("{prefix}: {}", self.msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::fs(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
