/// Category of a pipeline error. Lets the caller decide what to do with it
/// (reject the request, drop the record, redeliver, retry, exit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad inbound payload — rejected at the ingress boundary, never retried.
    Validation,
    /// Bad record in a fetched batch — dropped, the cycle continues.
    Decode,
    /// Store insert failed — cursor not advanced, records redelivered.
    Persistence,
    /// Fetch / publish / commit against the log failed — retried by the loop.
    LogConnectivity,
    /// Cannot establish log or store connection at boot — fatal.
    Startup,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => f.write_str("validation"),
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Persistence => f.write_str("persistence"),
            ErrorKind::LogConnectivity => f.write_str("log"),
            ErrorKind::Startup => f.write_str("startup"),
        }
    }
}

/// Unified error type for the log and store seams.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the kind automatically so backends can use `?`.
#[derive(Clone)]
pub struct FirehoseError {
    kind: ErrorKind,
    message: String,
}

impl FirehoseError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Validation, message: msg.into() }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Decode, message: msg.into() }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Persistence, message: msg.into() }
    }

    pub fn log(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::LogConnectivity, message: msg.into() }
    }

    pub fn startup(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Startup, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Re-tag a steady-state error as fatal (used while bootstrapping).
    pub fn into_startup(self) -> Self {
        Self { kind: ErrorKind::Startup, message: self.message }
    }
}

impl std::fmt::Debug for FirehoseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for FirehoseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FirehoseError {}

impl From<serde_json::Error> for FirehoseError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Decode, message: e.to_string() } }
}

impl From<std::str::Utf8Error> for FirehoseError {
    fn from(e: std::str::Utf8Error) -> Self { Self { kind: ErrorKind::Decode, message: e.to_string() } }
}
