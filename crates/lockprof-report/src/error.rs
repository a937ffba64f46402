use std::fmt;

/// Failure writing a `.pclprof` report (spec §7, error #5). Never
/// propagated into the hot path — surfaced only through the dump API's
/// return value, or logged and swallowed by the exit hook.
#[derive(Debug)]
pub enum DumpError {
    Io(std::io::Error),
    Serialize(String),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Io(err) => write!(f, "failed to write pclprof report: {err}"),
            DumpError::Serialize(msg) => write!(f, "failed to serialize pclprof report: {msg}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::Io(err) => Some(err),
            DumpError::Serialize(_) => None,
        }
    }
}

impl From<std::io::Error> for DumpError {
    fn from(err: std::io::Error) -> Self {
        DumpError::Io(err)
    }
}
