use std::fmt;
use std::path::PathBuf;

/// Failure kinds surfaced by the archive and transfer layers.
///
/// Errors travel through `anyhow` with added context; callers that need to
/// branch on the kind downcast to this enum.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Malformed gzip or tar framing while decoding an archive.
    ArchiveFormat(String),
    /// An archive entry resolved outside the destination root.
    PathTraversal { entry: String, dest: PathBuf },
    /// Transport-level failure before a status line was available.
    Network(reqwest::Error),
    /// A response arrived with a status outside [200,300).
    HttpStatus { status: u16, body: String },
    /// A response body could not be decoded in the expected JSON shape.
    Protocol(String),
    /// Manifest or input validation failure.
    Validation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::ArchiveFormat(msg) => write!(f, "archive format error: {}", msg),
            Error::PathTraversal { entry, dest } => write!(
                f,
                "archive entry {:?} escapes destination directory {:?}",
                entry, dest
            ),
            Error::Network(e) => write!(f, "network error: {}", e),
            Error::HttpStatus { status, body } => {
                write!(f, "unexpected HTTP status {}: {}", status, body)
            }
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::Validation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e)
    }
}
