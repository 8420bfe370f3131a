use dicom::core::Tag;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read {} as DICOM: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tag cache queried before scanning")]
    NotScanned,

    #[error("Tag {0} was not requested at scan time")]
    TagNotScanned(Tag),

    #[error("No gantry tilt correction applicable: {0}")]
    NoTiltApplicable(String),

    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("Frame {frame} does not match its image block: {reason}")]
    GeometryMismatch { frame: String, reason: String },

    #[error("Loading was cancelled")]
    Cancelled,

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pixel data error: {0}")]
    PixelData(#[from] dicom::pixeldata::Error),
}

impl Error {
    pub(crate) fn unreadable(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::FileUnreadable {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn mismatch(frame: impl ToString, reason: impl Into<String>) -> Self {
        Error::GeometryMismatch {
            frame: frame.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A per-file or per-block failure that did not stop the remaining work
#[derive(Debug)]
pub struct Diagnostic {
    /// File path or image block the error relates to
    pub subject: String,
    pub error: Error,
}

impl Diagnostic {
    pub fn new(subject: impl Into<String>, error: Error) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.error)
    }
}
