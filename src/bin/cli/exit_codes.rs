//! Exit codes for the CLI tool.

use burrow::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Scan finished but some branches failed
pub const PARTIAL: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Requested member does not exist
pub const NOT_FOUND: i32 = 3;
/// Address could not be parsed
pub const BAD_ADDRESS: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitCode {
    Success,
    Partial,
    FatalError,
    NotFound,
    BadAddress,
    IoError,
    UserInterrupt,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Partial => PARTIAL,
            Self::FatalError => FATAL_ERROR,
            Self::NotFound => NOT_FOUND,
            Self::BadAddress => BAD_ADDRESS,
            Self::IoError => IO_ERROR,
            Self::UserInterrupt => USER_INTERRUPT,
        }
    }
}

/// Converts a burrow error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ExitCode::NotFound,
        Error::Io(_) => ExitCode::IoError,
        Error::NotFound { .. } => ExitCode::NotFound,
        Error::MalformedAddress { .. } => ExitCode::BadAddress,
        Error::Cancelled => ExitCode::UserInterrupt,
        Error::Http { .. } => ExitCode::IoError,
        Error::DecodeFailure { .. } | Error::Unsupported { .. } => ExitCode::FatalError,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
