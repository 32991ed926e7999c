use std::io;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// The byte stream is not a GIF this crate can model
        Format(msg: String) {
            display("{}", msg)
        }
        /// Index, coordinate or size outside of the valid bounds
        OutOfRange(msg: String) {
            display("{}", msg)
        }
        Lzw(err: weezl::LzwError) {
            display("LZW error: {}", err)
        }
        Io(err: io::Error) {
            from()
            from(_oom: std::collections::TryReserveError) -> (io::ErrorKind::OutOfMemory.into())
            display("I/O: {}", err)
        }
        FileExists(path: std::path::PathBuf) {
            display("{} already exists", path.display())
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;

impl Error {
    #[cold]
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    #[cold]
    pub(crate) fn range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Errors caused by malformed input, as opposed to failed I/O or bad arguments
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Lzw(_))
    }
}

impl From<weezl::LzwError> for Error {
    #[cold]
    fn from(err: weezl::LzwError) -> Self {
        Self::Lzw(err)
    }
}
