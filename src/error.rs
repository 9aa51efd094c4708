use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum WordCountError {
    InputOpen { path: String, source: io::Error },
    Read(io::Error),
    OutputCreate { path: String, source: io::Error },
    Write { path: String, source: io::Error },
    /// A worker of the named phase panicked; the whole run is abandoned.
    WorkerPanic(&'static str),
    StripePoisoned(usize),
    ThreadPool(rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, WordCountError>;

impl fmt::Display for WordCountError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WordCountError::InputOpen { ref path, ref source } => {
                write!(f, "Error opening file: {}: {}", path, source)
            }
            WordCountError::Read(ref err) => write!(f, "error reading input: {}", err),
            WordCountError::OutputCreate { ref path, ref source } => {
                write!(f, "Error creating output file: {}: {}", path, source)
            }
            WordCountError::Write { ref path, ref source } => {
                write!(f, "error writing {}: {}", path, source)
            }
            WordCountError::WorkerPanic(phase) => write!(f, "{} worker panicked", phase),
            WordCountError::StripePoisoned(stripe) => {
                write!(f, "lock of stripe {} poisoned by a failed reducer", stripe)
            }
            WordCountError::ThreadPool(ref err) => write!(f, "can't start worker threads: {}", err),
        }
    }
}

impl Error for WordCountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            WordCountError::InputOpen { ref source, .. } => Some(source),
            WordCountError::Read(ref err) => Some(err),
            WordCountError::OutputCreate { ref source, .. } => Some(source),
            WordCountError::Write { ref source, .. } => Some(source),
            WordCountError::ThreadPool(ref err) => Some(err),
            WordCountError::WorkerPanic(_) | WordCountError::StripePoisoned(_) => None,
        }
    }
}

impl From<io::Error> for WordCountError {
    fn from(err: io::Error) -> WordCountError {
        WordCountError::Read(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_open_names_the_path() {
        let err = WordCountError::InputOpen {
            path: "missing.txt".to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing.txt"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_errors_convert_to_read() {
        let err: WordCountError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, WordCountError::Read(_)));
    }

    #[test]
    fn worker_panic_has_no_source() {
        let err = WordCountError::WorkerPanic("map");
        assert_eq!(err.to_string(), "map worker panicked");
        assert!(err.source().is_none());
    }
}
