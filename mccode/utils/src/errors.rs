//! Errors generated by the compiler.
use crate::{GPosIdx, Id, WithPos};
use itertools::Itertools;

/// Convenience wrapper to represent success or meaningul compiler error.
pub type McResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
    post_msg: Option<String>,
}

/// Standard error type for compiler errors.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Miscellaneous error message
    #[error("{0}")]
    Misc(String),
    /// The input file is invalid (does not exist or cannot be read).
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    /// Failed to write the output
    #[error("Failed to write output: {0}")]
    WriteError(String),
    /// The grammar rejected the input.
    #[error("{0}")]
    ParseError(String),
    /// The instrument structure is inconsistent.
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),
    /// A name was used without a definition.
    #[error("Undefined {kind} `{name}'")]
    Undefined { name: Id, kind: String },
    /// A name is defined twice in the same scope.
    #[error("{kind} `{name}' is already defined")]
    AlreadyBound { name: Id, kind: String },
    /// A required parameter has no value.
    #[error("Unassigned value for parameter `{param}' in component `{comp}'")]
    Unassigned { param: Id, comp: Id },
    /// An error that stops the compilation right away.
    #[error("FATAL ERROR: {0}")]
    Fatal(String),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
            post_msg: None,
        }
    }

    /// Attach the position of `pos` to this error.
    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    /// Attach a message printed after the positioned report.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }

    pub fn parse_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::ParseError(msg.to_string()))
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }

    pub fn undefined<S: ToString>(name: Id, kind: S) -> Self {
        Self::new(ErrorKind::Undefined {
            name,
            kind: kind.to_string(),
        })
    }

    pub fn already_bound<S: ToString>(name: Id, kind: S) -> Self {
        Self::new(ErrorKind::AlreadyBound {
            name,
            kind: kind.to_string(),
        })
    }

    pub fn unassigned(param: Id, comp: Id) -> Self {
        Self::new(ErrorKind::Unassigned { param, comp })
    }

    pub fn fatal<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Fatal(msg.to_string()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Fatal errors abort the compilation instead of being collected.
    pub fn is_fatal(&self) -> bool {
        matches!(*self.kind, ErrorKind::Fatal(_))
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pos == GPosIdx::UNKNOWN {
            write!(f, "{}", self.kind)?
        } else {
            write!(f, "{}", self.pos.format(self.kind.to_string()))?
        }
        if let Some(post) = &self.post_msg {
            write!(f, "\n{}", post)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {}", err))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::write_error(err.to_string())
    }
}

/// A collection of errors reported together.
#[derive(Clone, Default)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<Error> for MultiError {
    fn from(err: Error) -> Self {
        MultiError { errors: vec![err] }
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        MultiError { errors }
    }
}

impl From<std::io::Error> for MultiError {
    fn from(err: std::io::Error) -> Self {
        Error::from(err).into()
    }
}

impl std::fmt::Debug for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().map(|e| format!("{e:?}")).join("\n"))
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().join("\n"))
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_message() {
        let err = Error::unassigned("xwidth".into(), "slit".into());
        assert_eq!(
            err.to_string(),
            "Unassigned value for parameter `xwidth' in component `slit'"
        );
        assert!(!err.is_fatal());
        assert!(Error::fatal("boom").is_fatal());
    }

    #[test]
    fn multi_error_collects() {
        let errs: MultiError =
            vec![Error::misc("first"), Error::misc("second")].into();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.to_string(), "first\nsecond");
    }
}
