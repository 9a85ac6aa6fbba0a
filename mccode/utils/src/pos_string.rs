use std::path::PathBuf;

use crate::{GPosIdx, WithPos};

/// A positioned string, used for the string literals of SHELL, SEARCH,
/// DEPENDENCY and `%include` directives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PosString {
    data: String,
    span: GPosIdx,
}

impl From<String> for PosString {
    fn from(data: String) -> PosString {
        PosString {
            data,
            span: GPosIdx::UNKNOWN,
        }
    }
}

impl From<&str> for PosString {
    fn from(data: &str) -> PosString {
        data.to_string().into()
    }
}

impl From<PosString> for String {
    fn from(value: PosString) -> String {
        value.data
    }
}

impl From<PosString> for PathBuf {
    fn from(value: PosString) -> Self {
        value.data.into()
    }
}

impl std::fmt::Display for PosString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl AsRef<str> for PosString {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

impl AsRef<std::path::Path> for PosString {
    fn as_ref(&self) -> &std::path::Path {
        self.data.as_ref()
    }
}

impl WithPos for PosString {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

impl PosString {
    /// Construct a new PosString from a String and a span.
    pub fn new(data: String, span: GPosIdx) -> Self {
        Self { data, span }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }
}
