use crate::{Error, MultiError};

/// A type for accumulating multiple errors and warnings.
///
/// Shared by the instrument builder and the diagnostic passes: neither stops
/// at the first problem so that one run reports everything it can find.
#[derive(Default, Debug)]
pub struct DiagnosticContext {
    errors: Vec<Error>,
    warnings: Vec<Error>,
}

impl DiagnosticContext {
    /// Report an `error`
    pub fn err(&mut self, error: Error) {
        log::debug!("recorded error: {error}");
        self.errors.push(error);
    }

    /// Report a `warning`
    pub fn warning(&mut self, warning: Error) {
        self.warnings.push(warning)
    }

    pub fn warning_iter(&self) -> impl Iterator<Item = &Error> {
        self.warnings.iter()
    }

    pub fn errors_iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Print the warnings under `target` and turn the errors, if any, into
    /// a [MultiError].
    pub fn report(self, target: &str) -> Result<(), MultiError> {
        for warning in &self.warnings {
            log::warn!(target: target, "{warning:?}");
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.into())
        }
    }
}
