//! Actions control the traversal of the instance list.
use mccode_utils::McResult;

/// Result of performing a visit.
pub type VisResult = McResult<Action>;

/// Action performed at the end of visiting an instance.
pub enum Action {
    /// Continue with the next instance.
    Continue,
    /// Globally abort the traversal.
    Stop,
}

impl Action {
    /// Run the traversal specified by `next` if this traversal succeeds.
    /// If the result of this traversal is not `Action::Continue`, do not
    /// run `next()`.
    pub(super) fn and_then<F>(self, mut next: F) -> VisResult
    where
        F: FnMut() -> VisResult,
    {
        match self {
            Action::Continue => next(),
            Action::Stop => Ok(self),
        }
    }
}
