use std::{fmt, panic::Location, sync::Arc};

use crate::{ErrorExt, StatusCode};

/// A domain error plus the frames it picked up on the way out.
///
/// Startup failures read outermost first: "Cannot start directory backend
/// → Initial load of the credential file failed → cause".
#[derive(Clone)]
pub struct StackError {
    inner: Arc<dyn ErrorExt>,
    contexts: Arc<Vec<ErrorContext>>,
}

/// One context frame and the call site that attached it.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: &'static Location<'static>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            inner: Arc::new(err),
            contexts: Arc::new(Vec::new()),
        }
    }

    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.contexts).push(ErrorContext {
            message: msg.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status_code()
    }

    /// Innermost first.
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    pub fn downcast_ref<T: ErrorExt>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait implementations for StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let frames: Vec<String> = self
            .contexts
            .iter()
            .map(|c| format!("{} ({}:{})", c.message, c.location.file(), c.location.line()))
            .collect();
        f.debug_struct("StackError")
            .field("inner", &self.inner.to_string())
            .field("status_code", &self.status_code())
            .field("contexts", &frames)
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for ctx in self.contexts.iter().rev() {
            write!(f, "{} → ", ctx.message)?;
        }
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}
