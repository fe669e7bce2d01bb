use crate::StackError;

/// Attaches a context frame to the error of a `Result`.
///
/// The error is converted into a [`StackError`] first, so any domain error
/// can be annotated on its way out of a constructor.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>;

    /// Like [`ResultExt::context`], but `f` only runs on the error path.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CredirResult, DirectoryError, StatusCode};

    fn prime(content: &str) -> Result<(), DirectoryError> {
        if content.is_empty() {
            return Err(DirectoryError::malformed("empty document"));
        }
        Ok(())
    }

    #[test]
    fn test_context_wraps_domain_error() {
        fn start() -> CredirResult<()> {
            prime("").context("Initial load failed")?;
            Ok(())
        }

        let err = start().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::MalformedInput);
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "Initial load failed");
    }

    #[test]
    fn test_with_context_is_lazy() {
        let mut calls = 0;
        let ok: CredirResult<()> = prime("users: {}").with_context(|| {
            calls += 1;
            "never built"
        });
        assert!(ok.is_ok());
        assert_eq!(calls, 0);

        let err = prime("")
            .with_context(|| format!("Watching {}", "/etc/users.yml"))
            .unwrap_err();
        assert_eq!(err.contexts()[0].message, "Watching /etc/users.yml");
    }
}
