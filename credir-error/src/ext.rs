use std::{any::Any, error::Error};

use crate::StatusCode;

/// Common surface of the credir domain errors (object-safe).
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Defaults to [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    fn as_any(&self) -> &dyn Any;

    /// Message that may be handed to the directory client.
    ///
    /// Internal failures collapse to `"Internal server error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}
