//! The unified error handling system for the application.

use std::fmt::Display;

pub use auth::{AuthError, AuthErrorKind};
pub use types::AppError;

/// A unified `Result` type for the entire application.
pub type Result<T> = std::result::Result<T, AppError>;

pub mod auth;
pub mod conversion;
pub mod types;

/// Attach a human readable context to any error convertible into [`AppError`].
pub trait Context<T> {
    /// Wrap the error with a fixed context message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    /// Wrap the error with a lazily built context message.
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.with_context(|| context)
    }

    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|error| AppError::Context {
            context: context().to_string(),
            source: Box::new(error.into()),
        })
    }
}

/// Error category for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (bad input, invalid credentials).
    Client,
    /// Errors caused by the server or its dependencies.
    Server,
}

#[cfg(test)]
mod tests;
