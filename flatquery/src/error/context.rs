//! Layered error messages.
//!
//! Multi-statement schema operations wrap the failing step in
//! `Error::WithContext`; `ErrorChain` walks those layers back down to the
//! driver error for log output.

use super::Error;
use std::fmt;

/// `.context()` / `.with_context()` on crate results
pub trait ErrorContext<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, Error>;

    /// Like `context`, but the message is only built on failure
    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, Error> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Outermost-first view over an error and the errors it wraps
#[derive(Clone, Copy)]
pub struct ErrorChain<'a> {
    next: Option<&'a Error>,
}

impl<'a> ErrorChain<'a> {
    pub fn new(error: &'a Error) -> Self {
        Self { next: Some(error) }
    }

    /// The innermost error, usually the driver failure
    pub fn root_cause(self) -> Option<&'a Error> {
        self.last()
    }
}

impl<'a> Iterator for ErrorChain<'a> {
    type Item = &'a Error;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match current {
            Error::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        };
        Some(current)
    }
}

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers = *self;
        for (depth, error) in layers.enumerate() {
            if depth > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_layers_nest_outermost_first() {
        let result: Result<(), Error> = Err(Error::connection("Connection refused"));
        let err = result
            .context("opening sqlite file")
            .with_context(|| "connecting executor")
            .unwrap_err();

        let layers: Vec<String> = ErrorChain::new(&err)
            .map(|e| match e {
                Error::WithContext { message, .. } => message.clone(),
                other => other.error_code().to_string(),
            })
            .collect();
        assert_eq!(
            layers,
            vec!["connecting executor", "opening sqlite file", "E_DB_CONNECTION"]
        );
    }

    #[test]
    fn test_chain_display_and_root_cause() {
        let error = Error::execution(Some("1".into()), "no such table: t", "DROP TABLE `t`")
            .with_context("truncate of 't' failed");

        let chain = ErrorChain::new(&error);
        assert_eq!(chain.count(), 2);
        assert!(chain.to_string().starts_with("truncate of 't' failed -> "));
        assert!(matches!(chain.root_cause(), Some(Error::Execution { .. })));
    }
}
