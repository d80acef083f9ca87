use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use tracing_error::{SpanTrace, SpanTraceStatus};

/// Error variants that can occur in cofile operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Acquiring or releasing an advisory file lock failed
    LockError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An operation was invoked on a handle with no open file
    NotOpen { operation: &'static str },

    /// Catch-all for other errors with a message
    Message { message: String },
}

impl ErrorKind {
    fn fmt_message(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::LockError { path, source } => {
                write!(f, "Lock error at {}: {}", path.display(), source)
            }
            ErrorKind::NotOpen { operation } => {
                write!(f, "{}: no file is open", operation)
            }
            ErrorKind::Message { message } => {
                write!(f, "{}", message)
            }
        }
    }
}

/// Comprehensive error type wrapping ErrorKind with optional context.
/// Carries the span trace active at construction time, so errors
/// surfaced far from their origin still point back to it.
pub struct CofileError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<CofileError>>,
    span_trace: SpanTrace,
}

impl CofileError {
    /// Creates a new error from an ErrorKind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a new error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    /// Context is displayed before the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    /// Useful to avoid expensive string construction for successful paths.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records `cause` as the error this one arose from.
    pub fn caused_by(mut self, cause: CofileError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the attached context strings in attachment order.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns a reference to the underlying ErrorKind.
    /// Allows pattern matching on specific error variants.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the innermost error in the chain.
    /// Traverses the error source chain to find the root cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Renders the error message, its context branches and its cause
    /// chain as an indented tree. The leading message line is written
    /// onto the caller's current line.
    fn render_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        self.kind.fmt_message(f)?;
        writeln!(f)?;
        let pad = " ".repeat(indent);
        let branches = self.context.len() + usize::from(self.cause.is_some());
        for (i, context) in self.context.iter().enumerate() {
            let connector = if i + 1 == branches { "└─" } else { "├─" };
            writeln!(f, "{}{} {}", pad, connector, context)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "{}└─ cause: ", pad)?;
            cause.render_tree(f, indent + 3)?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for CofileError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ErrorKind> for Box<CofileError> {
    fn from(kind: ErrorKind) -> Self {
        Box::new(CofileError::new(kind))
    }
}

impl StdError for CofileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if let Some(cause) = &self.cause {
            return Some(cause.as_ref());
        }
        match &self.kind {
            ErrorKind::FileError { source, .. } | ErrorKind::LockError { source, .. } => {
                Some(source)
            }
            ErrorKind::NotOpen { .. } | ErrorKind::Message { .. } => None,
        }
    }
}

impl fmt::Display for CofileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display context first if present
        for (i, context) in self.context.iter().enumerate() {
            if i == 0 {
                write!(f, "{}", context)?;
            } else {
                write!(f, ": {}", context)?;
            }
        }

        // Add a separator if we have context
        if !self.context.is_empty() {
            write!(f, ": ")?;
        }

        // Display the underlying error kind
        self.kind.fmt_message(f)
    }
}

impl fmt::Debug for CofileError {
    /// Human-readable diagnostic format: the message, context and
    /// cause tree, followed by the span trace when one was captured.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render_tree(f, 0)?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/// Standard result type for cofile operations.
/// The error is boxed to keep the Ok path small.
pub type CofileResult<T> = std::result::Result<T, Box<CofileError>>;

/// Extension trait for attaching context to Results.
/// Provides ergonomic error context attachment during error propagation.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    /// Eager evaluation: context is evaluated immediately.
    fn context(self, context: impl Into<String>) -> CofileResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    /// Prefer this to avoid expensive string formatting in the success path.
    fn with_context<F>(self, f: F) -> CofileResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for CofileResult<T> {
    fn context(self, context: impl Into<String>) -> CofileResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> CofileResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}
