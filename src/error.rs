//! Crate-wide error type and the fatal-error reporting hook.
//!
//! Errors raised while processing server actions are protocol violations: the
//! server and client disagree about the widget tree. They abort the action
//! drain and are routed to a [`FatalHandler`] rather than returned to the
//! transport.

use std::cell::RefCell;
use std::error::Error as _;
use std::rc::Rc;

/// Errors produced by the widget runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no widget or namespace matches target '{0}'")]
    UnknownTarget(String),
    #[error("unknown function '{function}' on '{target}'")]
    UnknownFunction { target: String, function: String },
    #[error("unrecognized state '{key}' for widget class {wclass}")]
    UnrecognizedState { wclass: String, key: String },
    #[error("unrecognized widget class: {module}.{class}")]
    UnknownClass { module: String, class: String },
    #[error("widget '{0}' is not a container")]
    NotAContainer(String),
    #[error("child is not a live widget")]
    InvalidChild,
    #[error("invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },
    #[error("widget id '{0}' is already registered")]
    DuplicateId(String),
    #[error("no rendering logic supplied for widget class {0}")]
    NoRenderer(String),
    #[error("a page may not have a parent")]
    PageHasParent,
    #[error("widget no longer exists")]
    Stale,
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("failed to load module '{name}': {message}")]
    ModuleLoad { name: String, message: String },
    #[error("component host failed: {0}")]
    Host(String),
    #[error("communication with the server has been interrupted")]
    ConnectionLost,
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_owned(),
            message: message.into(),
        }
    }

    /// Whether this error means the server sent something the client cannot honor.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::ConnectionLost | Self::ModuleLoad { .. } | Self::Host(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

/// Text shown to the user for a fatal error, including its cause chain.
pub fn fatal_message(error: &Error) -> String {
    let mut message = format!("Fatal error:\n\n{error}");
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str("\ncaused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Receives errors that break the client/server contract.
pub trait FatalHandler {
    fn fatal(&self, error: &Error);
}

/// Default handler: reports the error at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertHandler;

impl FatalHandler for AlertHandler {
    fn fatal(&self, error: &Error) {
        tracing::error!(protocol = error.is_protocol(), "{}", fatal_message(error));
    }
}

/// Handler that keeps every reported message, for inspection in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingHandler {
    messages: Rc<RefCell<Vec<String>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages reported so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl FatalHandler for RecordingHandler {
    fn fatal(&self, error: &Error) {
        self.messages.borrow_mut().push(fatal_message(error));
    }
}
